// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory store of devices and resources.

use std::collections::HashMap;

use super::{Device, Resource};
use crate::error::{Error, Result, ValueError};
use crate::types::{ExtAddress, ResourceId, UniqueId, suffix};

/// Owns every [`Device`] and sub-[`Resource`] known to the gateway.
///
/// REST ids come from a single counter and are never reused; deletion is
/// logical, so deleted entries stay addressable by id but are skipped by
/// the iterators and lookups used for routing.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::resource::{Registry, Resource};
/// use zhabridge_lib::types::{ExtAddress, ResourceKind, UniqueId};
///
/// let mut registry = Registry::new();
/// let addr = ExtAddress::new(0x0012_4b00_1234_5678);
/// registry.get_or_create_device(addr);
///
/// let uid = UniqueId::generate(addr, 1, 0x0402);
/// let id = registry
///     .add_resource(Resource::new(ResourceKind::Sensors, "ZHATemperature", uid))
///     .unwrap();
/// assert_eq!(registry.find_resource(addr, 1, "ZHATemp").unwrap().id(), id);
/// ```
#[derive(Debug)]
pub struct Registry {
    devices: HashMap<ExtAddress, Device>,
    resources: Vec<Resource>,
    next_id: u32,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            resources: Vec::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> ResourceId {
        let id = ResourceId::new(self.next_id);
        self.next_id += 1;
        id
    }

    // =========================================================================
    // Devices
    // =========================================================================

    /// Adds a device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Duplicate`] if a device with this address exists.
    pub fn add_device(&mut self, mut device: Device) -> Result<&mut Device> {
        let address = device.address();
        if self.devices.contains_key(&address) {
            return Err(Error::Duplicate(address.to_string()));
        }
        let id = self.allocate_id();
        device.node_mut().set_id(id);
        tracing::debug!(%address, "Device added");
        Ok(self.devices.entry(address).or_insert(device))
    }

    /// Returns the device with this address, creating it if needed.
    pub fn get_or_create_device(&mut self, address: ExtAddress) -> &mut Device {
        let next_id = &mut self.next_id;
        self.devices.entry(address).or_insert_with(|| {
            let mut device = Device::new(address);
            device.node_mut().set_id(ResourceId::new(*next_id));
            *next_id += 1;
            tracing::debug!(%address, "Device created");
            device
        })
    }

    /// Looks up a device, including deleted ones.
    #[must_use]
    pub fn device(&self, address: ExtAddress) -> Option<&Device> {
        self.devices.get(&address)
    }

    /// Looks up a device for modification.
    #[must_use]
    pub fn device_mut(&mut self, address: ExtAddress) -> Option<&mut Device> {
        self.devices.get_mut(&address)
    }

    /// Iterates over devices that are not deleted.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values().filter(|d| !d.is_deleted())
    }

    /// Logically deletes a device and its sub-resources.
    ///
    /// Returns `false` if the device does not exist.
    pub fn delete_device(&mut self, address: ExtAddress) -> bool {
        let Some(device) = self.devices.get_mut(&address) else {
            return false;
        };
        device.mark_deleted();
        let subs: Vec<ResourceId> = device.sub_devices().iter().map(|(_, id)| *id).collect();
        for id in subs {
            self.delete_resource(id);
        }
        tracing::debug!(%address, "Device deleted");
        true
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Adds a resource and assigns its REST id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Value`] for an empty unique id and
    /// [`Error::Duplicate`] if a live resource with the same unique id
    /// exists.
    pub fn add_resource(&mut self, mut resource: Resource) -> Result<ResourceId> {
        if resource.unique_id().is_empty() {
            return Err(ValueError::Rejected {
                suffix: suffix::ATTR_UNIQUE_ID.to_string(),
                value: String::new(),
            }
            .into());
        }
        if self.resource_by_unique_id(resource.unique_id()).is_some() {
            return Err(Error::Duplicate(resource.unique_id().to_string()));
        }
        let id = self.allocate_id();
        resource.set_id(id);
        tracing::debug!(
            %id,
            unique_id = %resource.unique_id(),
            kind = %resource.kind(),
            "Resource added"
        );
        self.resources.push(resource);
        Ok(id)
    }

    /// Looks up a resource by REST id, including deleted ones.
    #[must_use]
    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id() == id)
    }

    /// Looks up a resource by REST id for modification.
    #[must_use]
    pub fn resource_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.id() == id)
    }

    /// Looks up a live resource by unique id.
    #[must_use]
    pub fn resource_by_unique_id(&self, unique_id: &UniqueId) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| !r.is_deleted() && r.unique_id() == unique_id)
    }

    /// Finds the live resource of a node endpoint whose type starts with
    /// `type_prefix`.
    ///
    /// Decoders use this to route a report to e.g. the `ZHATemperature`
    /// resource on endpoint 1.
    #[must_use]
    pub fn find_resource(
        &self,
        address: ExtAddress,
        endpoint: u8,
        type_prefix: &str,
    ) -> Option<&Resource> {
        self.resources.iter().find(|r| {
            !r.is_deleted()
                && r.type_name().starts_with(type_prefix)
                && r.unique_id().address() == Some(address)
                && r.unique_id().endpoint() == Some(endpoint)
        })
    }

    /// Returns the sub-resource of a device with this unique id.
    #[must_use]
    pub fn sub_device(&self, address: ExtAddress, unique_id: &UniqueId) -> Option<&Resource> {
        let id = self.device(address)?.sub_device(unique_id)?;
        self.resource(id).filter(|r| !r.is_deleted())
    }

    /// Iterates over live resources.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| !r.is_deleted())
    }

    /// Iterates over live resources for modification.
    pub fn resources_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.resources.iter_mut().filter(|r| !r.is_deleted())
    }

    /// Logically deletes a resource.
    ///
    /// Returns `false` if the resource does not exist or was already
    /// deleted.
    pub fn delete_resource(&mut self, id: ResourceId) -> bool {
        match self.resource_mut(id) {
            Some(r) if !r.is_deleted() => {
                r.mark_deleted();
                tracing::debug!(%id, "Resource deleted");
                true
            }
            _ => false,
        }
    }

    /// Returns the device owning a resource.
    #[must_use]
    pub fn owner(&self, id: ResourceId) -> Option<&Device> {
        let address = self.resource(id)?.unique_id().address()?;
        self.device(address)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
