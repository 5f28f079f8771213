// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Physical Zigbee nodes.

use super::Resource;
use crate::types::{DataType, ExtAddress, ResourceId, ResourceKind, UniqueId, suffix};

/// Type tag of the device-level resource.
const DEVICE_TYPE: &str = "Device";

/// A physical node, keyed by its extended address.
///
/// The device owns a device-level [`Resource`] for node wide attributes
/// (`attr/manufacturername`, `attr/modelid`, ...) and links to the
/// sub-resources exposed in the REST containers. A device is `managed` once
/// a device description has been applied to it.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::resource::Device;
/// use zhabridge_lib::types::ExtAddress;
///
/// let device = Device::new(ExtAddress::new(0x0012_4b00_1234_5678));
/// assert_eq!(device.unique_id().as_str(), "00:12:4b:00:12:34:56:78");
/// assert!(!device.is_managed());
/// assert_eq!(device.manufacturer(), "");
/// ```
#[derive(Debug, Clone)]
pub struct Device {
    address: ExtAddress,
    node: Resource,
    sub_devices: Vec<(UniqueId, ResourceId)>,
    managed: bool,
    deleted: bool,
}

impl Device {
    /// Creates a device with an empty device-level resource.
    #[must_use]
    pub fn new(address: ExtAddress) -> Self {
        let unique_id = UniqueId::generate(address, 0, 0);
        let mut node = Resource::new(ResourceKind::Devices, DEVICE_TYPE, unique_id);
        if let Some(item) = node.add_item(DataType::UInt64, suffix::ATTR_EXT_ADDRESS) {
            let _ = item.set_value(address.value());
            item.set_static(true);
        }
        node.add_item(DataType::String, suffix::ATTR_MANUFACTURER_NAME);
        node.add_item(DataType::String, suffix::ATTR_MODEL_ID);
        node.add_item(DataType::Bool, suffix::ATTR_SLEEPER);

        Self {
            address,
            node,
            sub_devices: Vec::new(),
            managed: false,
            deleted: false,
        }
    }

    /// Returns the extended address.
    #[must_use]
    pub fn address(&self) -> ExtAddress {
        self.address
    }

    /// Returns the unique id of the node (the bare address).
    #[must_use]
    pub fn unique_id(&self) -> &UniqueId {
        self.node.unique_id()
    }

    /// Returns the device-level resource.
    #[must_use]
    pub fn node(&self) -> &Resource {
        &self.node
    }

    /// Returns the device-level resource for modification.
    #[must_use]
    pub fn node_mut(&mut self) -> &mut Resource {
        &mut self.node
    }

    /// Returns the manufacturer name, empty if unknown.
    #[must_use]
    pub fn manufacturer(&self) -> String {
        self.node
            .item(suffix::ATTR_MANUFACTURER_NAME)
            .map(super::ResourceItem::to_text)
            .unwrap_or_default()
    }

    /// Returns the model id, empty if unknown.
    #[must_use]
    pub fn model_id(&self) -> String {
        self.node
            .item(suffix::ATTR_MODEL_ID)
            .map(super::ResourceItem::to_text)
            .unwrap_or_default()
    }

    /// Returns `true` if the node sleeps and only listens after reporting.
    #[must_use]
    pub fn is_sleeper(&self) -> bool {
        self.node
            .item(suffix::ATTR_SLEEPER)
            .is_some_and(super::ResourceItem::to_bool)
    }

    /// Returns `true` if a device description drives this device.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// Sets the managed flag.
    pub fn set_managed(&mut self, managed: bool) {
        self.managed = managed;
    }

    /// Returns the linked sub-resources.
    #[must_use]
    pub fn sub_devices(&self) -> &[(UniqueId, ResourceId)] {
        &self.sub_devices
    }

    /// Returns the REST id of the sub-resource with this unique id.
    #[must_use]
    pub fn sub_device(&self, unique_id: &UniqueId) -> Option<ResourceId> {
        self.sub_devices
            .iter()
            .find(|(uid, _)| uid == unique_id)
            .map(|(_, id)| *id)
    }

    /// Links a sub-resource; returns `false` if it was already linked.
    pub fn add_sub_device(&mut self, unique_id: UniqueId, id: ResourceId) -> bool {
        if self.sub_device(&unique_id).is_some() {
            return false;
        }
        self.sub_devices.push((unique_id, id));
        true
    }

    /// Returns `true` if the device was logically deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
        self.node.mark_deleted();
    }
}
