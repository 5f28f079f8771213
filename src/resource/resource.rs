// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! REST resources: ordered, suffix-unique collections of items.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::item::{ResourceItem, SetOutcome};
use crate::error::{Error, Result};
use crate::state::{StateChange, StateChangeAction};
use crate::types::{DataType, ResourceId, ResourceKind, UniqueId, Value, suffix};

/// Number of hex characters kept from the ETag digest.
const ETAG_LEN: usize = 32;

/// Type prefix of virtual (software only) resources.
const VIRTUAL_TYPE_PREFIX: &str = "CLIP";

/// A REST resource such as a sensor.
///
/// Items keep their declaration order and suffixes are unique. The ETag is
/// recomputed on every accepted mutation of a public item, and the resource
/// owns the [`StateChange`]s that are still waiting for hardware
/// confirmation.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::resource::Resource;
/// use zhabridge_lib::types::{DataType, ResourceKind, UniqueId};
///
/// let mut sensor = Resource::new(
///     ResourceKind::Sensors,
///     "ZHATemperature",
///     UniqueId::from_string("00:12:4b:00:12:34:56:78-01-0402"),
/// );
/// sensor.add_item(DataType::Int16, "state/temperature").unwrap();
/// assert!(sensor.add_item(DataType::Int16, "state/temperature").is_none());
///
/// let etag = sensor.etag().to_string();
/// sensor.set_item_value("state/temperature", 2100).unwrap();
/// assert_ne!(sensor.etag(), etag);
/// ```
#[derive(Debug, Clone)]
pub struct Resource {
    id: ResourceId,
    kind: ResourceKind,
    type_name: String,
    unique_id: UniqueId,
    items: Vec<ResourceItem>,
    revision: u64,
    etag: String,
    state_changes: Vec<StateChange>,
    needs_save: bool,
    deleted: bool,
}

impl Resource {
    /// Creates a resource with its `attr/uniqueid` and `attr/type` items.
    ///
    /// The REST id is assigned when the resource is added to a
    /// [`Registry`](super::Registry).
    #[must_use]
    pub fn new(kind: ResourceKind, type_name: impl Into<String>, unique_id: UniqueId) -> Self {
        let type_name = type_name.into();
        let mut resource = Self {
            id: ResourceId::new(0),
            kind,
            type_name: type_name.clone(),
            unique_id: unique_id.clone(),
            items: Vec::new(),
            revision: 0,
            etag: String::new(),
            state_changes: Vec::new(),
            needs_save: false,
            deleted: false,
        };

        let mut uid = ResourceItem::new(DataType::String, suffix::ATTR_UNIQUE_ID);
        if !unique_id.is_empty() {
            let _ = uid.set_value(unique_id.as_str());
        }
        let mut ty = ResourceItem::new(DataType::String, suffix::ATTR_TYPE);
        let _ = ty.set_value(type_name);
        resource.items.push(uid);
        resource.items.push(ty);
        resource.etag = resource.compute_etag();
        resource
    }

    /// Returns the REST id.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: ResourceId) {
        self.id = id;
    }

    /// Returns the REST container.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns the type tag, e.g. `ZHATemperature`.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the unique id.
    #[must_use]
    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    /// Returns `true` for virtual (`CLIP*`) resources.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.type_name.starts_with(VIRTUAL_TYPE_PREFIX)
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Adds an item.
    ///
    /// Returns `None` if an item with this suffix already exists.
    pub fn add_item(
        &mut self,
        data_type: DataType,
        suffix: impl Into<String>,
    ) -> Option<&mut ResourceItem> {
        let suffix = suffix.into();
        if self.item(&suffix).is_some() {
            return None;
        }
        self.items.push(ResourceItem::new(data_type, suffix));
        self.items.last_mut()
    }

    /// Looks up an item by suffix.
    #[must_use]
    pub fn item(&self, suffix: &str) -> Option<&ResourceItem> {
        debug_assert!(
            self.items.iter().filter(|i| i.suffix() == suffix).count() <= 1,
            "duplicate item {suffix}"
        );
        self.items.iter().find(|i| i.suffix() == suffix)
    }

    /// Looks up an item by suffix for modification.
    ///
    /// Changing the value through this handle bypasses the ETag; use
    /// [`set_item_value`](Self::set_item_value) for value updates.
    #[must_use]
    pub fn item_mut(&mut self, suffix: &str) -> Option<&mut ResourceItem> {
        self.items.iter_mut().find(|i| i.suffix() == suffix)
    }

    /// Returns `true` if the resource has an item with this suffix.
    #[must_use]
    pub fn has_item(&self, suffix: &str) -> bool {
        self.item(suffix).is_some()
    }

    /// Iterates over the items in declaration order.
    pub fn items(&self) -> impl Iterator<Item = &ResourceItem> {
        self.items.iter()
    }

    /// Returns the number of items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sets an item value at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParameterNotAvailable`] if the item does not exist and
    /// [`Error::Value`] if the value is rejected.
    pub fn set_item_value(&mut self, suffix: &str, value: impl Into<Value>) -> Result<SetOutcome> {
        self.set_item_value_at(suffix, &value.into(), Utc::now())
    }

    /// Sets an item value as of `now` and refreshes the ETag if the item is
    /// public and the write was accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParameterNotAvailable`] if the item does not exist and
    /// [`Error::Value`] if the value is rejected.
    pub fn set_item_value_at(
        &mut self,
        suffix: &str,
        value: &Value,
        now: DateTime<Utc>,
    ) -> Result<SetOutcome> {
        let item = self
            .item_mut(suffix)
            .ok_or_else(|| Error::ParameterNotAvailable(suffix.to_string()))?;
        let outcome = item.set_value_at(value, now)?;
        let public = item.is_public();
        if outcome.is_accepted() && public {
            self.refresh_etag();
        }
        Ok(outcome)
    }

    /// Sets `state/lastupdated`, if the resource has it.
    pub fn update_state_timestamp(&mut self, now: DateTime<Utc>) {
        if self.has_item(suffix::STATE_LAST_UPDATED) {
            let _ = self.set_item_value_at(suffix::STATE_LAST_UPDATED, &Value::Time(now), now);
        }
    }

    // =========================================================================
    // ETag
    // =========================================================================

    /// Returns the current ETag.
    #[must_use]
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Bumps the revision and recomputes the ETag.
    pub fn refresh_etag(&mut self) {
        self.revision += 1;
        self.etag = self.compute_etag();
    }

    fn compute_etag(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.revision.to_be_bytes());
        for item in self.items.iter().filter(|i| i.is_public()) {
            hasher.update(item.suffix().as_bytes());
            hasher.update([0]);
            if let Some(value) = item.value() {
                hasher.update(value.to_json().to_string().as_bytes());
            }
            hasher.update([0]);
        }
        let mut etag = hex::encode(hasher.finalize());
        etag.truncate(ETAG_LEN);
        etag
    }

    // =========================================================================
    // Pending state changes
    // =========================================================================

    /// Queues a state change.
    ///
    /// Targets of older changes with the same suffix are discarded; an older
    /// change left without targets is dropped. The new target takes over the
    /// pre-write value of the target it replaces.
    pub fn add_state_change(&mut self, mut change: StateChange) {
        let suffixes: Vec<String> = change
            .targets()
            .iter()
            .map(|t| t.suffix().to_string())
            .collect();
        for suffix in &suffixes {
            for older in &mut self.state_changes {
                if let Some(replaced) = older.remove_target(suffix) {
                    change.inherit_previous(suffix, replaced.previous().cloned());
                }
            }
        }
        self.state_changes.retain(|c| !c.targets().is_empty());
        self.state_changes.push(change);
    }

    /// Returns the pending state changes.
    #[must_use]
    pub fn state_changes(&self) -> &[StateChange] {
        &self.state_changes
    }

    /// Returns the pending state change targeting `suffix`, if any.
    #[must_use]
    pub fn pending_change(&self, suffix: &str) -> Option<&StateChange> {
        self.state_changes.iter().find(|c| c.target(suffix).is_some())
    }

    /// Feeds a reported value to the pending changes.
    ///
    /// Returns the changes that became confirmed; they are removed from the
    /// pending set.
    pub fn verify_report(&mut self, suffix: &str, reported: &Value) -> Vec<StateChange> {
        for change in &mut self.state_changes {
            change.verify(suffix, reported);
        }
        let (confirmed, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.state_changes)
            .into_iter()
            .partition(StateChange::is_confirmed);
        self.state_changes = pending;
        confirmed
    }

    /// Advances the pending changes.
    ///
    /// Returns the actions to carry out together with a snapshot of the
    /// change that requested them. Confirmed and timed out changes are
    /// removed.
    pub fn tick_state_changes(
        &mut self,
        now: DateTime<Utc>,
    ) -> Vec<(StateChangeAction, StateChange)> {
        let mut actions = Vec::new();
        for change in &mut self.state_changes {
            if let Some(action) = change.tick(now) {
                actions.push((action, change.clone()));
            }
        }
        self.state_changes.retain(|c| !c.is_finished());
        actions
    }

    // =========================================================================
    // Flags
    // =========================================================================

    /// Returns `true` if the resource has unsaved changes.
    #[must_use]
    pub fn needs_save(&self) -> bool {
        self.needs_save
    }

    /// Marks the resource dirty.
    pub fn set_needs_save(&mut self) {
        self.needs_save = true;
    }

    /// Clears the dirty flag after a save.
    pub fn clear_needs_save(&mut self) {
        self.needs_save = false;
    }

    /// Returns `true` if the resource was logically deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
        self.state_changes.clear();
    }
}
