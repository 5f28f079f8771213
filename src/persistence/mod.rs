// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted resource state.
//!
//! The gateway does not own a storage engine. It reads persisted item rows
//! when a device description is applied and hands changes to a
//! [`Persistence`] implementation, which is free to batch them:
//! [`schedule_save`](Persistence::schedule_save) is fire-and-forget.
//!
//! [`MemoryStore`] is the bundled in-memory implementation.

mod memory;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceItem};
use crate::types::{ResourceKind, UniqueId, Value};

pub use memory::MemoryStore;

/// A persisted item row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbItem {
    /// Item suffix.
    pub suffix: String,
    /// Stored value.
    pub value: Value,
    /// Time of the last set, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl DbItem {
    /// Builds the row for an item; `None` if the item has no value.
    #[must_use]
    pub fn from_item(item: &ResourceItem) -> Option<Self> {
        Some(Self {
            suffix: item.suffix().to_string(),
            value: item.value()?.clone(),
            timestamp_ms: item.last_set().map_or(0, |t| t.timestamp_millis()),
        })
    }
}

/// Group of state written together by a scheduled save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveTable {
    /// Sensor resources.
    Sensors,
    /// Light resources.
    Lights,
    /// Devices and their sub-device links.
    Devices,
}

impl fmt::Display for SaveTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sensors => "sensors",
            Self::Lights => "lights",
            Self::Devices => "devices",
        };
        f.write_str(name)
    }
}

impl From<ResourceKind> for SaveTable {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Sensors => Self::Sensors,
            ResourceKind::Lights => Self::Lights,
            ResourceKind::Devices => Self::Devices,
        }
    }
}

/// Storage used by the gateway.
///
/// Calls are made from the gateway's event loop and must not block.
pub trait Persistence: Send + Sync {
    /// Loads the rows of one resource.
    fn load_items(&self, unique_id: &UniqueId) -> Vec<DbItem>;

    /// Loads the rows of every resource belonging to a device.
    fn load_device_items(&self, device: &UniqueId) -> Vec<DbItem>;

    /// Stores one item of a resource.
    fn store_item(&self, resource: &Resource, item: &ResourceItem);

    /// Records that `sub` belongs to `device`.
    fn store_sub_device_link(&self, device: &UniqueId, sub: &UniqueId);

    /// Requests that `table` is saved within `delay`.
    fn schedule_save(&self, table: SaveTable, delay: Duration);
}
