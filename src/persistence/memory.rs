// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory persistence.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{DbItem, Persistence, SaveTable};
use crate::resource::{Resource, ResourceItem};
use crate::types::UniqueId;

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<UniqueId, Vec<DbItem>>,
    links: Vec<(UniqueId, UniqueId)>,
    pending: HashMap<SaveTable, Instant>,
    saves: usize,
}

/// [`Persistence`] backed by maps.
///
/// Scheduled saves are coalesced per table, keeping the earliest deadline;
/// [`take_due`](Self::take_due) completes the saves whose deadline passed.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::persistence::{DbItem, MemoryStore, Persistence};
/// use zhabridge_lib::types::{UniqueId, Value};
///
/// let store = MemoryStore::new();
/// let uid = UniqueId::from_string("00:12:4b:00:12:34:56:78-01-0402");
/// store.insert_item(&uid, DbItem {
///     suffix: "config/offset".into(),
///     value: Value::Int(-50),
///     timestamp_ms: 1_700_000_000_000,
/// });
/// assert_eq!(store.load_items(&uid).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a row.
    pub fn insert_item(&self, unique_id: &UniqueId, row: DbItem) {
        let mut inner = self.inner.lock();
        let rows = inner.items.entry(unique_id.clone()).or_default();
        match rows.iter_mut().find(|r| r.suffix == row.suffix) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
    }

    /// Returns the stored row of an item.
    #[must_use]
    pub fn item(&self, unique_id: &UniqueId, suffix: &str) -> Option<DbItem> {
        self.inner
            .lock()
            .items
            .get(unique_id)?
            .iter()
            .find(|r| r.suffix == suffix)
            .cloned()
    }

    /// Returns the recorded sub-device links.
    #[must_use]
    pub fn links(&self) -> Vec<(UniqueId, UniqueId)> {
        self.inner.lock().links.clone()
    }

    /// Returns the deadline of a pending save.
    #[must_use]
    pub fn save_deadline(&self, table: SaveTable) -> Option<Instant> {
        self.inner.lock().pending.get(&table).copied()
    }

    /// Completes the saves that are due at `now` and returns their tables.
    pub fn take_due(&self, now: Instant) -> Vec<SaveTable> {
        let mut inner = self.inner.lock();
        let due: Vec<SaveTable> = inner
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(table, _)| *table)
            .collect();
        for table in &due {
            inner.pending.remove(table);
        }
        inner.saves += due.len();
        due
    }

    /// Returns the number of completed saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }
}

impl Persistence for MemoryStore {
    fn load_items(&self, unique_id: &UniqueId) -> Vec<DbItem> {
        self.inner
            .lock()
            .items
            .get(unique_id)
            .cloned()
            .unwrap_or_default()
    }

    fn load_device_items(&self, device: &UniqueId) -> Vec<DbItem> {
        self.inner
            .lock()
            .items
            .iter()
            .filter(|(uid, _)| uid.as_str().starts_with(device.as_str()))
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect()
    }

    fn store_item(&self, resource: &Resource, item: &ResourceItem) {
        if let Some(row) = DbItem::from_item(item) {
            self.insert_item(resource.unique_id(), row);
        }
    }

    fn store_sub_device_link(&self, device: &UniqueId, sub: &UniqueId) {
        let mut inner = self.inner.lock();
        let link = (device.clone(), sub.clone());
        if !inner.links.contains(&link) {
            inner.links.push(link);
        }
    }

    fn schedule_save(&self, table: SaveTable, delay: Duration) {
        let deadline = Instant::now() + delay;
        let mut inner = self.inner.lock();
        inner
            .pending
            .entry(table)
            .and_modify(|d| *d = (*d).min(deadline))
            .or_insert(deadline);
        tracing::trace!(%table, ?delay, "Save scheduled");
    }
}
