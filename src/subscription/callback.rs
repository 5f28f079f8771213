// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for event subscriptions.
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackRegistry`] - Registry storing and dispatching callbacks

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::event::Event;

/// Unique identifier for a subscription.
///
/// Returned when subscribing and used to unsubscribe later. Ids are never
/// reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a subscription id with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Callback receiving every event.
type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Registry of event callbacks.
///
/// Uses `parking_lot::RwLock` for interior mutability so subscriptions can
/// be added and removed through a shared reference. Callbacks are invoked
/// synchronously in subscription order, outside the lock, so a callback may
/// unsubscribe itself.
pub struct CallbackRegistry {
    /// Counter for generating unique subscription ids.
    next_id: AtomicU64,
    /// Callbacks for all events.
    event_callbacks: RwLock<BTreeMap<SubscriptionId, EventCallback>>,
    /// Callbacks for events of one item suffix.
    item_callbacks: RwLock<BTreeMap<SubscriptionId, (String, EventCallback)>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            event_callbacks: RwLock::new(BTreeMap::new()),
            item_callbacks: RwLock::new(BTreeMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Registers a callback for every event.
    pub fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.event_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for events of one item suffix.
    pub fn on_item_changed<F>(&self, suffix: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.item_callbacks
            .write()
            .insert(id, (suffix.into(), Arc::new(callback)));
        id
    }

    /// Removes a callback; returns `true` if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.event_callbacks.write().remove(&id).is_some()
            || self.item_callbacks.write().remove(&id).is_some()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatches an event to the matching callbacks.
    pub fn dispatch(&self, event: &Event) {
        let mut matching: Vec<(SubscriptionId, EventCallback)> = self
            .event_callbacks
            .read()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();
        matching.extend(
            self.item_callbacks
                .read()
                .iter()
                .filter(|(_, (suffix, _))| suffix == event.suffix())
                .map(|(id, (_, cb))| (*id, Arc::clone(cb))),
        );
        matching.sort_by_key(|(id, _)| *id);

        for (_, callback) in matching {
            callback(event);
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.event_callbacks.read().len() + self.item_callbacks.read().len()
    }

    /// Returns `true` if no callback is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}
