// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for types that raise events.

use crate::event::Event;
use crate::subscription::SubscriptionId;

/// Types that deliver [`Event`]s to synchronous callbacks.
///
/// Implemented by [`EventBus`](crate::event::EventBus) and by the
/// [`Gateway`](crate::Gateway), which forwards to its bus.
pub trait Subscribable {
    /// Subscribes to every event.
    fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static;

    /// Subscribes to events of one item suffix, e.g. `state/temperature`.
    fn on_item_changed<F>(&self, suffix: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static;

    /// Removes a subscription; returns `true` if it existed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
