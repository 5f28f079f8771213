// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for value change notifications.

use tokio::sync::broadcast;

use super::Event;
use crate::subscription::{CallbackRegistry, Subscribable, SubscriptionId};

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fans events out to synchronous callbacks and async receivers.
///
/// Callbacks registered through [`Subscribable`] run inside
/// [`publish`](Self::publish), before it returns. Async consumers get a
/// tokio broadcast receiver from [`subscribe_channel`](Self::subscribe_channel);
/// a slow receiver loses the oldest events (`RecvError::Lagged`) once the
/// channel capacity is exceeded.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use zhabridge_lib::event::{Event, EventBus};
/// use zhabridge_lib::subscription::Subscribable;
/// use zhabridge_lib::types::{ResourceId, ResourceKind};
///
/// let bus = EventBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// bus.on_event(move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.publish(&Event::new(ResourceKind::Sensors, "state/open", ResourceId::new(2)));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Debug)]
pub struct EventBus {
    callbacks: CallbackRegistry,
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus with the given channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            callbacks: CallbackRegistry::new(),
            sender,
        }
    }

    /// Subscribes an async receiver to all events published from now on.
    #[must_use]
    pub fn subscribe_channel(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publishes an event.
    ///
    /// Callbacks run synchronously in subscription order, then the event
    /// is sent to the channel receivers. Without subscribers the event is
    /// discarded.
    pub fn publish(&self, event: &Event) {
        self.callbacks.dispatch(event);
        if self.sender.receiver_count() > 0 {
            // Only fails without receivers.
            let _ = self.sender.send(event.clone());
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscribable for EventBus {
    fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.callbacks.on_event(callback)
    }

    fn on_item_changed<F>(&self, suffix: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.callbacks.on_item_changed(suffix, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.callbacks.unsubscribe(id)
    }
}
