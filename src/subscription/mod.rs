// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback based event subscriptions.
//!
//! - [`SubscriptionId`] - A unique identifier for a subscription, used to unsubscribe
//! - [`CallbackRegistry`] - Registry that stores callbacks and dispatches events
//! - [`Subscribable`] - Trait for types that support event subscriptions
//!
//! # Usage
//!
//! ```
//! use zhabridge_lib::event::{Event, EventBus};
//! use zhabridge_lib::subscription::Subscribable;
//! use zhabridge_lib::types::{ResourceId, ResourceKind};
//!
//! let bus = EventBus::new();
//! let sub_id = bus.on_item_changed("state/temperature", |event| {
//!     println!("{event} changed");
//! });
//!
//! bus.publish(&Event::new(ResourceKind::Sensors, "state/temperature", ResourceId::new(1)));
//! assert!(bus.unsubscribe(sub_id));
//! ```

mod callback;
mod subscribable;

pub use callback::{CallbackRegistry, SubscriptionId};
pub use subscribable::Subscribable;
