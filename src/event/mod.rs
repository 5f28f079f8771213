// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for item value changes.
//!
//! Every accepted update of an item raises an [`Event`]. The gateway first
//! handles it internally (ETag, persistence, push) and then hands it to the
//! [`EventBus`], which delivers it to synchronous callbacks and async
//! channel receivers.
//!
//! # Examples
//!
//! ```
//! use zhabridge_lib::event::{Event, EventBus};
//! use zhabridge_lib::types::{ResourceId, ResourceKind};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe_channel();
//!
//! bus.publish(&Event::new(ResourceKind::Sensors, "state/open", ResourceId::new(1)));
//! assert_eq!(rx.try_recv().unwrap().suffix(), "state/open");
//! ```

mod event_bus;
mod resource_event;

pub use event_bus::EventBus;
pub use resource_event::Event;
