// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The gateway context and its configuration.
//!
//! The [`Gateway`] owns everything the core needs: the resource
//! [`Registry`](crate::resource::Registry), the
//! [`SchemaStore`](crate::schema::SchemaStore), the event bus and the
//! external collaborators (persistence, encoder, push sink, clock). It is
//! driven from one event loop through `&mut self`.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use zhabridge_lib::manager::{Gateway, GatewayConfig};
//! use zhabridge_lib::persistence::MemoryStore;
//! use zhabridge_lib::subscription::Subscribable;
//! use zhabridge_lib::types::ExtAddress;
//!
//! let mut gateway = Gateway::new(GatewayConfig::default(), Arc::new(MemoryStore::new()));
//! gateway
//!     .schemas_mut()
//!     .load_str(r#"{
//!         "manufacturername": "LUMI",
//!         "modelid": "lumi.weather",
//!         "subdevices": [{
//!             "type": "$TYPE_TEMPERATURE_SENSOR",
//!             "restapi": "/sensors",
//!             "uuid": ["$address.ext", "0x01", "0x0402"],
//!             "items": [{"name": "state/temperature"}]
//!         }]
//!     }"#)
//!     .unwrap();
//!
//! gateway.on_item_changed("state/temperature", |event| println!("{event}"));
//!
//! let address = ExtAddress::new(0x0015_8d00_0123_4567);
//! gateway.add_device(address, "LUMI", "lumi.weather");
//! let ids = gateway.init_device(address).unwrap();
//! gateway.apply_report(ids[0], "state/temperature", 2150).unwrap();
//! ```

mod config;
mod gateway;

pub use config::{DEFAULT_THOLD_DARK, DEFAULT_THOLD_OFFSET, GatewayConfig};
pub use gateway::Gateway;
