// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ZhaBridge` Lib - the resource model and state reconciliation core of a
//! Zigbee REST gateway.
//!
//! The crate sits between the wire protocol layer and the REST, push and
//! persistence layers. It does not own any wire or file format: frames
//! come in through [`protocol::Decoder`]s, requests leave through an
//! [`protocol::Encoder`], and storage is behind the
//! [`persistence::Persistence`] trait.
//!
//! # Components
//!
//! - **Resource model**: typed, timestamped [`resource::ResourceItem`]s
//!   grouped into [`resource::Resource`]s (one per sensor or light) that
//!   belong to [`resource::Device`]s, all owned by a [`resource::Registry`]
//! - **Device descriptions**: JSON files loaded into a
//!   [`schema::SchemaStore`] that declare the sub-resources and items of a
//!   device model
//! - **State changes**: writes to managed devices are tracked until a
//!   report confirms them or they time out ([`state::StateChange`])
//! - **Write dispatch**: validation and routing of writes through a
//!   per-suffix policy table and vendor encoders ([`dispatch`])
//! - **Events**: every accepted item update is published synchronously
//!   and on a broadcast channel ([`event::EventBus`])
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use zhabridge_lib::manager::{Gateway, GatewayConfig};
//! use zhabridge_lib::persistence::MemoryStore;
//! use zhabridge_lib::types::ExtAddress;
//!
//! # fn main() -> zhabridge_lib::Result<()> {
//! let mut gateway = Gateway::new(GatewayConfig::default(), Arc::new(MemoryStore::new()));
//! gateway.schemas_mut().load_str(r#"{
//!     "manufacturername": "$MF_LUMI",
//!     "modelid": "lumi.sensor_ht*",
//!     "subdevices": [{
//!         "type": "$TYPE_HUMIDITY_SENSOR",
//!         "restapi": "/sensors",
//!         "uuid": ["$address.ext", "0x01", "0x0405"],
//!         "items": [
//!             {"name": "state/humidity"},
//!             {"name": "config/offset", "default": 0}
//!         ]
//!     }]
//! }"#)?;
//!
//! let address = ExtAddress::new(0x0015_8d00_0123_4567);
//! gateway.add_device(address, "LUMI", "lumi.sensor_ht.agl02");
//! let ids = gateway.init_device(address)?;
//!
//! gateway.apply_report(ids[0], "state/humidity", 4520_u16)?;
//! let map = gateway.resource_to_map(ids[0], None).unwrap();
//! assert_eq!(map["state"]["humidity"], 4520);
//! # Ok(())
//! # }
//! ```
//!
//! # Event Loop
//!
//! The [`Gateway`] is not shared between threads; one task owns it and
//! feeds it indications and ticks:
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use zhabridge_lib::manager::{Gateway, GatewayConfig};
//! use zhabridge_lib::persistence::MemoryStore;
//! use zhabridge_lib::protocol::Indication;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (push_tx, _push_rx) = mpsc::unbounded_channel();
//!     let (_frames_tx, mut frames) = mpsc::channel::<Indication>(64);
//!
//!     let mut gateway = Gateway::new(GatewayConfig::default(), Arc::new(MemoryStore::new()))
//!         .with_push_sink(Arc::new(push_tx));
//!     let mut ticker = gateway.ticker();
//!
//!     loop {
//!         tokio::select! {
//!             _ = ticker.tick() => {
//!                 gateway.tick();
//!             }
//!             Some(indication) = frames.recv() => {
//!                 gateway.handle_indication(&indication);
//!             }
//!         }
//!     }
//! }
//! ```

pub mod clock;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod manager;
pub mod persistence;
pub mod protocol;
pub mod resource;
pub mod schema;
pub mod state;
pub mod subscription;
pub mod types;

pub use error::{ApiError, Error, Result, SchemaError, ValueError};
pub use manager::{Gateway, GatewayConfig};
pub use subscription::{CallbackRegistry, Subscribable, SubscriptionId};
