// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device descriptions and schema driven initialisation.
//!
//! A [`DeviceDescription`] declares which REST resources a device model
//! exposes and how their items are typed, defaulted and written. The
//! [`SchemaStore`] owns the loaded descriptions and hands out
//! [`ItemHandle`]s that items keep as a back reference to their template.
//!
//! [`init_device_from_schema`] applies a description to a device;
//! [`init_device_basic`] is the fallback for devices without one.

mod description;
mod init;
mod store;

pub use description::{
    DeviceDescription, ItemTemplate, SubDevice, WriteParameters, constant_to_string,
    parse_unsigned,
};
pub use init::{init_device_basic, init_device_from_schema, unique_id_from_template};
pub use store::{ItemHandle, SchemaStore};
