// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value and identifier types for the resource model.
//!
//! # Types
//!
//! - [`DataType`] - Declared type of a resource item
//! - [`Value`] - Typed value, coerced to the declared type before storage
//! - [`ExtAddress`] - 64-bit IEEE address of a node
//! - [`UniqueId`] - Stable id derived from address, endpoint and cluster
//! - [`ResourceId`] - Registry-assigned REST id
//! - [`ResourceKind`] - REST container (`sensors`, `lights`, `devices`)
//!
//! The [`suffix`] module lists the well-known item suffixes.

mod ids;
pub mod suffix;
mod value;

pub use ids::{ExtAddress, ResourceId, ResourceKind, UniqueId};
pub use value::{DataType, TIME_FORMAT, Value};
