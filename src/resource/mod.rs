// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The REST resource model.
//!
//! - [`ResourceItem`] - Typed, timestamped value cell
//! - [`Resource`] - Suffix-unique collection of items with an ETag and the
//!   pending [`StateChange`](crate::state::StateChange)s
//! - [`Device`] - Physical node owning a device-level resource and its
//!   sub-resources
//! - [`Registry`] - Owner of all devices and resources
//!
//! [`resource_to_map`] renders a resource the way REST clients see it.

mod device;
mod item;
mod map;
mod registry;
#[allow(clippy::module_inception)]
mod resource;

pub use device::Device;
pub use item::{ResourceItem, SetOutcome};
pub use map::{map_value, resource_to_map};
pub use registry::Registry;
pub use resource::Resource;
