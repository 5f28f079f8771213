// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attribute write dispatch.
//!
//! A write is first planned by [`plan_write`]: the item is looked up, the
//! suffix policy ([`Effect`]) is checked and the value is validated. The
//! resulting [`Route`] says where it goes:
//!
//! - [`Route::Software`] - applied to the item, never sent
//! - [`Route::Managed`] - tracked by a [`StateChange`](crate::state::StateChange)
//!   until the device confirms it
//! - [`Route::Vendor`] - sent through the [`VendorEncoder`] registered for
//!   the device's model and applied at once
//!
//! The [`Gateway`](crate::manager::Gateway) carries the plan out.

mod dispatcher;
mod effect;
mod vendor;

pub use dispatcher::{ManagedWrite, Route, WriteOutcome, WritePlan, plan_write};
pub use effect::Effect;
pub use vendor::{VendorEncoder, VendorEncoderRegistry};
