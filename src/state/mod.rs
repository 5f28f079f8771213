// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Confirmation of hardware writes.
//!
//! Writes to sleeping or lossy mesh devices are not acknowledged reliably.
//! Instead of trusting the write, the gateway keeps a [`StateChange`] per
//! write on the target resource and waits until the device reports the
//! written values, reading them back or giving up when timeouts elapse.

mod state_change;

pub use state_change::{
    ChangeState, DEFAULT_CHANGE_TIMEOUT, DEFAULT_STATE_TIMEOUT, StateChange, StateChangeAction,
    Target, WriteKind,
};
