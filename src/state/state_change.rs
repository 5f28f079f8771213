// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pending hardware writes.
//!
//! A [`StateChange`] tracks one write to a device until the device reports
//! the written values back. It is driven by two inputs:
//!
//! - [`StateChange::tick`] - periodic; issues the write, reads back after
//!   `state_timeout` and gives up after `change_timeout`
//! - [`StateChange::verify`] - a reported value for one of the targets
//!
//! ```text
//!            tick: Write                 state timeout: Read
//! WaitSync ───────────────▶ WaitSync ─────────────────────────▶ WaitRead ─┐
//!     │                        │                                  ▲   │   │ state timeout: Read
//!     │                        │      all targets reported        │   └───┘
//!     │                        └──────────────┬───────────────────┘
//!     │                                       ▼
//!     │  change timeout                   Confirmed
//!     └──────────────────────▶ TimedOut
//! ```
//!
//! # Examples
//!
//! ```
//! use chrono::Utc;
//! use zhabridge_lib::state::{ChangeState, StateChange, StateChangeAction, WriteKind};
//! use zhabridge_lib::types::{ResourceId, Value};
//!
//! let now = Utc::now();
//! let mut change = StateChange::new(ResourceId::new(1), WriteKind::ZclAttribute, 1, now);
//! change.add_target("config/heatsetpoint", Value::Int(2200), None, None);
//!
//! assert_eq!(change.tick(now), Some(StateChangeAction::Write));
//! assert_eq!(change.tick(now), None);
//!
//! change.verify("config/heatsetpoint", &Value::Int(2200));
//! assert_eq!(change.state(), ChangeState::Confirmed);
//! ```

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::WriteParameters;
use crate::types::{ResourceId, Value};

/// Default time to wait in a state before reading back.
pub const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time before an unconfirmed change is abandoned.
pub const DEFAULT_CHANGE_TIMEOUT: Duration = Duration::from_secs(180);

/// Progress of a [`StateChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeState {
    /// The write is queued or was sent; waiting for a report.
    WaitSync,
    /// A read back was requested; waiting for its response.
    WaitRead,
    /// Every target was reported with its written value.
    Confirmed,
    /// The change timeout elapsed without confirmation.
    TimedOut,
}

impl ChangeState {
    /// Returns `true` for the final states.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Confirmed | Self::TimedOut)
    }
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitSync => "wait-sync",
            Self::WaitRead => "wait-read",
            Self::Confirmed => "confirmed",
            Self::TimedOut => "timed-out",
        };
        f.write_str(name)
    }
}

/// How a write reaches the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteKind {
    /// ZCL write attributes; the attribute can be read back.
    #[default]
    #[serde(rename = "zcl:attr", alias = "zcl")]
    ZclAttribute,
    /// Cluster specific ZCL command.
    #[serde(rename = "zcl:cmd")]
    ZclCommand,
    /// Tuya data point.
    #[serde(rename = "tuya")]
    Tuya,
}

impl WriteKind {
    /// Returns `true` if the written value can be read back from the device.
    #[must_use]
    pub fn supports_read_back(self) -> bool {
        matches!(self, Self::ZclAttribute)
    }
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ZclAttribute => "zcl:attr",
            Self::ZclCommand => "zcl:cmd",
            Self::Tuya => "tuya",
        };
        f.write_str(name)
    }
}

/// What the owner of a [`StateChange`] has to do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChangeAction {
    /// Send the write for all targets.
    Write,
    /// Read the target attributes back.
    Read,
}

/// One item written by a [`StateChange`].
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    suffix: String,
    value: Value,
    previous: Option<Value>,
    params: Option<WriteParameters>,
    verified: bool,
}

impl Target {
    /// Returns the item suffix.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns the value being written.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the item value before the write.
    #[must_use]
    pub fn previous(&self) -> Option<&Value> {
        self.previous.as_ref()
    }

    /// Returns the template write parameters, if any.
    #[must_use]
    pub fn params(&self) -> Option<&WriteParameters> {
        self.params.as_ref()
    }

    /// Returns `true` once the device reported the written value.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.verified
    }
}

/// A write waiting for confirmation by the device.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    resource: ResourceId,
    endpoint: u8,
    kind: WriteKind,
    targets: Vec<Target>,
    state: ChangeState,
    state_timeout: Duration,
    change_timeout: Duration,
    created: DateTime<Utc>,
    state_entered: DateTime<Utc>,
    write_issued: bool,
}

impl StateChange {
    /// Creates a change in [`ChangeState::WaitSync`] with default timeouts.
    #[must_use]
    pub fn new(resource: ResourceId, kind: WriteKind, endpoint: u8, now: DateTime<Utc>) -> Self {
        Self {
            resource,
            endpoint,
            kind,
            targets: Vec::new(),
            state: ChangeState::WaitSync,
            state_timeout: DEFAULT_STATE_TIMEOUT,
            change_timeout: DEFAULT_CHANGE_TIMEOUT,
            created: now,
            state_entered: now,
            write_issued: false,
        }
    }

    /// Sets the time spent in a state before reading back.
    #[must_use]
    pub fn with_state_timeout(mut self, timeout: Duration) -> Self {
        self.state_timeout = timeout;
        self
    }

    /// Sets the time before the change is abandoned.
    #[must_use]
    pub fn with_change_timeout(mut self, timeout: Duration) -> Self {
        self.change_timeout = timeout;
        self
    }

    /// Adds or replaces the target for `suffix`.
    pub fn add_target(
        &mut self,
        suffix: impl Into<String>,
        value: Value,
        previous: Option<Value>,
        params: Option<WriteParameters>,
    ) {
        let target = Target {
            suffix: suffix.into(),
            value,
            previous,
            params,
            verified: false,
        };
        match self.targets.iter_mut().find(|t| t.suffix == target.suffix) {
            Some(existing) => *existing = target,
            None => self.targets.push(target),
        }
    }

    /// Removes and returns the target for `suffix`.
    pub fn remove_target(&mut self, suffix: &str) -> Option<Target> {
        let index = self.targets.iter().position(|t| t.suffix == suffix)?;
        Some(self.targets.remove(index))
    }

    /// Replaces the pre-write value recorded for `suffix`.
    ///
    /// Used when this change supersedes an unconfirmed write, so the
    /// effects applied on confirmation span both writes.
    pub fn inherit_previous(&mut self, suffix: &str, previous: Option<Value>) {
        if let Some(target) = self.targets.iter_mut().find(|t| t.suffix == suffix) {
            target.previous = previous;
        }
    }

    /// Returns the targets in insertion order.
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Returns the target for `suffix`.
    #[must_use]
    pub fn target(&self, suffix: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.suffix == suffix)
    }

    /// Returns the resource being written.
    #[must_use]
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Returns the destination endpoint.
    #[must_use]
    pub fn endpoint(&self) -> u8 {
        self.endpoint
    }

    /// Returns the write kind.
    #[must_use]
    pub fn kind(&self) -> WriteKind {
        self.kind
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ChangeState {
        self.state
    }

    /// Returns the state timeout.
    #[must_use]
    pub fn state_timeout(&self) -> Duration {
        self.state_timeout
    }

    /// Returns the change timeout.
    #[must_use]
    pub fn change_timeout(&self) -> Duration {
        self.change_timeout
    }

    /// Returns `true` once every target was verified.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.state == ChangeState::Confirmed
    }

    /// Returns `true` in a final state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.is_final()
    }

    /// Feeds a reported value.
    ///
    /// Marks the target for `suffix` verified if the value equals the
    /// written one, and moves to [`ChangeState::Confirmed`] once all targets
    /// are verified. Returns `true` if the report verified a target.
    pub fn verify(&mut self, suffix: &str, reported: &Value) -> bool {
        if self.state.is_final() {
            return false;
        }
        let Some(target) = self.targets.iter_mut().find(|t| t.suffix == suffix) else {
            return false;
        };
        if target.value != *reported {
            tracing::trace!(
                resource = %self.resource,
                suffix,
                expected = %target.value,
                %reported,
                "Report does not match pending write"
            );
            return false;
        }
        target.verified = true;
        if self.targets.iter().all(|t| t.verified) {
            self.state = ChangeState::Confirmed;
            tracing::debug!(resource = %self.resource, kind = %self.kind, "State change confirmed");
        }
        true
    }

    /// Advances the change to `now`.
    ///
    /// Returns the action the owner has to carry out, if any.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<StateChangeAction> {
        if self.state.is_final() {
            return None;
        }

        if elapsed(self.created, now) >= self.change_timeout {
            self.state = ChangeState::TimedOut;
            tracing::warn!(
                resource = %self.resource,
                kind = %self.kind,
                targets = ?self.targets.iter().map(Target::suffix).collect::<Vec<_>>(),
                timeout = ?self.change_timeout,
                "State change timed out"
            );
            return None;
        }

        if !self.write_issued {
            self.write_issued = true;
            self.state_entered = now;
            tracing::debug!(resource = %self.resource, kind = %self.kind, "Issuing write");
            return Some(StateChangeAction::Write);
        }

        if elapsed(self.state_entered, now) < self.state_timeout {
            return None;
        }

        if self.kind.supports_read_back() {
            self.set_state(ChangeState::WaitRead, now);
            Some(StateChangeAction::Read)
        } else {
            self.set_state(ChangeState::TimedOut, now);
            tracing::warn!(
                resource = %self.resource,
                kind = %self.kind,
                "No confirmation and no way to read back"
            );
            None
        }
    }

    fn set_state(&mut self, state: ChangeState, now: DateTime<Utc>) {
        if self.state != state {
            tracing::debug!(resource = %self.resource, from = %self.state, to = %state, "State change");
        }
        self.state = state;
        self.state_entered = now;
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}
