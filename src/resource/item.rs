// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed, timestamped value cells.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::ValueError;
use crate::schema::ItemHandle;
use crate::types::{DataType, Value};

/// Result of a successful [`ResourceItem::set_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The stored value changed; `last_changed == last_set`.
    Changed,
    /// The value was set again without changing; only `last_set` moved.
    Unchanged,
    /// The item is static and already initialised; nothing was touched.
    Ignored,
}

impl SetOutcome {
    /// Returns `true` if the stored value changed.
    #[must_use]
    pub fn is_changed(self) -> bool {
        matches!(self, Self::Changed)
    }

    /// Returns `true` if the item was written (timestamps moved).
    #[must_use]
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// A typed value within a [`Resource`](super::Resource).
///
/// The type is fixed at creation. Every accepted [`set_value`](Self::set_value)
/// advances `last_set`; `last_changed` only advances when the value actually
/// changed, so `last_changed <= last_set` always holds and the two are equal
/// exactly when the latest write changed the value.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::resource::{ResourceItem, SetOutcome};
/// use zhabridge_lib::types::DataType;
///
/// let mut item = ResourceItem::new(DataType::Int16, "state/temperature");
/// assert_eq!(item.set_value(2100).unwrap(), SetOutcome::Changed);
/// assert_eq!(item.set_value(2100).unwrap(), SetOutcome::Unchanged);
/// assert!(item.last_changed() < item.last_set());
/// assert!(item.set_value(40_000).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceItem {
    suffix: String,
    data_type: DataType,
    value: Option<Value>,
    last_set: Option<DateTime<Utc>>,
    last_changed: Option<DateTime<Utc>>,
    is_public: bool,
    awake: bool,
    is_static: bool,
    need_push: bool,
    refresh_interval: Option<Duration>,
    schema_handle: Option<ItemHandle>,
}

impl ResourceItem {
    /// Creates an unset, public item.
    #[must_use]
    pub fn new(data_type: DataType, suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            data_type,
            value: None,
            last_set: None,
            last_changed: None,
            is_public: true,
            awake: false,
            is_static: false,
            need_push: false,
            refresh_interval: None,
            schema_handle: None,
        }
    }

    /// Returns the item suffix, e.g. `state/temperature`.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns the declared type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns the stored value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Returns the time of the last accepted write.
    #[must_use]
    pub fn last_set(&self) -> Option<DateTime<Utc>> {
        self.last_set
    }

    /// Returns the time the value last changed.
    #[must_use]
    pub fn last_changed(&self) -> Option<DateTime<Utc>> {
        self.last_changed
    }

    /// Sets the value at the current time.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueError`] if the value cannot be coerced to the declared
    /// type; the item is left untouched.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<SetOutcome, ValueError> {
        self.set_value_at(&value.into(), Utc::now())
    }

    /// Sets the value as of `now`.
    ///
    /// `last_set` is kept strictly increasing: if `now` is not after the
    /// previous `last_set`, the write is stamped one microsecond later.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueError`] if the value cannot be coerced to the declared
    /// type; the item is left untouched.
    pub fn set_value_at(
        &mut self,
        value: &Value,
        now: DateTime<Utc>,
    ) -> Result<SetOutcome, ValueError> {
        let coerced = self.data_type.coerce(value)?;

        if self.is_static && self.last_set.is_some() {
            return Ok(SetOutcome::Ignored);
        }

        let stamp = match self.last_set {
            Some(prev) if now <= prev => prev + TimeDelta::microseconds(1),
            _ => now,
        };

        let changed = self.value.as_ref() != Some(&coerced);
        self.last_set = Some(stamp);
        if changed {
            self.value = Some(coerced);
            self.last_changed = Some(stamp);
            self.need_push = true;
            Ok(SetOutcome::Changed)
        } else {
            Ok(SetOutcome::Unchanged)
        }
    }

    /// Restores both timestamps, e.g. from a persisted row.
    pub fn set_timestamps(&mut self, at: DateTime<Utc>) {
        self.last_set = Some(at);
        self.last_changed = Some(at);
    }

    /// Projects the value to an integer; `0` when unset or not numeric.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_number(&self) -> i64 {
        match &self.value {
            Some(Value::Int(i)) => *i,
            Some(Value::UInt(u)) => i64::try_from(*u).unwrap_or(i64::MAX),
            Some(Value::Real(r)) => *r as i64,
            Some(Value::Bool(b)) => i64::from(*b),
            Some(Value::Time(t)) => t.timestamp_millis(),
            Some(Value::Text(s)) => s.parse().unwrap_or(0),
            None => 0,
        }
    }

    /// Projects the value to a float; `0.0` when unset or not numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_real(&self) -> f64 {
        match &self.value {
            Some(Value::Real(r)) => *r,
            Some(Value::Text(s)) => s.parse().unwrap_or(0.0),
            _ => self.to_number() as f64,
        }
    }

    /// Projects the value to a bool; `false` when unset.
    #[must_use]
    pub fn to_bool(&self) -> bool {
        match &self.value {
            Some(Value::Bool(b)) => *b,
            Some(Value::Text(s)) => s == "true",
            Some(_) => self.to_number() != 0,
            None => false,
        }
    }

    /// Projects the value to text; empty when unset.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.value.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    /// Returns `true` if the item is part of the public REST representation.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Sets the public flag.
    pub fn set_public(&mut self, public: bool) {
        self.is_public = public;
    }

    /// Returns `true` if a report of this item means the device is awake.
    #[must_use]
    pub fn awake(&self) -> bool {
        self.awake
    }

    /// Sets the awake flag.
    pub fn set_awake(&mut self, awake: bool) {
        self.awake = awake;
    }

    /// Returns `true` if the item is static (initialised once).
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Sets the static flag.
    pub fn set_static(&mut self, is_static: bool) {
        self.is_static = is_static;
    }

    /// Returns `true` if a change is waiting to be pushed.
    #[must_use]
    pub fn need_push(&self) -> bool {
        self.need_push
    }

    /// Requests a push even though the value did not change.
    pub fn mark_need_push(&mut self) {
        self.need_push = true;
    }

    /// Clears the push request.
    pub fn clear_need_push(&mut self) {
        self.need_push = false;
    }

    /// Returns the refresh interval, if any.
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval
    }

    /// Sets the refresh interval.
    pub fn set_refresh_interval(&mut self, interval: Option<Duration>) {
        self.refresh_interval = interval;
    }

    /// Returns the handle of the template this item was created from.
    #[must_use]
    pub fn schema_handle(&self) -> Option<ItemHandle> {
        self.schema_handle
    }

    /// Binds the item to a template.
    pub fn set_schema_handle(&mut self, handle: Option<ItemHandle>) {
        self.schema_handle = handle;
    }
}
