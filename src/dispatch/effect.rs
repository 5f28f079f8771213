// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-suffix write policy.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::types::suffix;

/// How a write of a suffix is handled.
///
/// Suffixes not listed in the table are [`Effect::Hardware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Never writable.
    ReadOnly,
    /// Read-only on physical sensors, writable on virtual ones.
    ReadOnlyOnSensors,
    /// Light-level threshold; recomputes `state/dark` and `state/daylight`.
    Threshold,
    /// Numeric text (`config/lat`, `config/long`).
    Coordinate,
    /// Applied to the item only.
    Software,
    /// Sent to the hardware; applies the delta to measured values.
    Offset,
    /// Sent to the hardware.
    Hardware,
}

impl Effect {
    /// Returns the effect of writing `item_suffix`.
    ///
    /// # Examples
    ///
    /// ```
    /// use zhabridge_lib::dispatch::Effect;
    ///
    /// assert_eq!(Effect::of("config/pending"), Effect::ReadOnly);
    /// assert_eq!(Effect::of("config/heatsetpoint"), Effect::Hardware);
    /// ```
    #[must_use]
    pub fn of(item_suffix: &str) -> Self {
        table()
            .get(item_suffix)
            .copied()
            .unwrap_or(Self::Hardware)
    }

    /// Returns `true` if the write never reaches the hardware.
    #[must_use]
    pub fn is_software(self) -> bool {
        matches!(self, Self::Threshold | Self::Coordinate | Self::Software)
    }
}

fn table() -> &'static HashMap<&'static str, Effect> {
    static TABLE: OnceLock<HashMap<&'static str, Effect>> = OnceLock::new();
    TABLE.get_or_init(|| {
        use Effect::{Coordinate, Offset, ReadOnly, ReadOnlyOnSensors, Software, Threshold};
        HashMap::from([
            (suffix::ATTR_UNIQUE_ID, ReadOnly),
            (suffix::ATTR_EXT_ADDRESS, ReadOnly),
            (suffix::ATTR_MANUFACTURER_NAME, ReadOnly),
            (suffix::ATTR_MODEL_ID, ReadOnly),
            (suffix::ATTR_TYPE, ReadOnly),
            (suffix::ATTR_SW_VERSION, ReadOnly),
            (suffix::ATTR_LAST_SEEN, ReadOnly),
            (suffix::STATE_LAST_UPDATED, ReadOnly),
            (suffix::CONFIG_PENDING, ReadOnly),
            (suffix::CONFIG_SENSITIVITY_MAX, ReadOnly),
            (suffix::CONFIG_HOST_FLAGS, ReadOnly),
            (suffix::CONFIG_LAST_CHANGE_AMOUNT, ReadOnly),
            (suffix::CONFIG_LAST_CHANGE_SOURCE, ReadOnly),
            (suffix::CONFIG_LAST_CHANGE_TIME, ReadOnly),
            (suffix::CONFIG_ENROLLED, ReadOnly),
            (suffix::CONFIG_BATTERY, ReadOnlyOnSensors),
            (suffix::CONFIG_REACHABLE, ReadOnlyOnSensors),
            (suffix::CONFIG_THOLD_DARK, Threshold),
            (suffix::CONFIG_THOLD_OFFSET, Threshold),
            (suffix::CONFIG_LAT, Coordinate),
            (suffix::CONFIG_LONG, Coordinate),
            (suffix::ATTR_NAME, Software),
            (suffix::CONFIG_ON, Software),
            (suffix::CONFIG_SUNRISE_OFFSET, Software),
            (suffix::CONFIG_SUNSET_OFFSET, Software),
            (suffix::CONFIG_OFFSET, Offset),
        ])
    })
}
