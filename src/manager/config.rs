// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::state::{DEFAULT_CHANGE_TIMEOUT, DEFAULT_STATE_TIMEOUT};

/// Default light level at or below which `state/dark` is set.
pub const DEFAULT_THOLD_DARK: u16 = 12000;

/// Default distance above the dark threshold at which `state/daylight` is set.
pub const DEFAULT_THOLD_OFFSET: u16 = 7000;

/// Configuration of a [`Gateway`](super::Gateway).
///
/// Durations are (de)serialized as milliseconds; missing fields take their
/// defaults.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use zhabridge_lib::manager::GatewayConfig;
///
/// let config = GatewayConfig::default()
///     .with_tick_interval(Duration::from_millis(500))
///     .with_change_timeout(Duration::from_secs(60));
/// assert_eq!(config.tick_interval, Duration::from_millis(500));
///
/// let parsed = GatewayConfig::from_json(r#"{"state_timeout": 2000}"#).unwrap();
/// assert_eq!(parsed.state_timeout, Duration::from_secs(2));
/// assert_eq!(parsed.thold_dark, 12000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Granularity of state change timeouts.
    #[serde(with = "millis")]
    pub tick_interval: Duration,
    /// Time in a state change state before reading back.
    #[serde(with = "millis")]
    pub state_timeout: Duration,
    /// Time before a state change is abandoned.
    #[serde(with = "millis")]
    pub change_timeout: Duration,
    /// Save delay after routine changes.
    #[serde(with = "millis")]
    pub save_delay_short: Duration,
    /// Save delay for low priority data.
    #[serde(with = "millis")]
    pub save_delay_long: Duration,
    /// Save delay for rarely changing data.
    #[serde(with = "millis")]
    pub save_delay_huge: Duration,
    /// Dark threshold used when a sensor has no `config/tholddark`.
    pub thold_dark: u16,
    /// Daylight offset used when a sensor has no `config/tholdoffset`.
    pub thold_offset: u16,
}

impl GatewayConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or mistyped fields.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sets the tick interval.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the default state timeout.
    #[must_use]
    pub fn with_state_timeout(mut self, timeout: Duration) -> Self {
        self.state_timeout = timeout;
        self
    }

    /// Sets the default change timeout.
    #[must_use]
    pub fn with_change_timeout(mut self, timeout: Duration) -> Self {
        self.change_timeout = timeout;
        self
    }

    /// Sets the three save delays.
    #[must_use]
    pub fn with_save_delays(mut self, short: Duration, long: Duration, huge: Duration) -> Self {
        self.save_delay_short = short;
        self.save_delay_long = long;
        self.save_delay_huge = huge;
        self
    }

    /// Sets the light level threshold defaults.
    #[must_use]
    pub fn with_light_thresholds(mut self, dark: u16, offset: u16) -> Self {
        self.thold_dark = dark;
        self.thold_offset = offset;
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            state_timeout: DEFAULT_STATE_TIMEOUT,
            change_timeout: DEFAULT_CHANGE_TIMEOUT,
            save_delay_short: Duration::from_secs(5),
            save_delay_long: Duration::from_secs(15 * 60),
            save_delay_huge: Duration::from_secs(60 * 60),
            thold_dark: DEFAULT_THOLD_DARK,
            thold_offset: DEFAULT_THOLD_OFFSET,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
