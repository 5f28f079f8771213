// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Well-known item suffixes and their default types.
//!
//! Suffixes are category prefixed (`attr/`, `state/`, `config/`). Device
//! descriptions may omit the `type` of any item listed here.

use super::DataType;

pub const ATTR_UNIQUE_ID: &str = "attr/uniqueid";
pub const ATTR_EXT_ADDRESS: &str = "attr/extaddress";
pub const ATTR_MANUFACTURER_NAME: &str = "attr/manufacturername";
pub const ATTR_MODEL_ID: &str = "attr/modelid";
pub const ATTR_NAME: &str = "attr/name";
pub const ATTR_TYPE: &str = "attr/type";
pub const ATTR_SLEEPER: &str = "attr/sleeper";
pub const ATTR_SW_VERSION: &str = "attr/swversion";
pub const ATTR_LAST_SEEN: &str = "attr/lastseen";

pub const STATE_TEMPERATURE: &str = "state/temperature";
pub const STATE_HUMIDITY: &str = "state/humidity";
pub const STATE_PRESSURE: &str = "state/pressure";
pub const STATE_LIGHT_LEVEL: &str = "state/lightlevel";
pub const STATE_LUX: &str = "state/lux";
pub const STATE_DARK: &str = "state/dark";
pub const STATE_DAYLIGHT: &str = "state/daylight";
pub const STATE_PRESENCE: &str = "state/presence";
pub const STATE_BUTTON_EVENT: &str = "state/buttonevent";
pub const STATE_OPEN: &str = "state/open";
pub const STATE_BATTERY: &str = "state/battery";
pub const STATE_LOW_BATTERY: &str = "state/lowbattery";
pub const STATE_TAMPERED: &str = "state/tampered";
pub const STATE_LAST_UPDATED: &str = "state/lastupdated";
pub const STATE_ON: &str = "state/on";
pub const STATE_REACHABLE: &str = "state/reachable";
pub const STATE_ORIENTATION_X: &str = "state/orientation_x";
pub const STATE_ORIENTATION_Y: &str = "state/orientation_y";
pub const STATE_ORIENTATION_Z: &str = "state/orientation_z";
pub const STATE_X: &str = "state/x";
pub const STATE_Y: &str = "state/y";
pub const STATE_VIBRATION: &str = "state/vibration";
pub const STATE_NOTIFICATION: &str = "state/notification";
pub const STATE_ARM_STATE: &str = "state/armstate";
pub const STATE_PANEL: &str = "state/panel";
pub const STATE_HEATING: &str = "state/heating";
pub const STATE_VALVE: &str = "state/valve";
pub const STATE_LOCALTIME: &str = "state/localtime";

pub const CONFIG_ON: &str = "config/on";
pub const CONFIG_REACHABLE: &str = "config/reachable";
pub const CONFIG_BATTERY: &str = "config/battery";
pub const CONFIG_OFFSET: &str = "config/offset";
pub const CONFIG_THOLD_DARK: &str = "config/tholddark";
pub const CONFIG_THOLD_OFFSET: &str = "config/tholdoffset";
pub const CONFIG_DURATION: &str = "config/duration";
pub const CONFIG_DELAY: &str = "config/delay";
pub const CONFIG_SENSITIVITY: &str = "config/sensitivity";
pub const CONFIG_SENSITIVITY_MAX: &str = "config/sensitivitymax";
pub const CONFIG_PENDING: &str = "config/pending";
pub const CONFIG_HOST_FLAGS: &str = "config/hostflags";
pub const CONFIG_LAST_CHANGE_AMOUNT: &str = "config/lastchangeamount";
pub const CONFIG_LAST_CHANGE_SOURCE: &str = "config/lastchangesource";
pub const CONFIG_LAST_CHANGE_TIME: &str = "config/lastchangetime";
pub const CONFIG_ENROLLED: &str = "config/enrolled";
pub const CONFIG_HEAT_SETPOINT: &str = "config/heatsetpoint";
pub const CONFIG_MODE: &str = "config/mode";
pub const CONFIG_LED_INDICATION: &str = "config/ledindication";
pub const CONFIG_DEVICE_MODE: &str = "config/devicemode";
pub const CONFIG_CLICK_MODE: &str = "config/clickmode";
pub const CONFIG_USER_TEST: &str = "config/usertest";
pub const CONFIG_LAT: &str = "config/lat";
pub const CONFIG_LONG: &str = "config/long";
pub const CONFIG_SUNRISE_OFFSET: &str = "config/sunriseoffset";
pub const CONFIG_SUNSET_OFFSET: &str = "config/sunsetoffset";
pub const CONFIG_ALERT: &str = "config/alert";
pub const CONFIG_LOCK: &str = "config/lock";
pub const CONFIG_MELODY: &str = "config/melody";
pub const CONFIG_VOLUME: &str = "config/volume";
pub const CONFIG_CHECKIN: &str = "config/checkin";
pub const CONFIG_TRIGGER_DISTANCE: &str = "config/triggerdistance";
pub const CONFIG_RESET_PRESENCE: &str = "config/resetpresence";
pub const CONFIG_DETECTION_RANGE: &str = "config/detectionrange";
pub const CONFIG_SELF_TEST: &str = "config/selftest";
pub const CONFIG_GROUP: &str = "config/group";

/// Returns the default type of a well-known suffix.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::types::{suffix, DataType};
///
/// assert_eq!(suffix::default_type(suffix::CONFIG_OFFSET), Some(DataType::Int16));
/// assert_eq!(suffix::default_type("state/whatever"), None);
/// ```
#[must_use]
pub fn default_type(suffix: &str) -> Option<DataType> {
    let data_type = match suffix {
        ATTR_UNIQUE_ID | ATTR_MANUFACTURER_NAME | ATTR_MODEL_ID | ATTR_NAME | ATTR_TYPE
        | ATTR_SW_VERSION | STATE_NOTIFICATION | STATE_ARM_STATE | STATE_PANEL | CONFIG_MODE
        | CONFIG_DEVICE_MODE | CONFIG_CLICK_MODE | CONFIG_LAT | CONFIG_LONG | CONFIG_ALERT
        | CONFIG_TRIGGER_DISTANCE | CONFIG_GROUP => DataType::String,

        ATTR_SLEEPER | STATE_DARK | STATE_DAYLIGHT | STATE_PRESENCE | STATE_OPEN
        | STATE_LOW_BATTERY | STATE_TAMPERED | STATE_ON | STATE_REACHABLE | STATE_VIBRATION
        | STATE_HEATING | CONFIG_ON | CONFIG_REACHABLE | CONFIG_LED_INDICATION
        | CONFIG_USER_TEST | CONFIG_LOCK | CONFIG_RESET_PRESENCE | CONFIG_SELF_TEST => {
            DataType::Bool
        }

        ATTR_LAST_SEEN | STATE_LAST_UPDATED | STATE_LOCALTIME | CONFIG_LAST_CHANGE_TIME => {
            DataType::Time
        }

        ATTR_EXT_ADDRESS => DataType::UInt64,

        STATE_TEMPERATURE | STATE_PRESSURE | STATE_ORIENTATION_X | STATE_ORIENTATION_Y
        | STATE_ORIENTATION_Z | CONFIG_OFFSET | CONFIG_HEAT_SETPOINT => DataType::Int16,

        CONFIG_SUNRISE_OFFSET | CONFIG_SUNSET_OFFSET => DataType::Int8,

        STATE_BATTERY | STATE_VALVE | CONFIG_BATTERY | CONFIG_SENSITIVITY
        | CONFIG_SENSITIVITY_MAX | CONFIG_LAST_CHANGE_SOURCE | CONFIG_MELODY | CONFIG_VOLUME => {
            DataType::UInt8
        }

        STATE_HUMIDITY | STATE_LIGHT_LEVEL | STATE_X | STATE_Y | CONFIG_THOLD_DARK
        | CONFIG_THOLD_OFFSET | CONFIG_DURATION | CONFIG_DELAY | CONFIG_PENDING
        | CONFIG_LAST_CHANGE_AMOUNT => DataType::UInt16,

        STATE_LUX | STATE_BUTTON_EVENT | CONFIG_HOST_FLAGS | CONFIG_ENROLLED | CONFIG_CHECKIN
        | CONFIG_DETECTION_RANGE => DataType::UInt32,

        _ => return None,
    };
    Some(data_type)
}

/// Returns the category of a suffix (`state`, `config`, `attr`, ...).
#[must_use]
pub fn category(suffix: &str) -> &str {
    suffix.split_once('/').map_or(suffix, |(category, _)| category)
}

/// Returns the key of a suffix without its category.
#[must_use]
pub fn key(suffix: &str) -> &str {
    suffix.split_once('/').map_or(suffix, |(_, key)| key)
}
