// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device description (DDF) documents.
//!
//! A device description declares, for one or more manufacturer/model
//! pairs, the sub-devices a node exposes and the items each of them
//! carries:
//!
//! ```json
//! {
//!   "manufacturername": "LUMI",
//!   "modelid": "lumi.weather",
//!   "sleeper": true,
//!   "subdevices": [{
//!     "type": "$TYPE_TEMPERATURE_SENSOR",
//!     "restapi": "/sensors",
//!     "uuid": ["$address.ext", "0x01", "0x0402"],
//!     "items": [
//!       { "name": "state/temperature" },
//!       { "name": "config/offset", "default": 0,
//!         "write": { "fn": "zcl:attr", "cl": "0x0402", "at": "0xff00", "dt": "0x29" } }
//!     ]
//!   }]
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use wildmatch::WildMatch;

use crate::error::SchemaError;
use crate::state::WriteKind;
use crate::types::{DataType, ResourceKind, Value, suffix};

/// Symbolic constants accepted in `manufacturername` and `type`.
const CONSTANTS: &[(&str, &str)] = &[
    ("$MF_BOSCH", "BOSCH"),
    ("$MF_IKEA", "IKEA of Sweden"),
    ("$MF_LUMI", "LUMI"),
    ("$MF_PHILIPS", "Philips"),
    ("$MF_SIGNIFY", "Signify Netherlands B.V."),
    ("$MF_TUYA", "_TZ3000_"),
    ("$MF_XIAOMI", "XIAOMI"),
    ("$TYPE_AIR_QUALITY_SENSOR", "ZHAAirQuality"),
    ("$TYPE_ALARM_SENSOR", "ZHAAlarm"),
    ("$TYPE_ANCILLARY_CONTROL", "ZHAAncillaryControl"),
    ("$TYPE_BATTERY_SENSOR", "ZHABattery"),
    ("$TYPE_DOOR_LOCK", "ZHADoorLock"),
    ("$TYPE_FIRE_SENSOR", "ZHAFire"),
    ("$TYPE_HUMIDITY_SENSOR", "ZHAHumidity"),
    ("$TYPE_LIGHT_LEVEL_SENSOR", "ZHALightLevel"),
    ("$TYPE_OPEN_CLOSE_SENSOR", "ZHAOpenClose"),
    ("$TYPE_PRESENCE_SENSOR", "ZHAPresence"),
    ("$TYPE_PRESSURE_SENSOR", "ZHAPressure"),
    ("$TYPE_SWITCH", "ZHASwitch"),
    ("$TYPE_TEMPERATURE_SENSOR", "ZHATemperature"),
    ("$TYPE_THERMOSTAT", "ZHAThermostat"),
    ("$TYPE_VIBRATION_SENSOR", "ZHAVibration"),
    ("$TYPE_WATER_LEAK_SENSOR", "ZHAWater"),
];

/// Resolves a symbolic constant such as `$MF_LUMI`; other strings are
/// returned unchanged.
#[must_use]
pub fn constant_to_string(s: &str) -> &str {
    CONSTANTS
        .iter()
        .find(|(name, _)| *name == s)
        .map_or(s, |(_, value)| value)
}

/// Parses an unsigned number given as `0x` prefixed hex or decimal.
#[must_use]
pub fn parse_unsigned(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// A device description.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceDescription {
    /// Manufacturer name patterns.
    #[serde(rename = "manufacturername", deserialize_with = "one_or_many")]
    pub manufacturer_names: Vec<String>,
    /// Model id patterns, `*` and `?` wildcards allowed.
    #[serde(rename = "modelid", deserialize_with = "one_or_many")]
    pub model_ids: Vec<String>,
    /// Product name.
    #[serde(default)]
    pub product: Option<String>,
    /// Whether the node sleeps; `None` leaves `attr/sleeper` alone.
    #[serde(default)]
    pub sleeper: Option<bool>,
    /// Maturity status (`Draft`, `Bronze`, `Silver`, `Gold`).
    #[serde(default)]
    pub status: Option<String>,
    /// Sub-device templates.
    #[serde(rename = "subdevices", default)]
    pub sub_devices: Vec<SubDevice>,
    /// File the description was loaded from.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl DeviceDescription {
    /// Parses and validates a description.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Json`] for malformed JSON and
    /// [`SchemaError::InvalidItem`] if a template cannot be resolved.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let description: Self = serde_json::from_str(json)?;
        description.validate()?;
        Ok(description)
    }

    /// Checks that every sub-device and item template is resolvable.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidItem`] naming the first offending
    /// template.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.manufacturer_names.is_empty() || self.model_ids.is_empty() {
            return Err(SchemaError::InvalidItem(
                "manufacturername and modelid are required".to_string(),
            ));
        }
        for sub in &self.sub_devices {
            if sub.kind().is_none() {
                return Err(SchemaError::InvalidItem(format!(
                    "unknown restapi {} for {}",
                    sub.restapi, sub.type_name
                )));
            }
            if sub.type_name().is_empty() {
                return Err(SchemaError::InvalidItem("empty sub-device type".to_string()));
            }
            if let Some(item) = sub.items.iter().find(|i| !i.is_valid()) {
                return Err(SchemaError::InvalidItem(format!(
                    "{} in {}",
                    item.name, sub.type_name
                )));
            }
        }
        Ok(())
    }

    /// Returns `true` if the description covers this manufacturer and model.
    #[must_use]
    pub fn matches(&self, manufacturer: &str, model: &str) -> bool {
        let mf = self
            .manufacturer_names
            .iter()
            .any(|p| WildMatch::new(constant_to_string(p)).matches(manufacturer));
        mf && self
            .model_ids
            .iter()
            .any(|p| WildMatch::new(p).matches(model))
    }

    /// Returns the first manufacturer name, constants resolved.
    #[must_use]
    pub fn manufacturer(&self) -> &str {
        self.manufacturer_names
            .first()
            .map_or("", |m| constant_to_string(m))
    }
}

/// Template of one REST resource exposed by a device.
#[derive(Debug, Clone, Deserialize)]
pub struct SubDevice {
    /// Resource type, possibly a `$TYPE_*` constant.
    #[serde(rename = "type")]
    pub type_name: String,
    /// REST container path, e.g. `/sensors`.
    pub restapi: String,
    /// Addressing pattern: `["$address.ext", endpoint, cluster?]`.
    #[serde(rename = "uuid", deserialize_with = "one_or_many")]
    pub unique_id: Vec<String>,
    /// Item templates in declaration order.
    #[serde(default)]
    pub items: Vec<ItemTemplate>,
}

impl SubDevice {
    /// Returns the resolved resource type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        constant_to_string(&self.type_name)
    }

    /// Returns the REST container.
    #[must_use]
    pub fn kind(&self) -> Option<ResourceKind> {
        ResourceKind::from_rest_path(&self.restapi)
    }

    /// Returns the template for `suffix`.
    #[must_use]
    pub fn item(&self, suffix: &str) -> Option<&ItemTemplate> {
        self.items.iter().find(|i| i.name == suffix)
    }
}

/// Template of one item.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemTemplate {
    /// Item suffix.
    pub name: String,
    /// Declared type; optional for well-known suffixes.
    #[serde(rename = "type", default)]
    pub data_type: Option<DataType>,
    /// Value applied when nothing better is known.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// Value of a static item; a static item is initialised once.
    #[serde(rename = "static", default)]
    pub static_value: Option<serde_json::Value>,
    /// Whether the item is part of the REST representation.
    #[serde(default = "default_public")]
    pub public: bool,
    /// Whether a report of this item means the node is awake.
    #[serde(default)]
    pub awake: bool,
    /// Refresh interval in seconds.
    #[serde(rename = "refresh.interval", default)]
    pub refresh_interval: Option<u64>,
    /// How writes of this item reach the hardware.
    #[serde(default)]
    pub write: Option<WriteParameters>,
    /// Enumerated `[value, label]` pairs.
    #[serde(default)]
    pub values: Vec<(serde_json::Value, String)>,
}

fn default_public() -> bool {
    true
}

impl ItemTemplate {
    /// Returns the declared type, falling back to the suffix default.
    #[must_use]
    pub fn resolved_type(&self) -> Option<DataType> {
        self.data_type.or_else(|| suffix::default_type(&self.name))
    }

    /// Returns `true` if suffix and type are resolvable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.name.contains('/') && self.resolved_type().is_some()
    }

    /// Returns `true` for static items.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.static_value.is_some()
    }

    /// Returns the initial value: the static value, else the default.
    #[must_use]
    pub fn default_value(&self) -> Option<Value> {
        self.static_value
            .as_ref()
            .or(self.default.as_ref())
            .and_then(Value::from_json)
    }

    /// Maps an enumerated label to its value.
    #[must_use]
    pub fn label_value(&self, label: &str) -> Option<Value> {
        self.values
            .iter()
            .find(|(_, l)| l == label)
            .and_then(|(v, _)| Value::from_json(v))
    }
}

/// Write parameters of an item template.
///
/// Numeric fields accept JSON numbers or `0x` hex strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WriteParameters {
    /// Write function.
    #[serde(rename = "fn", default)]
    pub kind: WriteKind,
    /// Destination endpoint; defaults to the sub-device endpoint.
    #[serde(rename = "ep", default, deserialize_with = "opt_unsigned")]
    pub endpoint: Option<u8>,
    /// Cluster id.
    #[serde(rename = "cl", default, deserialize_with = "opt_unsigned")]
    pub cluster: Option<u16>,
    /// Attribute id (`zcl:attr`) or data point (`tuya`).
    #[serde(rename = "at", default, deserialize_with = "opt_unsigned")]
    pub attribute: Option<u16>,
    /// ZCL data type of the attribute.
    #[serde(rename = "dt", default, deserialize_with = "opt_unsigned")]
    pub data_type: Option<u8>,
    /// Manufacturer code.
    #[serde(rename = "mf", default, deserialize_with = "opt_unsigned")]
    pub manufacturer_code: Option<u16>,
    /// Command id (`zcl:cmd`).
    #[serde(rename = "cmd", default, deserialize_with = "opt_unsigned")]
    pub command: Option<u8>,
    /// Seconds to wait in a state before reading back or giving up.
    #[serde(rename = "state.timeout", default)]
    pub state_timeout: Option<u64>,
    /// Seconds before the whole change gives up.
    #[serde(rename = "change.timeout", default)]
    pub change_timeout: Option<u64>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

fn opt_unsigned<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Unsigned {
        Number(u64),
        Text(String),
    }

    let Some(raw) = Option::<Unsigned>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let n = match raw {
        Unsigned::Number(n) => n,
        Unsigned::Text(s) => parse_unsigned(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid number {s}")))?,
    };
    T::try_from(n)
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("number {n} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEATHER: &str = r#"{
        "manufacturername": "$MF_LUMI",
        "modelid": ["lumi.weather", "lumi.sensor_ht*"],
        "product": "Aqara temperature sensor",
        "sleeper": true,
        "status": "Gold",
        "subdevices": [{
            "type": "$TYPE_TEMPERATURE_SENSOR",
            "restapi": "/sensors",
            "uuid": ["$address.ext", "0x01", "0x0402"],
            "items": [
                { "name": "state/temperature", "awake": true },
                { "name": "attr/modelid", "static": "lumi.weather" },
                { "name": "config/offset", "default": 0,
                  "write": { "fn": "zcl:attr", "cl": "0x0402", "at": 65280, "dt": "0x29",
                             "mf": "0x115f", "state.timeout": 2, "change.timeout": 60 } },
                { "name": "config/mode", "type": "enum",
                  "values": [[0, "off"], [1, "heat"]] },
                { "name": "config/secret", "type": "uint8", "public": false,
                  "refresh.interval": 300 }
            ]
        }]
    }"#;

    #[test]
    fn parses_ddf() {
        let d = DeviceDescription::from_json(WEATHER).unwrap();
        assert_eq!(d.manufacturer(), "LUMI");
        assert_eq!(d.sleeper, Some(true));
        assert_eq!(d.status.as_deref(), Some("Gold"));
        let sub = &d.sub_devices[0];
        assert_eq!(sub.type_name(), "ZHATemperature");
        assert_eq!(sub.kind(), Some(ResourceKind::Sensors));
        assert_eq!(sub.unique_id, ["$address.ext", "0x01", "0x0402"]);
        assert_eq!(sub.items.len(), 5);
    }

    #[test]
    fn item_template_fields() {
        let d = DeviceDescription::from_json(WEATHER).unwrap();
        let sub = &d.sub_devices[0];

        let temp = sub.item("state/temperature").unwrap();
        assert_eq!(temp.resolved_type(), Some(DataType::Int16));
        assert!(temp.public && temp.awake && !temp.is_static());

        let model = sub.item("attr/modelid").unwrap();
        assert!(model.is_static());
        assert_eq!(model.default_value(), Some(Value::from("lumi.weather")));

        let secret = sub.item("config/secret").unwrap();
        assert!(!secret.public);
        assert_eq!(secret.refresh_interval, Some(300));
    }

    #[test]
    fn write_parameters_accept_hex_and_numbers() {
        let d = DeviceDescription::from_json(WEATHER).unwrap();
        let write = d.sub_devices[0]
            .item("config/offset")
            .unwrap()
            .write
            .clone()
            .unwrap();
        assert_eq!(write.kind, WriteKind::ZclAttribute);
        assert_eq!(write.cluster, Some(0x0402));
        assert_eq!(write.attribute, Some(0xff00));
        assert_eq!(write.data_type, Some(0x29));
        assert_eq!(write.manufacturer_code, Some(0x115f));
        assert_eq!(write.state_timeout, Some(2));
        assert_eq!(write.change_timeout, Some(60));
        assert_eq!(write.endpoint, None);
    }

    #[test]
    fn enumerated_labels() {
        let d = DeviceDescription::from_json(WEATHER).unwrap();
        let mode = d.sub_devices[0].item("config/mode").unwrap();
        assert_eq!(mode.label_value("heat"), Some(Value::Int(1)));
        assert_eq!(mode.label_value("cool"), None);
    }

    #[test]
    fn wildcard_models() {
        let d = DeviceDescription::from_json(WEATHER).unwrap();
        assert!(d.matches("LUMI", "lumi.weather"));
        assert!(d.matches("LUMI", "lumi.sensor_ht.agl02"));
        assert!(!d.matches("LUMI", "lumi.sensor_motion"));
        assert!(!d.matches("IKEA of Sweden", "lumi.weather"));
    }

    #[test]
    fn unknown_suffix_without_type_is_invalid() {
        let json = r#"{
            "manufacturername": "X", "modelid": "Y",
            "subdevices": [{ "type": "ZHAThing", "restapi": "/sensors",
                             "uuid": ["$address.ext", "1"],
                             "items": [{ "name": "state/mystery" }] }]
        }"#;
        assert!(matches!(
            DeviceDescription::from_json(json),
            Err(SchemaError::InvalidItem(_))
        ));
    }

    #[test]
    fn unknown_container_is_invalid() {
        let json = r#"{
            "manufacturername": "X", "modelid": "Y",
            "subdevices": [{ "type": "ZHAThing", "restapi": "/groups",
                             "uuid": ["$address.ext", "1"] }]
        }"#;
        assert!(DeviceDescription::from_json(json).is_err());
    }

    #[test]
    fn parse_unsigned_bases() {
        assert_eq!(parse_unsigned("0x0101"), Some(257));
        assert_eq!(parse_unsigned("12"), Some(12));
        assert_eq!(parse_unsigned("0xzz"), None);
        assert_eq!(parse_unsigned(""), None);
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(
            DeviceDescription::from_json("{"),
            Err(SchemaError::Json(_))
        ));
    }
}
