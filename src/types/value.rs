// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Item data types and typed values.
//!
//! Every [`ResourceItem`](crate::resource::ResourceItem) declares a
//! [`DataType`] when it is created. Incoming values (from REST clients,
//! decoders or the database) are [`Value`]s of any kind and are coerced to
//! the declared type before they are stored, so the stored representation
//! is canonical: signed integers are always [`Value::Int`], unsigned
//! integers and enums are always [`Value::UInt`].

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Format used when times are rendered as text.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Declared type of a resource item.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::types::{DataType, Value};
///
/// let v = DataType::UInt8.coerce(&Value::Int(200)).unwrap();
/// assert_eq!(v, Value::UInt(200));
///
/// assert!(DataType::UInt8.coerce(&Value::Int(256)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Boolean.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Floating point number.
    #[serde(alias = "double")]
    Real,
    /// UTF-8 text.
    String,
    /// Point in time (UTC, millisecond precision).
    Time,
    /// Enumerated value, stored as its numeric code.
    Enum,
}

impl DataType {
    /// Returns the inclusive integer range for integral types.
    fn integer_bounds(self) -> Option<(i128, i128)> {
        let bounds = match self {
            Self::Int8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            Self::Int16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            Self::Int32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            Self::Int64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            Self::UInt8 => (0, i128::from(u8::MAX)),
            Self::UInt16 => (0, i128::from(u16::MAX)),
            Self::UInt32 | Self::Enum => (0, i128::from(u32::MAX)),
            Self::UInt64 => (0, i128::from(u64::MAX)),
            Self::Bool | Self::Real | Self::String | Self::Time => return None,
        };
        Some(bounds)
    }

    /// Returns `true` for signed integer types.
    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Returns `true` for all integer types, including enums.
    #[must_use]
    pub fn is_integer(self) -> bool {
        self.integer_bounds().is_some()
    }

    /// Coerces a value to this type.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] if the value kind cannot be
    /// converted, [`ValueError::OutOfRange`] if a number does not fit, and
    /// [`ValueError::InvalidTime`] for unparsable time strings.
    pub fn coerce(self, value: &Value) -> Result<Value, ValueError> {
        let mismatch = || ValueError::TypeMismatch {
            expected: self,
            found: value.kind_name(),
        };

        if let Some((min, max)) = self.integer_bounds() {
            let n = value.as_integer().ok_or_else(mismatch)?;
            if n < min || n > max {
                return Err(ValueError::OutOfRange {
                    data_type: self,
                    actual: value.to_string(),
                });
            }
            // Bounds were checked above, conversions cannot fail.
            return if self.is_signed() {
                i64::try_from(n).map(Value::Int).map_err(|_| mismatch())
            } else {
                u64::try_from(n).map(Value::UInt).map_err(|_| mismatch())
            };
        }

        match (self, value) {
            (Self::Bool, Value::Bool(b)) => Ok(Value::Bool(*b)),
            (Self::Real, Value::Real(r)) if r.is_finite() => Ok(Value::Real(*r)),
            (Self::Real, Value::Real(_)) => Err(ValueError::OutOfRange {
                data_type: self,
                actual: value.to_string(),
            }),
            #[allow(clippy::cast_precision_loss)]
            (Self::Real, Value::Int(i)) => Ok(Value::Real(*i as f64)),
            #[allow(clippy::cast_precision_loss)]
            (Self::Real, Value::UInt(u)) => Ok(Value::Real(*u as f64)),
            (Self::String, Value::Text(s)) => Ok(Value::Text(s.clone())),
            (Self::Time, Value::Time(t)) => Ok(Value::Time(t.trunc_subsecs(3))),
            (Self::Time, Value::Text(s)) => parse_time(s).map(Value::Time),
            _ => Err(mismatch()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Real => "real",
            Self::String => "string",
            Self::Time => "time",
            Self::Enum => "enum",
        };
        f.write_str(name)
    }
}

/// Parses an RFC 3339 time or a naive ISO-8601 time interpreted as UTC.
fn parse_time(s: &str) -> Result<DateTime<Utc>, ValueError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc).trunc_subsecs(3));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|t| t.and_utc().trunc_subsecs(3))
        .map_err(|_| ValueError::InvalidTime(s.to_string()))
}

/// A typed value.
///
/// Values coming from the outside may be of any kind; once stored in an
/// item they have been coerced by [`DataType::coerce`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Real(f64),
    /// Text.
    Text(String),
    /// Point in time.
    Time(DateTime<Utc>),
}

impl Value {
    /// Returns a short name for the kind of value, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::UInt(_) => "unsigned integer",
            Self::Real(_) => "number",
            Self::Text(_) => "string",
            Self::Time(_) => "time",
        }
    }

    /// Returns the value as an exact integer, if it is one.
    fn as_integer(&self) -> Option<i128> {
        match self {
            Self::Int(i) => Some(i128::from(*i)),
            Self::UInt(u) => Some(i128::from(*u)),
            #[allow(clippy::cast_possible_truncation)]
            Self::Real(r) if r.is_finite() && r.fract() == 0.0 && r.abs() < 1e30 => {
                Some(*r as i128)
            }
            _ => None,
        }
    }

    /// Converts a JSON value.
    ///
    /// Returns `None` for `null`, arrays and objects.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_u64().map(Self::UInt))
                .or_else(|| n.as_f64().map(Self::Real)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            serde_json::Value::Null
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_) => None,
        }
    }

    /// Renders the value as JSON.
    ///
    /// Times are rendered with [`TIME_FORMAT`]; non-finite reals become
    /// `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::UInt(u) => serde_json::Value::from(*u),
            Self::Real(r) => serde_json::Number::from_f64(*r)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Time(t) => serde_json::Value::String(t.format(TIME_FORMAT).to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
            Self::Time(t) => write!(f, "{}", t.format(TIME_FORMAT)),
        }
    }
}

macro_rules! value_from {
    ($variant:ident, $target:ty; $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::$variant(<$target>::from(v))
                }
            }
        )*
    };
}

value_from!(Int, i64; i8, i16, i32, i64);
value_from!(UInt, u64; u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn integers_are_range_checked() {
        assert_eq!(DataType::Int8.coerce(&Value::Int(-128)), Ok(Value::Int(-128)));
        assert!(DataType::Int8.coerce(&Value::Int(128)).is_err());
        assert!(DataType::UInt16.coerce(&Value::Int(-1)).is_err());
        assert_eq!(
            DataType::UInt16.coerce(&Value::Int(65535)),
            Ok(Value::UInt(65535))
        );
        assert!(DataType::UInt32.coerce(&Value::UInt(u64::from(u32::MAX) + 1)).is_err());
    }

    #[test]
    fn out_of_range_error_names_type() {
        let err = DataType::UInt8.coerce(&Value::Int(300)).unwrap_err();
        assert!(matches!(
            err,
            ValueError::OutOfRange {
                data_type: DataType::UInt8,
                ..
            }
        ));
    }

    #[test]
    fn signed_types_store_int() {
        assert_eq!(DataType::Int16.coerce(&Value::UInt(5)), Ok(Value::Int(5)));
    }

    #[test]
    fn integral_reals_convert_to_integers() {
        assert_eq!(DataType::Int16.coerce(&Value::Real(21.0)), Ok(Value::Int(21)));
        assert!(DataType::Int16.coerce(&Value::Real(21.5)).is_err());
    }

    #[test]
    fn real_accepts_numbers_but_not_nan() {
        assert_eq!(DataType::Real.coerce(&Value::Int(3)), Ok(Value::Real(3.0)));
        assert!(DataType::Real.coerce(&Value::Real(f64::NAN)).is_err());
    }

    #[test]
    fn bool_and_string_are_strict() {
        assert!(DataType::Bool.coerce(&Value::Int(1)).is_err());
        assert!(DataType::String.coerce(&Value::Int(1)).is_err());
        assert_eq!(
            DataType::String.coerce(&Value::from("abc")),
            Ok(Value::Text("abc".into()))
        );
    }

    #[test]
    fn enum_stores_code() {
        assert_eq!(DataType::Enum.coerce(&Value::Int(2)), Ok(Value::UInt(2)));
        assert!(DataType::Enum.coerce(&Value::from("two")).is_err());
    }

    #[test]
    fn time_parses_naive_and_rfc3339() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(
            DataType::Time.coerce(&Value::from("2024-01-15T10:30:00")),
            Ok(Value::Time(expected))
        );
        assert_eq!(
            DataType::Time.coerce(&Value::from("2024-01-15T11:30:00+01:00")),
            Ok(Value::Time(expected))
        );
        assert!(DataType::Time.coerce(&Value::from("yesterday")).is_err());
    }

    #[test]
    fn time_is_truncated_to_millis() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
            + chrono::Duration::nanoseconds(1_234_567);
        let Value::Time(stored) = DataType::Time.coerce(&Value::Time(t)).unwrap() else {
            panic!("expected time");
        };
        assert_eq!(stored.timestamp_subsec_nanos(), 1_000_000);
    }

    #[test]
    fn json_conversion() {
        assert_eq!(Value::from_json(&serde_json::json!(true)), Some(Value::Bool(true)));
        assert_eq!(Value::from_json(&serde_json::json!(-4)), Some(Value::Int(-4)));
        assert_eq!(
            Value::from_json(&serde_json::json!(u64::MAX)),
            Some(Value::UInt(u64::MAX))
        );
        assert_eq!(Value::from_json(&serde_json::json!(1.5)), Some(Value::Real(1.5)));
        assert_eq!(Value::from_json(&serde_json::json!(null)), None);
        assert_eq!(Value::from_json(&serde_json::json!([1])), None);
    }

    #[test]
    fn time_json_parses_back() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
            + chrono::Duration::milliseconds(250);
        let json = Value::Time(t).to_json();
        assert_eq!(json, serde_json::json!("2024-03-01T08:00:00.250"));
        let back = DataType::Time
            .coerce(&Value::from_json(&json).unwrap())
            .unwrap();
        assert_eq!(back, Value::Time(t));
    }

    #[test]
    fn data_type_from_ddf_name() {
        let t: DataType = serde_json::from_str("\"uint16\"").unwrap();
        assert_eq!(t, DataType::UInt16);
        let t: DataType = serde_json::from_str("\"double\"").unwrap();
        assert_eq!(t, DataType::Real);
    }
}
