// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the gateway core.
//!
//! This module provides the error hierarchy shared by the resource model,
//! the schema initializer and the write dispatcher: value validation,
//! schema loading and application, and lookup/routing failures.
//!
//! Hardware timeouts are deliberately absent: a write that is never
//! confirmed ends in [`ChangeState::TimedOut`](crate::state::ChangeState)
//! and is logged, it is not an error returned to anyone.

use thiserror::Error;

use crate::types::DataType;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A value failed type coercion or a policy check.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// A device description could not be loaded or applied.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The addressed resource does not exist or was deleted.
    #[error("resource {0} not available")]
    ResourceNotFound(String),

    /// The addressed item does not exist on the resource.
    #[error("parameter {0} not available")]
    ParameterNotAvailable(String),

    /// The item exists but may not be written.
    #[error("parameter {0} not modifiable")]
    NotModifiable(String),

    /// An item, resource or device with the same key already exists.
    #[error("{0} already exists")]
    Duplicate(String),

    /// The write could not be handed to the hardware.
    #[error("could not set attribute {0}")]
    ActionFailed(String),
}

impl Error {
    /// Maps the error to the stable `(code, path, message)` triple used by
    /// the REST layer.
    ///
    /// # Examples
    ///
    /// ```
    /// use zhabridge_lib::Error;
    ///
    /// let err = Error::NotModifiable("config/pending".into());
    /// let api = err.to_api_error("/sensors/3/config/pending");
    /// assert_eq!(api.code, 8);
    /// ```
    #[must_use]
    pub fn to_api_error(&self, path: impl Into<String>) -> ApiError {
        let code = match self {
            Self::ResourceNotFound(_) => 3,
            Self::ParameterNotAvailable(_) => 6,
            Self::Value(_) => 7,
            Self::NotModifiable(_) => 8,
            Self::Duplicate(_) => 100,
            Self::Schema(_) | Self::ActionFailed(_) => 901,
        };
        ApiError {
            code,
            path: path.into(),
            message: self.to_string(),
        }
    }
}

/// Externally visible form of an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ApiError {
    /// Numeric error code.
    pub code: u16,
    /// Address of the offending resource or parameter.
    pub path: String,
    /// Human readable description.
    pub message: String,
}

/// Errors related to value validation and coercion.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// A numeric value is outside the range of the declared type.
    #[error("value {actual} is out of range for {data_type}")]
    OutOfRange {
        /// The declared item type.
        data_type: DataType,
        /// The value that was provided.
        actual: String,
    },

    /// The value kind cannot be converted to the declared type.
    #[error("cannot convert {found} to {expected}")]
    TypeMismatch {
        /// The declared item type.
        expected: DataType,
        /// Kind of the value that was provided.
        found: &'static str,
    },

    /// A time string could not be parsed.
    #[error("invalid time: {0}")]
    InvalidTime(String),

    /// A label is not part of the enumerated value map.
    #[error("unknown enumerated value: {0}")]
    UnknownLabel(String),

    /// The value is well typed but rejected by the item's policy.
    #[error("invalid value {value} for {suffix}")]
    Rejected {
        /// The item suffix.
        suffix: String,
        /// The offending value.
        value: String,
    },
}

/// Errors related to device descriptions.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a description file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An item template lacks a suffix or a resolvable type.
    #[error("invalid item template: {0}")]
    InvalidItem(String),

    /// A sub-device template could not be resolved or created.
    #[error("sub-device {sub_type} of {device} could not be set up")]
    PartialFailure {
        /// Unique id of the device being initialised.
        device: String,
        /// Type of the failing sub-device template.
        sub_type: String,
    },

    /// No description matches the device.
    #[error("no description for {manufacturer} / {model}")]
    NoMatch {
        /// Manufacturer name of the device.
        manufacturer: String,
        /// Model id of the device.
        model: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
