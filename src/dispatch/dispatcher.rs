// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validation and routing of attribute writes.

use std::time::Duration;

use super::Effect;
use crate::error::{Error, Result, ValueError};
use crate::resource::{Device, Resource};
use crate::schema::{SchemaStore, WriteParameters};
use crate::state::WriteKind;
use crate::types::{ResourceKind, Value, suffix};

/// Result of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOutcome {
    /// The item holds the new value.
    Applied,
    /// The write was sent; the item holds the value provisionally until the
    /// device confirms it.
    Pending,
}

/// Where a validated write goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Applied to the item only.
    Software,
    /// Tracked by a state change of a managed device.
    Managed(ManagedWrite),
    /// Handed to a vendor encoder.
    Vendor,
}

/// Parameters of a write tracked by a state change.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedWrite {
    /// How the write is encoded.
    pub kind: WriteKind,
    /// Destination endpoint.
    pub endpoint: u8,
    /// Template write parameters.
    pub params: WriteParameters,
    /// Template override of the state timeout.
    pub state_timeout: Option<Duration>,
    /// Template override of the change timeout.
    pub change_timeout: Option<Duration>,
}

/// A validated write, ready to be carried out.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    /// Item suffix.
    pub suffix: String,
    /// Value coerced to the item type.
    pub value: Value,
    /// Item value before the write.
    pub previous: Option<Value>,
    /// Write policy of the suffix.
    pub effect: Effect,
    /// Destination.
    pub route: Route,
}

/// Validates a write of `item_suffix` on `resource` and decides its route.
///
/// `device` is the owning device, if the resource belongs to one. Nothing
/// is mutated.
///
/// # Errors
///
/// - [`Error::ResourceNotFound`] if the resource was deleted
/// - [`Error::ParameterNotAvailable`] if the resource lacks the item
/// - [`Error::NotModifiable`] for read-only items
/// - [`Error::Value`] if the value does not fit the item
pub fn plan_write(
    resource: &Resource,
    device: Option<&Device>,
    store: &SchemaStore,
    item_suffix: &str,
    value: &Value,
) -> Result<WritePlan> {
    if resource.is_deleted() {
        return Err(Error::ResourceNotFound(resource.id().to_string()));
    }
    let item = resource
        .item(item_suffix)
        .ok_or_else(|| Error::ParameterNotAvailable(item_suffix.to_string()))?;

    let effect = Effect::of(item_suffix);
    if is_read_only(resource, item_suffix, effect) {
        return Err(Error::NotModifiable(item_suffix.to_string()));
    }

    let template = item.schema_handle().and_then(|h| store.item(h));
    let value = match (value, template) {
        (Value::Text(label), Some(t)) if !t.values.is_empty() => t
            .label_value(label)
            .ok_or_else(|| ValueError::UnknownLabel(label.clone()))?,
        _ => value.clone(),
    };
    let value = item.data_type().coerce(&value)?;
    if effect == Effect::Coordinate && !is_coordinate(&value) {
        return Err(ValueError::Rejected {
            suffix: item_suffix.to_string(),
            value: value.to_string(),
        }
        .into());
    }

    let route = if effect.is_software() || resource.is_virtual() {
        Route::Software
    } else {
        match (device.filter(|d| d.is_managed()), template.and_then(|t| t.write.as_ref())) {
            (Some(_), Some(params)) => Route::Managed(ManagedWrite {
                kind: params.kind,
                endpoint: params
                    .endpoint
                    .or_else(|| resource.unique_id().endpoint())
                    .unwrap_or(1),
                params: params.clone(),
                state_timeout: params.state_timeout.map(Duration::from_secs),
                change_timeout: params.change_timeout.map(Duration::from_secs),
            }),
            _ if effect == Effect::Offset && resource.type_name() != THERMOSTAT_TYPE => Route::Software,
            _ => Route::Vendor,
        }
    };

    tracing::debug!(
        resource = %resource.id(),
        suffix = item_suffix,
        %value,
        ?effect,
        "Write planned"
    );

    Ok(WritePlan {
        suffix: item_suffix.to_string(),
        value,
        previous: item.value().cloned(),
        effect,
        route,
    })
}

/// The only resource type whose offset is calibrated on the device.
const THERMOSTAT_TYPE: &str = "ZHAThermostat";

fn is_read_only(resource: &Resource, item_suffix: &str, effect: Effect) -> bool {
    let physical_sensor = resource.kind() == ResourceKind::Sensors && !resource.is_virtual();
    match effect {
        Effect::ReadOnly => true,
        Effect::ReadOnlyOnSensors => physical_sensor,
        _ => {
            physical_sensor
                && suffix::category(item_suffix) == "state"
                && item_suffix != suffix::STATE_BUTTON_EVENT
        }
    }
}

fn is_coordinate(value: &Value) -> bool {
    match value {
        Value::Text(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
        _ => false,
    }
}
