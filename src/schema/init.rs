// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Applying device descriptions to devices.
//!
//! Initialisation merges three sources for every item: what is already in
//! memory, the persisted rows and the template defaults. Applying the same
//! description twice leaves the resources unchanged.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::description::{ItemTemplate, SubDevice, parse_unsigned};
use super::store::{ItemHandle, SchemaStore};
use crate::error::{Error, Result, SchemaError};
use crate::persistence::{DbItem, Persistence};
use crate::resource::{Registry, Resource, ResourceItem};
use crate::types::{DataType, ExtAddress, ResourceId, UniqueId, Value, suffix};

/// Marker for the device's extended address in addressing patterns.
const ADDRESS_MARKER: &str = "$address.ext";

/// Builds a unique id from an addressing pattern.
///
/// The pattern is `["$address.ext", endpoint]` or
/// `["$address.ext", endpoint, cluster]`; numbers are decimal or `0x` hex.
/// Any other shape yields the empty unique id.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::schema::unique_id_from_template;
/// use zhabridge_lib::types::ExtAddress;
///
/// let pattern = ["$address.ext", "1", "0x0101"].map(String::from);
/// let uid = unique_id_from_template(&pattern, ExtAddress::new(0x0012_4b00_1234_5678));
/// assert_eq!(uid.as_str(), "00:12:4b:00:12:34:56:78-01-0101");
///
/// let bad = ["$address.nwk", "1"].map(String::from);
/// assert!(unique_id_from_template(&bad, ExtAddress::new(1)).is_empty());
/// ```
#[must_use]
pub fn unique_id_from_template(pattern: &[String], address: ExtAddress) -> UniqueId {
    let [marker, endpoint, rest @ ..] = pattern else {
        return UniqueId::default();
    };
    if marker != ADDRESS_MARKER || rest.len() > 1 {
        return UniqueId::default();
    }
    let Some(endpoint) = parse_unsigned(endpoint).and_then(|n| u8::try_from(n).ok()) else {
        return UniqueId::default();
    };
    let cluster = match rest.first() {
        Some(cluster) => match parse_unsigned(cluster).and_then(|n| u16::try_from(n).ok()) {
            Some(cluster) => cluster,
            None => return UniqueId::default(),
        },
        None => 0,
    };
    UniqueId::generate(address, endpoint, cluster)
}

/// Creates and initialises the sub-resources of a device from a
/// description.
///
/// All sub-device unique ids are resolved before anything is touched: if
/// one cannot be resolved the call fails with
/// [`SchemaError::PartialFailure`] and the registry is left unchanged.
/// On success the device is managed and the REST ids of its sub-resources
/// are returned in template order.
///
/// # Errors
///
/// Returns [`Error::ResourceNotFound`] if the device or description is
/// unknown, and [`Error::Schema`] if the description cannot be applied.
pub fn init_device_from_schema(
    registry: &mut Registry,
    persistence: &dyn Persistence,
    store: &SchemaStore,
    address: ExtAddress,
    description: usize,
    now: DateTime<Utc>,
) -> Result<Vec<ResourceId>> {
    let desc = store
        .get(description)
        .ok_or_else(|| Error::ResourceNotFound(format!("description {description}")))?;
    let device = registry
        .device(address)
        .ok_or_else(|| Error::ResourceNotFound(address.to_string()))?;
    let device_uid = device.unique_id().clone();
    let manufacturer = Some(device.manufacturer())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| desc.manufacturer().to_string());
    let model = device.model_id();

    let mut plan = Vec::with_capacity(desc.sub_devices.len());
    for sub in &desc.sub_devices {
        let unique_id = unique_id_from_template(&sub.unique_id, address);
        if unique_id.is_empty() || sub.kind().is_none() {
            tracing::warn!(%address, sub_type = sub.type_name(), "Sub-device cannot be set up");
            return Err(SchemaError::PartialFailure {
                device: address.to_string(),
                sub_type: sub.type_name().to_string(),
            }
            .into());
        }
        plan.push(unique_id);
    }

    let mut ids = Vec::with_capacity(plan.len());
    for (sub_index, (sub, unique_id)) in desc.sub_devices.iter().zip(plan).enumerate() {
        let id = locate_or_create(registry, sub, &unique_id)?;
        registry
            .get_or_create_device(address)
            .add_sub_device(unique_id.clone(), id);

        let Some(resource) = registry.resource_mut(id) else {
            continue;
        };
        init_identity(resource, &manufacturer, &model, now);

        persistence.store_sub_device_link(&device_uid, &unique_id);
        for identity in [suffix::ATTR_MANUFACTURER_NAME, suffix::ATTR_MODEL_ID] {
            if let Some(item) = resource.item(identity) {
                persistence.store_item(resource, item);
            }
        }

        let rows = persistence.load_items(&unique_id);
        for (item_index, template) in sub.items.iter().enumerate() {
            let handle = store.handle(description, sub_index, item_index);
            init_item(resource, template, handle, &rows, now);
        }
        resource.refresh_etag();
        ids.push(id);
    }

    if let Some(device) = registry.device_mut(address) {
        device.set_managed(true);
        if let Some(sleeper) = desc.sleeper {
            let _ = device
                .node_mut()
                .set_item_value_at(suffix::ATTR_SLEEPER, &Value::Bool(sleeper), now);
        }
    }

    tracing::info!(
        %address,
        product = desc.product.as_deref().unwrap_or(""),
        sub_devices = ids.len(),
        "Device description applied"
    );
    Ok(ids)
}

/// Restores the manufacturer name and model id of a device from persisted
/// rows.
///
/// Used for devices without a description. Returns `true` if both were
/// found.
///
/// # Errors
///
/// Returns [`Error::ResourceNotFound`] if the device is unknown.
pub fn init_device_basic(
    registry: &mut Registry,
    persistence: &dyn Persistence,
    address: ExtAddress,
) -> Result<bool> {
    let device = registry
        .device_mut(address)
        .ok_or_else(|| Error::ResourceNotFound(address.to_string()))?;
    let rows = persistence.load_device_items(device.unique_id());

    let mut found = 0;
    for identity in [suffix::ATTR_MANUFACTURER_NAME, suffix::ATTR_MODEL_ID] {
        let Some(row) = rows.iter().find(|r| r.suffix == identity) else {
            continue;
        };
        let node = device.node_mut();
        if let Some(item) = node.item_mut(identity) {
            if restore(item, row).is_ok() {
                found += 1;
            }
        }
        node.refresh_etag();
    }
    tracing::debug!(%address, found, "Basic device init");
    Ok(found == 2)
}

fn locate_or_create(
    registry: &mut Registry,
    sub: &SubDevice,
    unique_id: &UniqueId,
) -> Result<ResourceId> {
    if let Some(existing) = registry.resource_by_unique_id(unique_id) {
        return Ok(existing.id());
    }
    let kind = sub.kind().ok_or_else(|| {
        SchemaError::InvalidItem(format!("unknown restapi {}", sub.restapi))
    })?;
    let mut resource = Resource::new(kind, sub.type_name(), unique_id.clone());
    resource.add_item(DataType::String, suffix::ATTR_MANUFACTURER_NAME);
    resource.add_item(DataType::String, suffix::ATTR_MODEL_ID);
    tracing::debug!(%unique_id, sub_type = sub.type_name(), "Creating sub-device");
    registry.add_resource(resource)
}

fn init_identity(resource: &mut Resource, manufacturer: &str, model: &str, now: DateTime<Utc>) {
    for (identity, value) in [
        (suffix::ATTR_MANUFACTURER_NAME, manufacturer),
        (suffix::ATTR_MODEL_ID, model),
    ] {
        let empty = resource.item(identity).is_some_and(|i| i.to_text().is_empty());
        if empty && !value.is_empty() {
            let _ = resource.set_item_value_at(identity, &Value::from(value), now);
        }
    }
}

fn init_item(
    resource: &mut Resource,
    template: &ItemTemplate,
    handle: Option<ItemHandle>,
    rows: &[DbItem],
    now: DateTime<Utc>,
) {
    let Some(data_type) = template.resolved_type() else {
        return;
    };
    if !resource.has_item(&template.name) {
        tracing::debug!(unique_id = %resource.unique_id(), item = %template.name, "Create item");
        resource.add_item(data_type, template.name.as_str());
    }
    let Some(item) = resource.item_mut(&template.name) else {
        return;
    };

    let row = rows.iter().find(|r| r.suffix == template.name);
    if item.last_set().is_some() && template.is_static() {
        // Initialised once, keep it.
    } else if let Some(row) = row.filter(|row| restore(item, row).is_ok()) {
        tracing::trace!(item = %row.suffix, "Restored from database");
    } else if let Some(default) = template.default_value() {
        match item.data_type().coerce(&default) {
            // Re-applying an unchanged default leaves the timestamps alone.
            Ok(default) if item.value() == Some(&default) => {}
            Ok(default) => {
                let _ = item.set_value_at(&default, now);
            }
            Err(error) => {
                tracing::warn!(item = %template.name, %error, "Invalid default value");
            }
        }
    }

    item.set_schema_handle(handle);
    item.set_public(template.public);
    item.set_awake(template.awake);
    item.set_static(template.is_static());
    if let Some(secs) = template.refresh_interval {
        item.set_refresh_interval(Some(Duration::from_secs(secs)));
    }
}

fn restore(item: &mut ResourceItem, row: &DbItem) -> Result<()> {
    let Some(at) = DateTime::from_timestamp_millis(row.timestamp_ms) else {
        return Err(Error::ActionFailed(format!("timestamp of {}", row.suffix)));
    };
    item.set_value_at(&row.value, at)?;
    item.set_timestamps(at);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::resource::Device;

    const ADDR: ExtAddress = ExtAddress::new(0x0012_4b00_1234_5678);

    const WEATHER: &str = r#"{
        "manufacturername": "$MF_LUMI",
        "modelid": "lumi.weather",
        "product": "Aqara weather",
        "sleeper": true,
        "subdevices": [
            {
                "type": "$TYPE_TEMPERATURE_SENSOR", "restapi": "/sensors",
                "uuid": ["$address.ext", "0x01", "0x0402"],
                "items": [
                    { "name": "state/temperature" },
                    { "name": "config/offset", "default": 0 },
                    { "name": "attr/swversion", "static": "3000-0001" },
                    { "name": "config/checkin", "public": false, "refresh.interval": 3600 }
                ]
            },
            {
                "type": "$TYPE_HUMIDITY_SENSOR", "restapi": "/sensors",
                "uuid": ["$address.ext", "0x01", "0x0405"],
                "items": [{ "name": "state/humidity" }]
            }
        ]
    }"#;

    fn setup() -> (Registry, MemoryStore, SchemaStore) {
        let mut registry = Registry::new();
        let device = registry.get_or_create_device(ADDR);
        let node = device.node_mut();
        node.set_item_value(suffix::ATTR_MODEL_ID, "lumi.weather").unwrap();
        let mut store = SchemaStore::new();
        store.load_str(WEATHER).unwrap();
        (registry, MemoryStore::new(), store)
    }

    fn temperature_uid() -> UniqueId {
        UniqueId::generate(ADDR, 1, 0x0402)
    }

    #[test]
    fn pattern_edge_cases() {
        let p = |v: &[&str]| v.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(
            unique_id_from_template(&p(&["$address.ext", "2"]), ADDR).as_str(),
            "00:12:4b:00:12:34:56:78-02"
        );
        assert!(unique_id_from_template(&p(&["$address.ext"]), ADDR).is_empty());
        assert!(unique_id_from_template(&p(&["$address.ext", "x"]), ADDR).is_empty());
        assert!(unique_id_from_template(&p(&["$address.ext", "1", "zz"]), ADDR).is_empty());
        assert!(unique_id_from_template(&p(&["$address.ext", "256"]), ADDR).is_empty());
        assert!(unique_id_from_template(&p(&["$address.ext", "1", "2", "3"]), ADDR).is_empty());
    }

    #[test]
    fn creates_sub_resources_with_defaults() {
        let (mut registry, db, store) = setup();
        let ids = init_device_from_schema(&mut registry, &db, &store, ADDR, 0, Utc::now()).unwrap();
        assert_eq!(ids.len(), 2);

        let temp = registry.resource(ids[0]).unwrap();
        assert_eq!(temp.type_name(), "ZHATemperature");
        assert_eq!(temp.item("config/offset").unwrap().value(), Some(&Value::Int(0)));
        assert!(temp.item("state/temperature").unwrap().value().is_none());
        assert_eq!(temp.item(suffix::ATTR_MANUFACTURER_NAME).unwrap().to_text(), "LUMI");
        assert_eq!(temp.item(suffix::ATTR_MODEL_ID).unwrap().to_text(), "lumi.weather");

        let checkin = temp.item("config/checkin").unwrap();
        assert!(!checkin.is_public());
        assert_eq!(checkin.refresh_interval(), Some(Duration::from_secs(3600)));
        assert!(checkin.schema_handle().is_some());

        let device = registry.device(ADDR).unwrap();
        assert!(device.is_managed());
        assert!(device.is_sleeper());
        assert_eq!(device.sub_devices().len(), 2);
        assert_eq!(db.links().len(), 2);
        assert!(db.item(&temperature_uid(), suffix::ATTR_MODEL_ID).is_some());
    }

    #[test]
    fn persisted_rows_win_over_defaults() {
        let (mut registry, db, store) = setup();
        db.insert_item(
            &temperature_uid(),
            DbItem {
                suffix: "config/offset".into(),
                value: Value::Int(-120),
                timestamp_ms: 1_700_000_000_000,
            },
        );
        let ids = init_device_from_schema(&mut registry, &db, &store, ADDR, 0, Utc::now()).unwrap();
        let offset = registry.resource(ids[0]).unwrap().item("config/offset").unwrap();
        assert_eq!(offset.value(), Some(&Value::Int(-120)));
        assert_eq!(offset.last_set().unwrap().timestamp_millis(), 1_700_000_000_000);
        assert_eq!(offset.last_changed(), offset.last_set());
    }

    #[test]
    fn static_items_keep_their_value() {
        let (mut registry, db, store) = setup();
        let ids = init_device_from_schema(&mut registry, &db, &store, ADDR, 0, Utc::now()).unwrap();
        db.insert_item(
            &temperature_uid(),
            DbItem {
                suffix: "attr/swversion".into(),
                value: Value::from("old"),
                timestamp_ms: 1,
            },
        );
        init_device_from_schema(&mut registry, &db, &store, ADDR, 0, Utc::now()).unwrap();
        let sw = registry.resource(ids[0]).unwrap().item("attr/swversion").unwrap();
        assert_eq!(sw.to_text(), "3000-0001");
    }

    #[test]
    fn reapplying_resets_runtime_value_to_default() {
        let (mut registry, db, store) = setup();
        let ids = init_device_from_schema(&mut registry, &db, &store, ADDR, 0, Utc::now()).unwrap();
        registry
            .resource_mut(ids[0])
            .unwrap()
            .set_item_value("config/offset", 30)
            .unwrap();

        init_device_from_schema(&mut registry, &db, &store, ADDR, 0, Utc::now()).unwrap();
        let offset = registry.resource(ids[0]).unwrap().item("config/offset").unwrap();
        assert_eq!(offset.value(), Some(&Value::Int(0)));
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let (mut registry, db, store) = setup();
        let now = Utc::now();
        let first = init_device_from_schema(&mut registry, &db, &store, ADDR, 0, now).unwrap();
        let snapshot: Vec<_> = registry
            .resource(first[0])
            .unwrap()
            .items()
            .cloned()
            .collect();

        let second = init_device_from_schema(&mut registry, &db, &store, ADDR, 0, now).unwrap();
        assert_eq!(first, second);
        let again: Vec<_> = registry
            .resource(first[0])
            .unwrap()
            .items()
            .cloned()
            .collect();
        assert_eq!(snapshot, again);
        assert_eq!(registry.resources().count(), 2);
    }

    #[test]
    fn unresolvable_pattern_changes_nothing() {
        let json = r#"{
            "manufacturername": "LUMI", "modelid": "lumi.weather",
            "subdevices": [
                { "type": "ZHATemperature", "restapi": "/sensors",
                  "uuid": ["$address.ext", "0x01", "0x0402"], "items": [] },
                { "type": "ZHAHumidity", "restapi": "/sensors",
                  "uuid": ["$address.nwk", "0x01"], "items": [] }
            ]
        }"#;
        let (mut registry, db, _) = setup();
        let mut store = SchemaStore::new();
        store.load_str(json).unwrap();

        let err = init_device_from_schema(&mut registry, &db, &store, ADDR, 0, Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::PartialFailure { .. })));
        assert_eq!(registry.resources().count(), 0);
        assert!(!registry.device(ADDR).unwrap().is_managed());
        assert!(db.links().is_empty());
    }

    #[test]
    fn unknown_device_is_not_found() {
        let (mut registry, db, store) = setup();
        let err = init_device_from_schema(
            &mut registry,
            &db,
            &store,
            ExtAddress::new(7),
            0,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(_)));
    }

    #[test]
    fn basic_init_restores_identity() {
        let mut registry = Registry::new();
        registry.add_device(Device::new(ADDR)).unwrap();
        let db = MemoryStore::new();
        assert!(!init_device_basic(&mut registry, &db, ADDR).unwrap());

        for (suffix, value) in [
            (suffix::ATTR_MANUFACTURER_NAME, "LUMI"),
            (suffix::ATTR_MODEL_ID, "lumi.weather"),
        ] {
            db.insert_item(
                &temperature_uid(),
                DbItem {
                    suffix: suffix.into(),
                    value: Value::from(value),
                    timestamp_ms: 1_700_000_000_000,
                },
            );
        }
        assert!(init_device_basic(&mut registry, &db, ADDR).unwrap());
        let device = registry.device(ADDR).unwrap();
        assert_eq!(device.manufacturer(), "LUMI");
        assert_eq!(device.model_id(), "lumi.weather");
    }
}
