// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON projection of resources for REST responses and push messages.
//!
//! `attr/*` items are placed at the top level, all other categories are
//! nested under their category name:
//!
//! ```json
//! {
//!   "uniqueid": "00:12:4b:00:12:34:56:78-01-0402",
//!   "type": "ZHATemperature",
//!   "state": { "temperature": 2100, "lastupdated": "none" },
//!   "config": { "offset": 0 },
//!   "ep": 1,
//!   "etag": "..."
//! }
//! ```

use serde_json::{Map, Value as Json, json};

use super::{Device, Resource, ResourceItem};
use crate::types::suffix;

/// Category placed at the top level of the map.
const TOP_LEVEL: &str = "attr";

/// Builds the JSON map of a resource.
///
/// Only public items are included. Public items of the owning device's
/// node are merged in first so the resource's own items win on conflicts.
/// With a `category` filter only that category is emitted and the `ep` and
/// `etag` members are left out.
///
/// Three axis orientation items are folded into `state.orientation` and the
/// `state/x`/`state/y` pair into the (rounded) `state.xy` array.
#[must_use]
pub fn resource_to_map(
    resource: &Resource,
    device: Option<&Device>,
    category: Option<&str>,
) -> Map<String, Json> {
    let wants = |item: &ResourceItem| {
        item.is_public() && category.is_none_or(|c| suffix::category(item.suffix()) == c)
    };

    let mut map = Map::new();
    if let Some(device) = device {
        for item in device.node().items().filter(|i| wants(i)) {
            if item.suffix() == suffix::ATTR_UNIQUE_ID || item.suffix() == suffix::ATTR_TYPE {
                continue;
            }
            insert(&mut map, item.suffix(), item_json(item));
        }
    }

    let mut orientation: [Option<&ResourceItem>; 3] = [None; 3];
    let mut xy: [Option<&ResourceItem>; 2] = [None; 2];
    for item in resource.items().filter(|i| wants(i)) {
        match item.suffix() {
            suffix::STATE_ORIENTATION_X => orientation[0] = Some(item),
            suffix::STATE_ORIENTATION_Y => orientation[1] = Some(item),
            suffix::STATE_ORIENTATION_Z => orientation[2] = Some(item),
            suffix::STATE_X => xy[0] = Some(item),
            suffix::STATE_Y => xy[1] = Some(item),
            other => insert(&mut map, other, item_json(item)),
        }
    }

    if let [Some(x), Some(y), Some(z)] = orientation {
        insert(
            &mut map,
            "state/orientation",
            json!([x.to_number(), y.to_number(), z.to_number()]),
        );
    }
    if let [Some(x), Some(y)] = xy {
        insert(&mut map, "state/xy", json!([xy_component(x), xy_component(y)]));
    }

    if category.is_none() {
        if let Some(ep) = resource.unique_id().endpoint() {
            map.insert("ep".to_string(), json!(ep));
        }
        map.insert("etag".to_string(), json!(resource.etag()));
    }
    map
}

/// Looks up the JSON value of an item in a map built by [`resource_to_map`].
///
/// # Examples
///
/// ```
/// use zhabridge_lib::resource::{Resource, map_value, resource_to_map};
/// use zhabridge_lib::types::{DataType, ResourceKind, UniqueId};
///
/// let mut r = Resource::new(ResourceKind::Sensors, "ZHAHumidity", UniqueId::from_string("x-01"));
/// r.add_item(DataType::UInt16, "state/humidity");
/// r.set_item_value("state/humidity", 4520_u16).unwrap();
///
/// let map = resource_to_map(&r, None, None);
/// assert_eq!(map_value(&map, "state/humidity"), Some(&serde_json::json!(4520)));
/// assert_eq!(map_value(&map, "attr/type"), Some(&serde_json::json!("ZHAHumidity")));
/// ```
#[must_use]
pub fn map_value<'a>(map: &'a Map<String, Json>, item_suffix: &str) -> Option<&'a Json> {
    let category = suffix::category(item_suffix);
    let key = suffix::key(item_suffix);
    if category == TOP_LEVEL {
        map.get(key)
    } else {
        map.get(category)?.get(key)
    }
}

fn insert(map: &mut Map<String, Json>, item_suffix: &str, value: Json) {
    let category = suffix::category(item_suffix);
    let key = suffix::key(item_suffix).to_string();
    if category == TOP_LEVEL {
        map.insert(key, value);
        return;
    }
    let entry = map
        .entry(category.to_string())
        .or_insert_with(|| Json::Object(Map::new()));
    if let Json::Object(nested) = entry {
        nested.insert(key, value);
    }
}

fn item_json(item: &ResourceItem) -> Json {
    match item.value() {
        Some(value) => value.to_json(),
        None if item.suffix() == suffix::STATE_LAST_UPDATED => json!("none"),
        None => Json::Null,
    }
}

/// Scales a 16-bit colour coordinate to `0..=1`, rounded to four decimals.
#[allow(clippy::cast_precision_loss)]
fn xy_component(item: &ResourceItem) -> f64 {
    (item.to_number() as f64 / 6.5535).round() / 10000.0
}
