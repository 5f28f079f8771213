// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end tests of the gateway: description driven initialisation,
//! writes with confirmation, timeouts and the resource map.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use zhabridge_lib::clock::ManualClock;
use zhabridge_lib::dispatch::WriteOutcome;
use zhabridge_lib::manager::{Gateway, GatewayConfig};
use zhabridge_lib::persistence::{DbItem, MemoryStore, SaveTable};
use zhabridge_lib::protocol::{Decoder, Encoder, Indication, Task, TaskRequest};
use zhabridge_lib::resource::{Resource, map_value};
use zhabridge_lib::state::{ChangeState, StateChangeAction, WriteKind};
use zhabridge_lib::subscription::Subscribable;
use zhabridge_lib::types::{DataType, ExtAddress, ResourceId, ResourceKind, UniqueId, Value};
use zhabridge_lib::{Error, SchemaError};

const WEATHER: &str = r#"{
    "manufacturername": "$MF_LUMI",
    "modelid": "lumi.weather",
    "product": "Aqara temperature and humidity sensor",
    "sleeper": true,
    "subdevices": [
        {
            "type": "$TYPE_TEMPERATURE_SENSOR",
            "restapi": "/sensors",
            "uuid": ["$address.ext", "0x01", "0x0402"],
            "items": [
                {"name": "state/temperature"},
                {"name": "state/lastupdated"},
                {"name": "config/sensitivitymax", "static": 2},
                {"name": "config/offset", "default": 0,
                 "write": {"fn": "zcl:attr", "cl": "0x0402", "at": "0xff00", "dt": "0x29", "mf": "0x115f"}}
            ]
        },
        {
            "type": "$TYPE_HUMIDITY_SENSOR",
            "restapi": "/sensors",
            "uuid": ["$address.ext", "0x01", "0x0405"],
            "items": [
                {"name": "state/humidity"},
                {"name": "config/offset", "default": 0}
            ]
        }
    ]
}"#;

const THERMOSTAT: &str = r#"{
    "manufacturername": ["_TZE200_aoclfnxz", "_TZE200_ckud7u2l"],
    "modelid": "TS0601",
    "subdevices": [{
        "type": "$TYPE_THERMOSTAT",
        "restapi": "/sensors",
        "uuid": ["$address.ext", "0x01", "0x0201"],
        "items": [
            {"name": "state/lastupdated"},
            {"name": "config/heatsetpoint",
             "write": {"fn": "tuya", "at": "0x02", "dt": "0x02"}},
            {"name": "config/mode", "type": "uint8",
             "values": [[0, "off"], [1, "heat"]],
             "write": {"fn": "zcl:attr", "cl": "0x0201", "at": "0x001c", "dt": "0x30",
                       "change.timeout": 3600}}
        ]
    }]
}"#;

const LOCK: &str = r#"{
    "manufacturername": "Danalock",
    "modelid": "V3-BTZB",
    "subdevices": [{
        "type": "$TYPE_DOOR_LOCK",
        "restapi": "/sensors",
        "uuid": ["$address.ext", "1", "0x0101"],
        "items": [{"name": "config/lock"}]
    }]
}"#;

const BROKEN: &str = r#"{
    "manufacturername": "Acme",
    "modelid": "half",
    "subdevices": [
        {
            "type": "$TYPE_OPEN_CLOSE_SENSOR",
            "restapi": "/sensors",
            "uuid": ["$address.ext", "0x01", "0x0500"],
            "items": [{"name": "state/open"}]
        },
        {
            "type": "$TYPE_BATTERY_SENSOR",
            "restapi": "/sensors",
            "uuid": ["$address.nwk", "0x01"],
            "items": [{"name": "state/battery"}]
        }
    ]
}"#;

const WEATHER_ADDR: ExtAddress = ExtAddress::new(0x0015_8d00_0123_4567);
const THERMOSTAT_ADDR: ExtAddress = ExtAddress::new(0x8c65_a3ff_fe12_3456);

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct RecordingEncoder {
    requests: Mutex<Vec<TaskRequest>>,
}

impl RecordingEncoder {
    fn actions(&self) -> Vec<StateChangeAction> {
        self.requests.lock().iter().map(|r| r.action).collect()
    }
}

impl Encoder for RecordingEncoder {
    fn build_task(&self, request: &TaskRequest) -> Option<Task> {
        self.requests.lock().push(request.clone());
        let cluster = request
            .items
            .first()
            .and_then(|i| i.params.as_ref())
            .and_then(|p| p.cluster)
            .unwrap_or(0xef00);
        Some(Task {
            address: request.address,
            endpoint: request.endpoint,
            cluster,
            payload: Vec::new(),
        })
    }

    fn submit_task(&self, _task: Task) -> bool {
        true
    }
}

struct Harness {
    gateway: Gateway,
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
    encoder: Arc<RecordingEncoder>,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new());
        let encoder = Arc::new(RecordingEncoder::default());
        let mut gateway = Gateway::new(GatewayConfig::default(), store.clone())
            .with_clock(clock.clone())
            .with_encoder(encoder.clone());
        for json in [WEATHER, THERMOSTAT, LOCK, BROKEN] {
            gateway.schemas_mut().load_str(json).unwrap();
        }
        Self {
            gateway,
            clock,
            store,
            encoder,
        }
    }

    fn join(&mut self, address: ExtAddress, manufacturer: &str, model: &str) -> Vec<ResourceId> {
        self.gateway.add_device(address, manufacturer, model);
        self.gateway.init_device(address).unwrap()
    }

    fn resource(&self, id: ResourceId) -> &Resource {
        self.gateway.registry().resource(id).unwrap()
    }

    fn value(&self, id: ResourceId, suffix: &str) -> Option<Value> {
        self.resource(id).item(suffix)?.value().cloned()
    }

    fn count_events(&self, suffix: &str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        self.gateway.on_item_changed(suffix, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        count
    }
}

// ============================================================================
// Schema initialisation
// ============================================================================

mod initialisation {
    use super::*;

    #[test]
    fn address_endpoint_cluster_unique_id() {
        let mut h = Harness::new();
        let address = ExtAddress::new(0x0012_4b00_1234_5678);
        let ids = h.join(address, "Danalock", "V3-BTZB");

        assert_eq!(
            h.resource(ids[0]).unique_id().as_str(),
            "00:12:4b:00:12:34:56:78-01-0101"
        );
        assert_eq!(h.resource(ids[0]).type_name(), "ZHADoorLock");
    }

    #[test]
    fn sub_devices_are_linked_and_identified() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        assert_eq!(ids.len(), 2);

        let device = h.gateway.registry().device(WEATHER_ADDR).unwrap();
        assert!(device.is_managed());
        assert!(device.is_sleeper());
        assert_eq!(device.sub_devices().len(), 2);

        let links = h.store.links();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|(dev, _)| dev == device.unique_id()));

        let temperature = h.resource(ids[0]);
        assert_eq!(temperature.type_name(), "ZHATemperature");
        assert_eq!(
            h.value(ids[0], "attr/manufacturername"),
            Some(Value::from("LUMI"))
        );
        assert_eq!(h.value(ids[0], "attr/modelid"), Some(Value::from("lumi.weather")));
        assert!(h.store.item(temperature.unique_id(), "attr/modelid").is_some());
        assert_eq!(h.value(ids[0], "config/offset"), Some(Value::Int(0)));
        assert_eq!(h.value(ids[0], "state/temperature"), None);
    }

    #[test]
    fn persisted_rows_win_over_defaults() {
        let mut h = Harness::new();
        let uid = UniqueId::generate(WEATHER_ADDR, 1, 0x0402);
        h.store.insert_item(
            &uid,
            DbItem {
                suffix: "config/offset".into(),
                value: Value::Int(-120),
                timestamp_ms: 1_700_000_000_000,
            },
        );

        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        let item = h.resource(ids[0]).item("config/offset").unwrap();
        assert_eq!(item.value(), Some(&Value::Int(-120)));
        assert_eq!(item.last_set().unwrap().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn reapplying_keeps_static_items_identical() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        let before = h.resource(ids[0]).item("config/sensitivitymax").unwrap().clone();
        assert_eq!(before.value(), Some(&Value::UInt(2)));

        h.clock.advance(Duration::from_secs(600));
        let again = h.gateway.init_device(WEATHER_ADDR).unwrap();
        assert_eq!(again, ids);

        let after = h.resource(ids[0]).item("config/sensitivitymax").unwrap();
        assert_eq!(after.value(), before.value());
        assert_eq!(after.last_set(), before.last_set());
        assert_eq!(after.last_changed(), before.last_changed());
        assert_eq!(h.gateway.registry().resources().count(), 2);
    }

    #[test]
    fn unresolvable_sub_device_aborts_everything() {
        let mut h = Harness::new();
        let address = ExtAddress::new(0xacde);
        h.gateway.add_device(address, "Acme", "half");

        let err = h.gateway.init_device(address).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::PartialFailure { .. })
        ));
        assert_eq!(h.gateway.registry().resources().count(), 0);
        assert!(!h.gateway.registry().device(address).unwrap().is_managed());
        assert!(h.store.links().is_empty());
    }

    #[test]
    fn unknown_model_stays_unmanaged() {
        let mut h = Harness::new();
        let address = ExtAddress::new(0xbeef);
        h.gateway.add_device(address, "Acme", "unknown");
        let err = h.gateway.init_device(address).unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::NoMatch { .. })));
    }

    #[test]
    fn identity_is_restored_from_persistence() {
        let mut h = Harness::new();
        let device_uid = UniqueId::generate(WEATHER_ADDR, 0, 0);
        for (suffix, value) in [
            ("attr/manufacturername", "LUMI"),
            ("attr/modelid", "lumi.weather"),
        ] {
            h.store.insert_item(
                &device_uid,
                DbItem {
                    suffix: suffix.into(),
                    value: Value::from(value),
                    timestamp_ms: 1_700_000_000_000,
                },
            );
        }

        h.gateway.add_device(WEATHER_ADDR, "", "");
        let ids = h.gateway.init_device(WEATHER_ADDR).unwrap();
        assert_eq!(ids.len(), 2);
    }
}

// ============================================================================
// Writes and confirmation
// ============================================================================

mod writes {
    use super::*;

    #[test]
    fn confirmed_offset_adjusts_temperature() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        let sensor = ids[0];
        h.gateway.apply_report(sensor, "state/temperature", 2100).unwrap();
        let temperature_events = h.count_events("state/temperature");

        let outcome = h.gateway.write_item(sensor, "config/offset", 50).unwrap();
        assert_eq!(outcome, WriteOutcome::Pending);
        assert_eq!(h.encoder.actions(), vec![StateChangeAction::Write]);
        assert_eq!(h.value(sensor, "state/temperature"), Some(Value::Int(2100)));

        h.clock.advance(Duration::from_secs(1));
        h.gateway.apply_report(sensor, "config/offset", 50).unwrap();

        assert_eq!(h.value(sensor, "state/temperature"), Some(Value::Int(2150)));
        assert_eq!(temperature_events.load(Ordering::SeqCst), 1);
        assert!(h.resource(sensor).state_changes().is_empty());
    }

    #[test]
    fn unequal_report_keeps_waiting() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        h.gateway.write_item(ids[0], "config/offset", 50).unwrap();

        h.gateway.apply_report(ids[0], "config/offset", 40).unwrap();
        let pending = h.resource(ids[0]).pending_change("config/offset").unwrap();
        assert_eq!(pending.state(), ChangeState::WaitSync);
    }

    #[test]
    fn second_write_supersedes_first() {
        let mut h = Harness::new();
        let ids = h.join(THERMOSTAT_ADDR, "_TZE200_ckud7u2l", "TS0601");
        let thermostat = ids[0];

        h.gateway.write_item(thermostat, "config/heatsetpoint", 2000).unwrap();
        h.gateway.write_item(thermostat, "config/heatsetpoint", 2200).unwrap();

        let changes = h.resource(thermostat).state_changes();
        assert_eq!(changes.len(), 1);
        let target = changes[0].target("config/heatsetpoint").unwrap();
        assert_eq!(target.value(), &Value::Int(2200));
        assert_eq!(changes[0].kind(), WriteKind::Tuya);
        assert_eq!(h.encoder.actions().len(), 2);

        let events = h.count_events("config/heatsetpoint");
        h.clock.advance(Duration::from_secs(3));
        h.gateway.tick();
        h.gateway.apply_report(thermostat, "config/heatsetpoint", 2200).unwrap();
        assert!(h.resource(thermostat).state_changes().is_empty());
        assert_eq!(events.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn change_timeout_expires_unconfirmed_write() {
        let mut h = Harness::new();
        let ids = h.join(THERMOSTAT_ADDR, "_TZE200_aoclfnxz", "TS0601");
        let thermostat = ids[0];

        let outcome = h.gateway.write_item(thermostat, "config/mode", "heat").unwrap();
        assert_eq!(outcome, WriteOutcome::Pending);
        let change = h.resource(thermostat).pending_change("config/mode").unwrap();
        assert_eq!(change.change_timeout(), Duration::from_millis(3_600_000));

        for _ in 0..59 {
            h.clock.advance(Duration::from_secs(60));
            h.gateway.tick();
        }
        let pending = h.resource(thermostat).pending_change("config/mode").unwrap();
        assert_eq!(pending.state(), ChangeState::WaitRead);
        assert!(h.encoder.actions().contains(&StateChangeAction::Read));

        h.clock.advance(Duration::from_secs(60));
        h.gateway.tick();
        assert!(h.resource(thermostat).state_changes().is_empty());
        assert_eq!(h.value(thermostat, "config/mode"), Some(Value::UInt(1)));
    }

    #[test]
    fn read_only_and_unknown_items_are_rejected() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        let etag = h.resource(ids[0]).etag().to_string();

        let err = h.gateway.write_item(ids[0], "config/sensitivitymax", 3).unwrap_err();
        assert!(matches!(err, Error::NotModifiable(_)));
        assert_eq!(err.to_api_error("/sensors/1/config/sensitivitymax").code, 8);

        let err = h.gateway.write_item(ids[0], "config/duration", 3).unwrap_err();
        assert!(matches!(err, Error::ParameterNotAvailable(_)));

        assert_eq!(h.resource(ids[0]).etag(), etag);
        assert!(h.encoder.actions().is_empty());
    }

    #[test]
    fn superseded_offset_write_applies_full_delta() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        let sensor = ids[0];
        h.gateway.apply_report(sensor, "state/temperature", 2100).unwrap();

        h.gateway.write_item(sensor, "config/offset", 50).unwrap();
        h.gateway.write_item(sensor, "config/offset", 70).unwrap();
        assert_eq!(h.resource(sensor).state_changes().len(), 1);

        h.clock.advance(Duration::from_secs(1));
        h.gateway.apply_report(sensor, "config/offset", 70).unwrap();
        assert_eq!(h.value(sensor, "state/temperature"), Some(Value::Int(2170)));
    }

    #[test]
    fn offset_without_write_parameters_is_applied_in_software() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        let humidity = ids[1];
        h.gateway.apply_report(humidity, "state/humidity", 4000_u16).unwrap();

        let outcome = h.gateway.write_item(humidity, "config/offset", 100).unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);
        assert_eq!(h.value(humidity, "state/humidity"), Some(Value::UInt(4100)));
        assert!(h.encoder.actions().is_empty());
    }

    #[test]
    fn offset_on_unmanaged_temperature_sensor_is_applied_at_once() {
        let mut h = Harness::new();
        let address = ExtAddress::new(0x0017_8801_0000_0001);
        h.gateway.add_device(address, "Acme", "thermo-1");
        let mut sensor = Resource::new(
            ResourceKind::Sensors,
            "ZHATemperature",
            UniqueId::generate(address, 1, 0x0402),
        );
        sensor.add_item(DataType::Int16, "state/temperature");
        sensor.add_item(DataType::Int16, "config/offset");
        let id = h.gateway.registry_mut().add_resource(sensor).unwrap();
        h.gateway.apply_report(id, "state/temperature", 2100).unwrap();

        let outcome = h.gateway.write_item(id, "config/offset", 50).unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);
        assert_eq!(h.value(id, "state/temperature"), Some(Value::Int(2150)));
    }
}

// ============================================================================
// Invariants
// ============================================================================

mod invariants {
    use super::*;

    #[test]
    fn etag_follows_accepted_public_mutations() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        let etag = h.resource(ids[0]).etag().to_string();

        assert!(h.gateway.apply_report(ids[0], "state/temperature", 40_000).is_err());
        assert_eq!(h.resource(ids[0]).etag(), etag);

        h.gateway.apply_report(ids[0], "state/temperature", 1990).unwrap();
        assert_ne!(h.resource(ids[0]).etag(), etag);
    }

    #[test]
    fn last_changed_never_after_last_set() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        for (step, value) in [2100, 2100, 2050, 2050].into_iter().enumerate() {
            h.clock.advance(Duration::from_secs(10));
            h.gateway.apply_report(ids[0], "state/temperature", value).unwrap();
            let item = h.resource(ids[0]).item("state/temperature").unwrap();
            let (set, changed) = (item.last_set().unwrap(), item.last_changed().unwrap());
            assert!(changed <= set);
            assert_eq!(changed == set, step % 2 == 0, "step {step}");
        }
    }

    #[test]
    fn map_round_trips_public_items() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        h.gateway.apply_report(ids[0], "state/temperature", -450).unwrap();

        let map = h.gateway.resource_to_map(ids[0], None).unwrap();
        for item in h.resource(ids[0]).items().filter(|i| i.is_public()) {
            let Some(value) = item.value() else {
                continue;
            };
            assert_eq!(
                map_value(&map, item.suffix()),
                Some(&value.to_json()),
                "{}",
                item.suffix()
            );
        }
        assert_eq!(map["ep"], 1);
        assert_eq!(map["etag"], h.resource(ids[0]).etag());
        assert_eq!(map["manufacturername"], "LUMI");
        assert_eq!(map["sleeper"], true);
    }

    #[test]
    fn saves_are_scheduled_on_change() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        assert!(h.store.save_deadline(SaveTable::Devices).is_some());

        h.gateway.apply_report(ids[0], "state/temperature", 2300).unwrap();
        assert!(h.store.save_deadline(SaveTable::Sensors).is_some());
        assert!(h.resource(ids[0]).needs_save());
        let row = h
            .store
            .item(h.resource(ids[0]).unique_id(), "state/temperature")
            .unwrap();
        assert_eq!(row.value, Value::Int(2300));
    }
}

// ============================================================================
// Decoders and async consumers
// ============================================================================

mod runtime {
    use super::*;

    struct TemperatureDecoder;

    impl Decoder for TemperatureDecoder {
        fn decode(&self, indication: &Indication, gateway: &mut Gateway) -> bool {
            let value = match indication.payload.as_slice() {
                [0x00, 0x00, 0x29, lo, hi] => i16::from_le_bytes([*lo, *hi]),
                _ => return false,
            };
            let Some(id) = gateway
                .registry()
                .find_resource(indication.source, indication.endpoint, "ZHATemp")
                .map(Resource::id)
            else {
                return false;
            };
            gateway.apply_report(id, "state/temperature", value).is_ok()
        }
    }

    #[test]
    fn indication_reaches_decoder() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        h.gateway.register_decoder(0x0402, TemperatureDecoder);

        let report = Indication::report(WEATHER_ADDR, 1, 0x0402, vec![0x00, 0x00, 0x29, 0x34, 0x08]);
        assert!(h.gateway.handle_indication(&report));
        assert_eq!(h.value(ids[0], "state/temperature"), Some(Value::Int(2100)));

        let other = Indication::report(WEATHER_ADDR, 1, 0x0405, vec![]);
        assert!(!h.gateway.handle_indication(&other));
    }

    #[tokio::test]
    async fn events_reach_channel_subscribers() {
        let mut h = Harness::new();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");
        let mut rx = h.gateway.events().subscribe_channel();

        h.gateway.apply_report(ids[0], "state/temperature", 2210).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.suffix(), "state/temperature");
        assert_eq!(event.resource(), ids[0]);
        assert_eq!(event.item().unwrap().value(), Some(&Value::Int(2210)));
    }

    #[tokio::test]
    async fn push_messages_reach_channel() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut h = Harness::new();
        let clock = h.clock.clone();
        h.gateway = Gateway::new(GatewayConfig::default(), h.store.clone())
            .with_clock(clock)
            .with_push_sink(Arc::new(tx));
        h.gateway.schemas_mut().load_str(WEATHER).unwrap();
        let ids = h.join(WEATHER_ADDR, "LUMI", "lumi.weather");

        h.gateway.apply_report(ids[0], "state/temperature", 2210).unwrap();
        let message = rx.recv().await.unwrap();
        assert_eq!(message["e"], "changed");
        assert_eq!(message["uniqueid"], "00:15:8d:00:01:23:45:67-01-0402");
        assert_eq!(message["state"]["temperature"], 2210);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_drives_timeouts() {
        let mut h = Harness::new();
        let ids = h.join(THERMOSTAT_ADDR, "_TZE200_aoclfnxz", "TS0601");
        h.gateway.write_item(ids[0], "config/heatsetpoint", 1800).unwrap();

        let mut ticker = h.gateway.ticker();
        for _ in 0..6 {
            ticker.tick().await;
            h.clock.advance(Duration::from_secs(1));
            h.gateway.tick();
        }
        assert!(h.resource(ids[0]).state_changes().is_empty());
    }
}
