// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The gateway context.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as Json};
use tokio::time::{Interval, MissedTickBehavior};

use super::GatewayConfig;
use crate::clock::{Clock, SystemClock};
use crate::dispatch::{Effect, Route, VendorEncoderRegistry, WriteOutcome, WritePlan, plan_write};
use crate::error::{Error, Result, SchemaError};
use crate::event::{Event, EventBus};
use crate::persistence::{Persistence, SaveTable};
use crate::protocol::{Decoder, Encoder, Indication, NullEncoder, NullPushSink, PushSink, TaskRequest};
use crate::resource::{Device, Registry, Resource, ResourceItem, SetOutcome, resource_to_map};
use crate::schema::{SchemaStore, init_device_basic, init_device_from_schema};
use crate::state::StateChange;
use crate::subscription::{Subscribable, SubscriptionId};
use crate::types::{ExtAddress, ResourceId, Value, suffix};

/// Owns the resource graph and drives it.
///
/// All mutation goes through `&mut self` from a single event loop:
/// REST writes ([`write_item`](Self::write_item)), decoded reports
/// ([`apply_report`](Self::apply_report), usually via
/// [`handle_indication`](Self::handle_indication)) and periodic
/// [`tick`](Self::tick)s that advance pending state changes.
///
/// Every accepted item update is handled in the same order: the ETag is
/// refreshed, the item is stored and a save is scheduled, API clients are
/// pushed a `changed` message, and finally the event is published on the
/// [`EventBus`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use zhabridge_lib::manager::{Gateway, GatewayConfig};
/// use zhabridge_lib::persistence::MemoryStore;
///
/// #[tokio::main]
/// async fn main() {
///     let mut gateway = Gateway::new(GatewayConfig::default(), Arc::new(MemoryStore::new()));
///     gateway.schemas_mut().load_dir("devices").ok();
///
///     let mut ticker = gateway.ticker();
///     loop {
///         ticker.tick().await;
///         gateway.tick();
///     }
/// }
/// ```
pub struct Gateway {
    config: GatewayConfig,
    registry: Registry,
    schemas: SchemaStore,
    events: EventBus,
    vendors: VendorEncoderRegistry,
    decoders: HashMap<u16, Arc<dyn Decoder>>,
    persistence: Arc<dyn Persistence>,
    encoder: Arc<dyn Encoder>,
    push: Arc<dyn PushSink>,
    clock: Arc<dyn Clock>,
}

impl Gateway {
    /// Creates a gateway with an empty registry and schema store.
    ///
    /// Uses the system clock, an encoder that rejects every task and a
    /// push sink that drops every message until replaced.
    #[must_use]
    pub fn new(config: GatewayConfig, persistence: Arc<dyn Persistence>) -> Self {
        Self {
            config,
            registry: Registry::new(),
            schemas: SchemaStore::new(),
            events: EventBus::new(),
            vendors: VendorEncoderRegistry::new(),
            decoders: HashMap::new(),
            persistence,
            encoder: Arc::new(NullEncoder),
            push: Arc::new(NullPushSink),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the encoder used for state changes and vendor writes.
    #[must_use]
    pub fn with_encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Sets the sink for push notifications.
    #[must_use]
    pub fn with_push_sink(mut self, push: Arc<dyn PushSink>) -> Self {
        self.push = push;
        self
    }

    /// Replaces the schema store.
    #[must_use]
    pub fn with_schemas(mut self, schemas: SchemaStore) -> Self {
        self.schemas = schemas;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the registry for modification.
    ///
    /// Changes made here bypass events and persistence.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Returns the schema store.
    #[must_use]
    pub fn schemas(&self) -> &SchemaStore {
        &self.schemas
    }

    /// Returns the schema store for loading descriptions.
    pub fn schemas_mut(&mut self) -> &mut SchemaStore {
        &mut self.schemas
    }

    /// Returns the event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns the vendor encoder registry.
    #[must_use]
    pub fn vendors(&self) -> &VendorEncoderRegistry {
        &self.vendors
    }

    /// Returns the current time of the gateway clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Registers the decoder for a cluster, replacing any previous one.
    pub fn register_decoder<D>(&mut self, cluster: u16, decoder: D)
    where
        D: Decoder + 'static,
    {
        self.decoders.insert(cluster, Arc::new(decoder));
    }

    // =========================================================================
    // Devices
    // =========================================================================

    /// Adds a device, or returns the existing one, and records its
    /// identity.
    ///
    /// Empty strings leave the corresponding item untouched.
    pub fn add_device(
        &mut self,
        address: ExtAddress,
        manufacturer: &str,
        model: &str,
    ) -> &mut Device {
        let now = self.clock.now();
        let device = self.registry.get_or_create_device(address);
        let node = device.node_mut();
        for (identity, value) in [
            (suffix::ATTR_MANUFACTURER_NAME, manufacturer),
            (suffix::ATTR_MODEL_ID, model),
        ] {
            if !value.is_empty() {
                let _ = node.set_item_value_at(identity, &Value::from(value), now);
            }
        }
        device
    }

    /// Initialises a device from the matching description.
    ///
    /// A device that does not know its manufacturer or model yet first
    /// restores them from persistence. Returns the ids of the
    /// sub-resources.
    ///
    /// # Errors
    ///
    /// - [`Error::ResourceNotFound`] if the device is unknown
    /// - [`SchemaError::NoMatch`] if no description matches; the device
    ///   stays unmanaged and writes go to vendor encoders
    /// - [`SchemaError::PartialFailure`] if the description cannot be
    ///   applied; nothing was changed
    pub fn init_device(&mut self, address: ExtAddress) -> Result<Vec<ResourceId>> {
        let now = self.clock.now();
        let device = self
            .registry
            .device(address)
            .ok_or_else(|| Error::ResourceNotFound(address.to_string()))?;
        if device.manufacturer().is_empty() || device.model_id().is_empty() {
            init_device_basic(&mut self.registry, self.persistence.as_ref(), address)?;
        }

        let device = self
            .registry
            .device(address)
            .ok_or_else(|| Error::ResourceNotFound(address.to_string()))?;
        let (manufacturer, model) = (device.manufacturer(), device.model_id());
        let Some(description) = self.schemas.find(&manufacturer, &model) else {
            tracing::debug!(%address, %manufacturer, %model, "No device description");
            return Err(SchemaError::NoMatch {
                manufacturer,
                model,
            }
            .into());
        };

        let ids = init_device_from_schema(
            &mut self.registry,
            self.persistence.as_ref(),
            &self.schemas,
            address,
            description,
            now,
        )?;
        self.persistence
            .schedule_save(SaveTable::Devices, self.config.save_delay_short);
        Ok(ids)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Writes an item.
    ///
    /// Software items and writes to unmanaged devices are applied before
    /// returning ([`WriteOutcome::Applied`]). Writes to managed devices are
    /// sent at once and the item holds the value provisionally until the
    /// device confirms it ([`WriteOutcome::Pending`]); a write that is never
    /// confirmed times out silently.
    ///
    /// # Errors
    ///
    /// - [`Error::ResourceNotFound`] for unknown or deleted resources
    /// - [`Error::ParameterNotAvailable`] if the resource lacks the item
    /// - [`Error::NotModifiable`] for read-only items
    /// - [`Error::Value`] if the value does not fit the item
    /// - [`Error::ActionFailed`] if no vendor encoder accepted the write
    pub fn write_item(
        &mut self,
        id: ResourceId,
        item_suffix: &str,
        value: impl Into<Value>,
    ) -> Result<WriteOutcome> {
        let value = value.into();
        let now = self.clock.now();

        let plan = {
            let resource = self
                .registry
                .resource(id)
                .filter(|r| !r.is_deleted())
                .ok_or_else(|| Error::ResourceNotFound(id.to_string()))?;
            let device = self.registry.owner(id);
            let plan = plan_write(resource, device, &self.schemas, item_suffix, &value)?;
            if plan.route == Route::Vendor {
                self.send_vendor(resource, device, &plan)?;
            }
            plan
        };

        let WritePlan {
            suffix: item_suffix,
            value,
            previous,
            effect,
            route,
        } = plan;

        if let Route::Managed(write) = route {
            let mut change = StateChange::new(id, write.kind, write.endpoint, now)
                .with_state_timeout(write.state_timeout.unwrap_or(self.config.state_timeout))
                .with_change_timeout(write.change_timeout.unwrap_or(self.config.change_timeout));
            change.add_target(item_suffix.as_str(), value.clone(), previous, Some(write.params));
            if let Some(resource) = self.registry.resource_mut(id) {
                resource.add_state_change(change);
            }
            self.apply_value(id, &item_suffix, &value, now, true)?;
            self.issue_pending(id, now);
            return Ok(WriteOutcome::Pending);
        }

        self.apply_value(id, &item_suffix, &value, now, true)?;
        self.apply_effect(id, effect, previous.as_ref(), &value, now);
        Ok(WriteOutcome::Applied)
    }

    fn send_vendor(&self, resource: &Resource, device: Option<&Device>, plan: &WritePlan) -> Result<()> {
        let model = device
            .map(Device::model_id)
            .or_else(|| resource.item(suffix::ATTR_MODEL_ID).map(ResourceItem::to_text))
            .unwrap_or_default();
        let Some(vendor) = self.vendors.resolve(&model) else {
            tracing::warn!(resource = %resource.id(), %model, suffix = %plan.suffix, "No vendor encoder");
            return Err(Error::ActionFailed(plan.suffix.clone()));
        };
        if !vendor.send(resource, &plan.suffix, &plan.value, self.encoder.as_ref()) {
            tracing::warn!(resource = %resource.id(), %model, suffix = %plan.suffix, "Vendor write failed");
            return Err(Error::ActionFailed(plan.suffix.clone()));
        }
        Ok(())
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Applies a value reported by a device.
    ///
    /// Reports of `state/*` items also update `state/lastupdated`. A
    /// report matching a pending write confirms it and applies the write's
    /// effects. Events are raised only if the value changed.
    ///
    /// # Errors
    ///
    /// - [`Error::ResourceNotFound`] for unknown or deleted resources
    /// - [`Error::ParameterNotAvailable`] if the resource lacks the item
    /// - [`Error::Value`] if the value does not fit the item
    pub fn apply_report(
        &mut self,
        id: ResourceId,
        item_suffix: &str,
        value: impl Into<Value>,
    ) -> Result<SetOutcome> {
        let value = value.into();
        let now = self.clock.now();
        let resource = self.live_mut(id)?;

        let outcome = resource.set_item_value_at(item_suffix, &value, now)?;
        if suffix::category(item_suffix) == "state" && item_suffix != suffix::STATE_LAST_UPDATED {
            resource.update_state_timestamp(now);
        }
        let confirmed = match resource.item(item_suffix).and_then(ResourceItem::value).cloned() {
            Some(reported) => resource.verify_report(item_suffix, &reported),
            None => Vec::new(),
        };

        if outcome.is_changed() {
            self.raise(id, item_suffix);
        }
        for change in &confirmed {
            for target in change.targets() {
                self.apply_effect(
                    id,
                    Effect::of(target.suffix()),
                    target.previous(),
                    target.value(),
                    now,
                );
            }
        }
        if item_suffix == suffix::STATE_LIGHT_LEVEL {
            self.recompute_light_level(id, now);
        }
        Ok(outcome)
    }

    /// Routes an indication to the decoder of its cluster.
    ///
    /// Returns `false` if no decoder is registered or it did not consume
    /// the indication.
    pub fn handle_indication(&mut self, indication: &Indication) -> bool {
        let Some(decoder) = self.decoders.get(&indication.cluster).cloned() else {
            tracing::trace!(
                source = %indication.source,
                cluster = indication.cluster,
                "No decoder for cluster"
            );
            return false;
        };
        decoder.decode(indication, self)
    }

    // =========================================================================
    // Ticks
    // =========================================================================

    /// Advances all pending state changes.
    ///
    /// Issues the writes and read-backs they request and drops confirmed
    /// and timed out changes. Returns the number of tasks submitted.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        let requests: Vec<TaskRequest> = self
            .registry
            .resources_mut()
            .flat_map(|resource| pending_requests(resource, now))
            .collect();
        requests.iter().filter(|r| self.submit(r)).count()
    }

    /// Returns an interval ticking at the configured granularity.
    ///
    /// Missed ticks are delayed rather than bursted. Must be called from
    /// within a tokio runtime.
    #[must_use]
    pub fn ticker(&self) -> Interval {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    fn issue_pending(&mut self, id: ResourceId, now: DateTime<Utc>) {
        let Some(resource) = self.registry.resource_mut(id) else {
            return;
        };
        for request in pending_requests(resource, now) {
            self.submit(&request);
        }
    }

    fn submit(&self, request: &TaskRequest) -> bool {
        let Some(task) = self.encoder.build_task(request) else {
            tracing::warn!(
                address = %request.address,
                resource = %request.resource,
                action = ?request.action,
                "Request cannot be encoded"
            );
            return false;
        };
        if self.encoder.submit_task(task) {
            tracing::debug!(
                address = %request.address,
                resource = %request.resource,
                action = ?request.action,
                "Task submitted"
            );
            true
        } else {
            tracing::warn!(address = %request.address, resource = %request.resource, "Task rejected");
            false
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Returns the JSON map of a live resource.
    #[must_use]
    pub fn resource_to_map(&self, id: ResourceId, category: Option<&str>) -> Option<Map<String, Json>> {
        let resource = self.registry.resource(id).filter(|r| !r.is_deleted())?;
        Some(resource_to_map(resource, self.registry.owner(id), category))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn live_mut(&mut self, id: ResourceId) -> Result<&mut Resource> {
        self.registry
            .resource_mut(id)
            .filter(|r| !r.is_deleted())
            .ok_or_else(|| Error::ResourceNotFound(id.to_string()))
    }

    /// Sets an item and raises its event if it changed, or on every
    /// accepted set with `always`.
    fn apply_value(
        &mut self,
        id: ResourceId,
        item_suffix: &str,
        value: &Value,
        now: DateTime<Utc>,
        always: bool,
    ) -> Result<SetOutcome> {
        let outcome = self.live_mut(id)?.set_item_value_at(item_suffix, value, now)?;
        if outcome.is_changed() || (always && outcome.is_accepted()) {
            self.raise(id, item_suffix);
        }
        Ok(outcome)
    }

    fn raise(&mut self, id: ResourceId, item_suffix: &str) {
        let Some(resource) = self.registry.resource_mut(id) else {
            return;
        };
        let Some(item) = resource.item(item_suffix).cloned() else {
            return;
        };
        let kind = resource.kind();

        self.persistence.store_item(resource, &item);
        resource.set_needs_save();
        self.persistence
            .schedule_save(SaveTable::from(kind), self.config.save_delay_short);

        if item.is_public() && item.need_push() {
            self.push.push(push_message(resource, item_suffix));
            if let Some(item) = resource.item_mut(item_suffix) {
                item.clear_need_push();
            }
        }

        tracing::debug!(resource = %id, suffix = item_suffix, "Item changed");
        self.events
            .publish(&Event::new(kind, item_suffix, id).with_item(item));
    }

    fn apply_effect(
        &mut self,
        id: ResourceId,
        effect: Effect,
        previous: Option<&Value>,
        value: &Value,
        now: DateTime<Utc>,
    ) {
        match effect {
            Effect::Offset => {
                let delta = number(value) - previous.map_or(0, number);
                if delta != 0 {
                    self.apply_offset(id, delta, now);
                }
            }
            Effect::Threshold => self.recompute_light_level(id, now),
            _ => {}
        }
    }

    fn apply_offset(&mut self, id: ResourceId, delta: i64, now: DateTime<Utc>) {
        for (measured, bounds) in [
            (suffix::STATE_TEMPERATURE, None),
            (suffix::STATE_HUMIDITY, Some((0, 10_000))),
        ] {
            let Some(current) = self
                .registry
                .resource(id)
                .and_then(|r| r.item(measured))
                .filter(|i| i.value().is_some())
                .map(ResourceItem::to_number)
            else {
                continue;
            };
            let mut next = current.saturating_add(delta);
            if let Some((low, high)) = bounds {
                next = next.clamp(low, high);
            }
            if let Err(error) = self.apply_value(id, measured, &Value::Int(next), now, false) {
                tracing::warn!(resource = %id, suffix = measured, %error, "Offset not applied");
            }
        }
    }

    fn recompute_light_level(&mut self, id: ResourceId, now: DateTime<Utc>) {
        let Some(resource) = self.registry.resource(id) else {
            return;
        };
        let Some(level) = resource
            .item(suffix::STATE_LIGHT_LEVEL)
            .filter(|i| i.value().is_some())
            .map(ResourceItem::to_number)
        else {
            return;
        };
        let threshold = |s: &str, default: u16| {
            resource
                .item(s)
                .filter(|i| i.value().is_some())
                .map_or(i64::from(default), ResourceItem::to_number)
        };
        let dark_threshold = threshold(suffix::CONFIG_THOLD_DARK, self.config.thold_dark);
        let offset = threshold(suffix::CONFIG_THOLD_OFFSET, self.config.thold_offset);

        let updates = [
            (suffix::STATE_DARK, level <= dark_threshold),
            (suffix::STATE_DAYLIGHT, level >= dark_threshold + offset),
        ];
        let present: Vec<_> = updates
            .into_iter()
            .filter(|(s, _)| resource.has_item(s))
            .collect();
        for (derived, flag) in present {
            let _ = self.apply_value(id, derived, &Value::Bool(flag), now, false);
        }
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("schemas", &self.schemas.len())
            .field("events", &self.events)
            .field("vendors", &self.vendors)
            .field("decoders", &self.decoders.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Subscribable for Gateway {
    fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.on_event(callback)
    }

    fn on_item_changed<F>(&self, item_suffix: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.on_item_changed(item_suffix, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}

fn pending_requests(resource: &mut Resource, now: DateTime<Utc>) -> Vec<TaskRequest> {
    if resource.state_changes().is_empty() {
        return Vec::new();
    }
    let Some(address) = resource.unique_id().address() else {
        return Vec::new();
    };
    resource
        .tick_state_changes(now)
        .into_iter()
        .map(|(action, change)| TaskRequest::from_change(address, &change, action))
        .collect()
}

/// Builds the `changed` push message for one item's category.
fn push_message(resource: &Resource, item_suffix: &str) -> Json {
    let category = suffix::category(item_suffix);
    let map = resource_to_map(resource, None, Some(category));
    let content = if category == "attr" {
        Json::Object(map)
    } else {
        map.get(category)
            .cloned()
            .unwrap_or_else(|| Json::Object(Map::new()))
    };

    let mut message = Map::new();
    message.insert("t".to_string(), Json::from("event"));
    message.insert("e".to_string(), Json::from("changed"));
    message.insert("r".to_string(), Json::from(resource.kind().as_str()));
    message.insert("id".to_string(), Json::from(resource.id().to_string()));
    message.insert("uniqueid".to_string(), Json::from(resource.unique_id().as_str()));
    message.insert(category.to_string(), content);
    Json::Object(message)
}

fn number(value: &Value) -> i64 {
    match value {
        Value::Int(i) => *i,
        Value::UInt(u) => i64::try_from(*u).unwrap_or(i64::MAX),
        #[allow(clippy::cast_possible_truncation)]
        Value::Real(r) => *r as i64,
        Value::Bool(b) => i64::from(*b),
        Value::Text(_) | Value::Time(_) => 0,
    }
}
