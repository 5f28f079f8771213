// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vendor specific encoders for devices without a write-capable
//! description.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use wildmatch::WildMatch;

use crate::protocol::Encoder;
use crate::resource::Resource;
use crate::types::Value;

/// Encodes writes for one family of devices.
pub trait VendorEncoder: Send + Sync {
    /// Sends a write of `suffix` on `target`.
    ///
    /// Returns `true` if the request was queued.
    fn send(&self, target: &Resource, suffix: &str, value: &Value, encoder: &dyn Encoder) -> bool;
}

impl<F> VendorEncoder for F
where
    F: Fn(&Resource, &str, &Value, &dyn Encoder) -> bool + Send + Sync,
{
    fn send(&self, target: &Resource, suffix: &str, value: &Value, encoder: &dyn Encoder) -> bool {
        self(target, suffix, value, encoder)
    }
}

/// Maps model id wildcard patterns to vendor encoders.
///
/// Patterns are tried in registration order; the result for a model id is
/// cached until the next registration.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::dispatch::VendorEncoderRegistry;
/// use zhabridge_lib::protocol::Encoder;
/// use zhabridge_lib::resource::Resource;
/// use zhabridge_lib::types::Value;
///
/// fn tuya(_: &Resource, _: &str, _: &Value, _: &dyn Encoder) -> bool {
///     true
/// }
///
/// let registry = VendorEncoderRegistry::new();
/// registry.register("TS0601*", tuya);
/// assert!(registry.resolve("TS0601_thermostat").is_some());
/// assert!(registry.resolve("lumi.weather").is_none());
/// ```
#[derive(Default)]
pub struct VendorEncoderRegistry {
    entries: RwLock<Vec<(WildMatch, Arc<dyn VendorEncoder>)>>,
    cache: RwLock<HashMap<String, Option<Arc<dyn VendorEncoder>>>>,
}

impl VendorEncoderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an encoder for models matching `pattern` (`*` and `?`).
    pub fn register<E>(&self, pattern: &str, encoder: E)
    where
        E: VendorEncoder + 'static,
    {
        self.entries
            .write()
            .push((WildMatch::new(pattern), Arc::new(encoder)));
        self.cache.write().clear();
        tracing::debug!(pattern, "Vendor encoder registered");
    }

    /// Returns the encoder for `model_id`.
    #[must_use]
    pub fn resolve(&self, model_id: &str) -> Option<Arc<dyn VendorEncoder>> {
        if let Some(cached) = self.cache.read().get(model_id) {
            return cached.clone();
        }
        let resolved = self
            .entries
            .read()
            .iter()
            .find(|(pattern, _)| pattern.matches(model_id))
            .map(|(_, encoder)| Arc::clone(encoder));
        self.cache
            .write()
            .insert(model_id.to_string(), resolved.clone());
        resolved
    }

    /// Returns the number of registered patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for VendorEncoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorEncoderRegistry")
            .field("patterns", &self.len())
            .field("cached", &self.cache.read().len())
            .finish()
    }
}
