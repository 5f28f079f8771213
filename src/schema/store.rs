// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Owner of the loaded device descriptions.

use std::fs;
use std::path::Path;

use super::description::{DeviceDescription, ItemTemplate, SubDevice};
use crate::error::SchemaError;

/// Non-owning key of an item template in a [`SchemaStore`].
///
/// Handles carry the store generation they were issued for; after a
/// [`reload`](SchemaStore::reload) they no longer resolve until the
/// description is applied again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemHandle {
    generation: u32,
    description: usize,
    sub_device: usize,
    item: usize,
}

/// Loaded device descriptions.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::schema::SchemaStore;
///
/// let mut store = SchemaStore::new();
/// store
///     .load_str(r#"{ "manufacturername": "LUMI", "modelid": "lumi.weather", "subdevices": [] }"#)
///     .unwrap();
/// assert!(store.find("LUMI", "lumi.weather").is_some());
/// assert!(store.find("LUMI", "lumi.plug").is_none());
/// ```
#[derive(Debug, Default)]
pub struct SchemaStore {
    descriptions: Vec<DeviceDescription>,
    generation: u32,
}

impl SchemaStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of descriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    /// Returns `true` if no description is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    /// Adds a description after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidItem`] if the description is invalid.
    pub fn add(&mut self, description: DeviceDescription) -> Result<usize, SchemaError> {
        description.validate()?;
        self.descriptions.push(description);
        Ok(self.descriptions.len() - 1)
    }

    /// Parses and adds a description.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the JSON is malformed or invalid.
    pub fn load_str(&mut self, json: &str) -> Result<usize, SchemaError> {
        self.add(DeviceDescription::from_json(json)?)
    }

    /// Loads a description file.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the file cannot be read or parsed.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize, SchemaError> {
        let path = path.as_ref();
        let mut description = DeviceDescription::from_json(&fs::read_to_string(path)?)?;
        description.path = Some(path.to_path_buf());
        self.add(description)
    }

    /// Loads every `*.json` file below `dir`.
    ///
    /// Files that fail to parse are skipped with a warning. Returns the
    /// number of descriptions loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Io`] if a directory cannot be read.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, SchemaError> {
        let mut loaded = 0;
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.is_dir() {
                loaded += self.load_dir(&path)?;
            } else if path.extension().is_some_and(|e| e == "json") {
                match self.load_file(&path) {
                    Ok(_) => loaded += 1,
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "Skipping device description");
                    }
                }
            }
        }
        tracing::info!(dir = %dir.as_ref().display(), loaded, "Device descriptions loaded");
        Ok(loaded)
    }

    /// Replaces all descriptions.
    ///
    /// Handles issued before the reload stop resolving.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidItem`] if any description is invalid;
    /// the store is left unchanged in that case.
    pub fn reload(&mut self, descriptions: Vec<DeviceDescription>) -> Result<(), SchemaError> {
        for description in &descriptions {
            description.validate()?;
        }
        self.descriptions = descriptions;
        self.generation = self.generation.wrapping_add(1);
        tracing::info!(
            count = self.descriptions.len(),
            generation = self.generation,
            "Device descriptions reloaded"
        );
        Ok(())
    }

    /// Finds the description for a manufacturer and model.
    ///
    /// Returns the index of the first matching description.
    #[must_use]
    pub fn find(&self, manufacturer: &str, model: &str) -> Option<usize> {
        self.descriptions
            .iter()
            .position(|d| d.matches(manufacturer, model))
    }

    /// Returns a description by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DeviceDescription> {
        self.descriptions.get(index)
    }

    /// Issues a handle for an item template.
    ///
    /// Returns `None` if the indices do not address a template.
    #[must_use]
    pub fn handle(&self, description: usize, sub_device: usize, item: usize) -> Option<ItemHandle> {
        self.descriptions
            .get(description)?
            .sub_devices
            .get(sub_device)?
            .items
            .get(item)?;
        Some(ItemHandle {
            generation: self.generation,
            description,
            sub_device,
            item,
        })
    }

    /// Resolves the sub-device template of a handle.
    #[must_use]
    pub fn sub_device(&self, handle: ItemHandle) -> Option<&SubDevice> {
        if handle.generation != self.generation {
            return None;
        }
        self.descriptions
            .get(handle.description)?
            .sub_devices
            .get(handle.sub_device)
    }

    /// Resolves the item template of a handle.
    #[must_use]
    pub fn item(&self, handle: ItemHandle) -> Option<&ItemTemplate> {
        self.sub_device(handle)?.items.get(handle.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLUG: &str = r#"{
        "manufacturername": "LUMI",
        "modelid": "lumi.plug*",
        "subdevices": [{
            "type": "ZHAConsumption", "restapi": "/sensors",
            "uuid": ["$address.ext", "0x01", "0x000c"],
            "items": [{ "name": "state/lastupdated" }, { "name": "config/on" }]
        }]
    }"#;

    fn store() -> SchemaStore {
        let mut store = SchemaStore::new();
        store.load_str(PLUG).unwrap();
        store
    }

    #[test]
    fn find_by_pattern() {
        let store = store();
        assert_eq!(store.find("LUMI", "lumi.plug.maeu01"), Some(0));
        assert_eq!(store.find("lumi", "lumi.plug"), None);
    }

    #[test]
    fn handles_resolve_templates() {
        let store = store();
        let handle = store.handle(0, 0, 1).unwrap();
        assert_eq!(store.item(handle).unwrap().name, "config/on");
        assert_eq!(store.sub_device(handle).unwrap().type_name(), "ZHAConsumption");
        assert!(store.handle(0, 0, 2).is_none());
        assert!(store.handle(1, 0, 0).is_none());
    }

    #[test]
    fn reload_invalidates_handles() {
        let mut store = store();
        let handle = store.handle(0, 0, 0).unwrap();
        let descriptions = vec![DeviceDescription::from_json(PLUG).unwrap()];
        store.reload(descriptions).unwrap();
        assert!(store.item(handle).is_none());
        let fresh = store.handle(0, 0, 0).unwrap();
        assert!(store.item(fresh).is_some());
    }

    #[test]
    fn load_dir_skips_broken_files() {
        let dir = std::env::temp_dir().join(format!("zhabridge-ddf-{}", std::process::id()));
        fs::create_dir_all(dir.join("lumi")).unwrap();
        fs::write(dir.join("lumi").join("plug.json"), PLUG).unwrap();
        fs::write(dir.join("broken.json"), "{").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut store = SchemaStore::new();
        assert_eq!(store.load_dir(&dir).unwrap(), 1);
        assert!(store.get(0).unwrap().path.is_some());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut store = SchemaStore::new();
        assert!(matches!(
            store.load_file("/nonexistent/ddf.json"),
            Err(SchemaError::Io(_))
        ));
    }
}
