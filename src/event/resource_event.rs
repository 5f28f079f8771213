// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value change notifications.

use std::fmt;

use crate::resource::ResourceItem;
use crate::types::{ResourceId, ResourceKind};

/// Notification that an item of a resource was updated.
///
/// Events carry a snapshot of the item as it was when the event was
/// raised, so subscribers never need to look the resource up again.
///
/// # Examples
///
/// ```
/// use zhabridge_lib::event::Event;
/// use zhabridge_lib::types::{ResourceId, ResourceKind};
///
/// let event = Event::new(ResourceKind::Sensors, "state/temperature", ResourceId::new(3));
/// assert_eq!(event.to_string(), "sensors/3/state/temperature");
/// assert!(event.item().is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    container: ResourceKind,
    suffix: String,
    resource: ResourceId,
    item: Option<ResourceItem>,
}

impl Event {
    /// Creates an event without an item snapshot.
    #[must_use]
    pub fn new(container: ResourceKind, suffix: impl Into<String>, resource: ResourceId) -> Self {
        Self {
            container,
            suffix: suffix.into(),
            resource,
            item: None,
        }
    }

    /// Attaches a snapshot of the updated item.
    #[must_use]
    pub fn with_item(mut self, item: ResourceItem) -> Self {
        self.item = Some(item);
        self
    }

    /// Returns the REST container.
    #[must_use]
    pub fn container(&self) -> ResourceKind {
        self.container
    }

    /// Returns the suffix of the updated item.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns the REST id of the resource.
    #[must_use]
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Returns the item snapshot, if any.
    #[must_use]
    pub fn item(&self) -> Option<&ResourceItem> {
        self.item.as_ref()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.container, self.resource, self.suffix)
    }
}
