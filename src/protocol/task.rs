// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outgoing requests.

use crate::schema::WriteParameters;
use crate::state::{StateChange, StateChangeAction, WriteKind};
use crate::types::{ExtAddress, ResourceId, Value};

/// One item of a [`TaskRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskItem {
    /// Item suffix.
    pub suffix: String,
    /// Value to write; the current target value for reads.
    pub value: Value,
    /// Template write parameters, if the item has a template.
    pub params: Option<WriteParameters>,
}

/// Wire independent description of what to send to a device.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    /// Destination node.
    pub address: ExtAddress,
    /// Destination endpoint.
    pub endpoint: u8,
    /// Resource the request belongs to.
    pub resource: ResourceId,
    /// Write or read back.
    pub action: StateChangeAction,
    /// How the items are encoded.
    pub kind: WriteKind,
    /// Items to write or read.
    pub items: Vec<TaskItem>,
}

impl TaskRequest {
    /// Builds the request for an action of a pending state change.
    #[must_use]
    pub fn from_change(
        address: ExtAddress,
        change: &StateChange,
        action: StateChangeAction,
    ) -> Self {
        let items = change
            .targets()
            .iter()
            .map(|t| TaskItem {
                suffix: t.suffix().to_string(),
                value: t.value().clone(),
                params: t.params().cloned(),
            })
            .collect();
        Self {
            address,
            endpoint: change.endpoint(),
            resource: change.resource(),
            action,
            kind: change.kind(),
            items,
        }
    }
}

/// An encoded request ready to be queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Destination node.
    pub address: ExtAddress,
    /// Destination endpoint.
    pub endpoint: u8,
    /// Cluster id.
    pub cluster: u16,
    /// Encoded frame.
    pub payload: Vec<u8>,
}
