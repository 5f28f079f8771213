// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundaries to the wire protocol layer and the push transport.
//!
//! The core owns no wire format. Incoming frames reach it as
//! [`Indication`]s handed to a registered [`Decoder`]; outgoing writes and
//! reads leave it as [`TaskRequest`]s that an [`Encoder`] turns into queued
//! [`Task`]s. Change notifications for API clients go to a [`PushSink`].
//!
//! All calls are non-blocking: an encoder queues the task and reports
//! whether it was accepted, the outcome re-enters later as an indication.

mod indication;
mod task;

pub use indication::{Direction, Indication};
pub use task::{Task, TaskItem, TaskRequest};

use crate::manager::Gateway;

/// Decodes frames of one cluster into resource updates.
///
/// Decoders are registered per cluster id on the [`Gateway`]. A decoder
/// locates the resource, decodes the payload and applies the values
/// through [`Gateway::apply_report`], which raises the events.
pub trait Decoder: Send + Sync {
    /// Handles an indication; returns `true` if it was consumed.
    fn decode(&self, indication: &Indication, gateway: &mut Gateway) -> bool;
}

/// Encodes requests and queues them for transmission.
pub trait Encoder: Send + Sync {
    /// Encodes a request.
    ///
    /// Returns `None` if the request cannot be expressed, e.g. missing
    /// write parameters.
    fn build_task(&self, request: &TaskRequest) -> Option<Task>;

    /// Queues a task; returns `false` if the queue rejected it.
    fn submit_task(&self, task: Task) -> bool;
}

/// Receives change notifications for API clients.
pub trait PushSink: Send + Sync {
    /// Pushes one JSON message.
    fn push(&self, message: serde_json::Value);
}

impl PushSink for tokio::sync::mpsc::UnboundedSender<serde_json::Value> {
    fn push(&self, message: serde_json::Value) {
        if self.send(message).is_err() {
            tracing::debug!("Push receiver dropped");
        }
    }
}

/// Push sink that discards all messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPushSink;

impl PushSink for NullPushSink {
    fn push(&self, _message: serde_json::Value) {}
}

/// Encoder that accepts nothing.
///
/// Writes to managed devices stay pending until they time out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEncoder;

impl Encoder for NullEncoder {
    fn build_task(&self, _request: &TaskRequest) -> Option<Task> {
        None
    }

    fn submit_task(&self, _task: Task) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_push_sink_forwards() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.push(json!({"t": "event"}));
        assert_eq!(rx.try_recv().unwrap()["t"], "event");
    }

    #[test]
    fn channel_push_sink_ignores_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<serde_json::Value>();
        drop(rx);
        tx.push(json!({}));
    }

    #[test]
    fn null_encoder_rejects() {
        let task = Task {
            address: crate::types::ExtAddress::new(1),
            endpoint: 1,
            cluster: 0,
            payload: Vec::new(),
        };
        assert!(!NullEncoder.submit_task(task));
    }
}
