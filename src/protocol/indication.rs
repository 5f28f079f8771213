// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incoming frames.

use crate::types::ExtAddress;

/// Direction of a ZCL frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Sent by a client cluster to a server cluster.
    #[default]
    ClientToServer,
    /// Sent by a server cluster, e.g. attribute reports.
    ServerToClient,
}

/// A received application frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indication {
    /// Sender.
    pub source: ExtAddress,
    /// Source endpoint.
    pub endpoint: u8,
    /// Cluster id.
    pub cluster: u16,
    /// ZCL command id.
    pub command: u8,
    /// Frame direction.
    pub direction: Direction,
    /// Frame payload after the ZCL header.
    pub payload: Vec<u8>,
}

impl Indication {
    /// Creates an attribute report (`0x0a`, server to client).
    #[must_use]
    pub fn report(source: ExtAddress, endpoint: u8, cluster: u16, payload: Vec<u8>) -> Self {
        Self {
            source,
            endpoint,
            cluster,
            command: 0x0a,
            direction: Direction::ServerToClient,
            payload,
        }
    }
}
