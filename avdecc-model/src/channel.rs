/*
 *  Copyright (C) 2025 The avdecc-core Authors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Channel-level connection resolution (spec §3.5): maps a talker cluster
//! channel to the listener cluster channels it reaches through the stream's
//! audio mappings, independent of the descriptor-level stream connection.

use crate::ids::ClusterIdentification;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One resolved leg of a listener cluster channel's wiring: the listener
/// mapping, stream connection and talker mapping chain all resolved to this
/// talker cluster channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConnectionIdentification {
    pub talker: ClusterIdentification,
    pub listener: ClusterIdentification,
}

/// A listener cluster channel's resolved connection. Independent streams
/// only ever populate `primary`. Redundant stream pairs resolve `primary`
/// and `secondary` independently, since one leg can drop while the other
/// stays up (spec §3.5, §4.J.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConnection {
    pub primary: Option<ChannelConnectionIdentification>,
    pub secondary: Option<ChannelConnectionIdentification>,
    /// Whether the listener stream this channel came from has a redundant
    /// partner at all — not whether that partner resolved.
    pub redundant: bool,
}

impl ChannelConnection {
    /// True iff every leg this channel has is resolved: the primary always,
    /// and the secondary too when the stream belongs to a redundant pair.
    pub fn is_connected(&self) -> bool {
        self.primary.is_some() && (!self.redundant || self.secondary.is_some())
    }

    /// True iff exactly one leg of a redundant pair is resolved. Never true
    /// for a non-redundant stream.
    pub fn is_partially_connected(&self) -> bool {
        self.redundant && self.primary.is_some() != self.secondary.is_some()
    }
}

/// All channels resolved for one listener stream (or redundant pair), keyed
/// by listener cluster channel so lookups and diffs are order-independent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelConnections {
    pub connections: BTreeMap<ClusterIdentification, ChannelConnection>,
}

impl ChannelConnections {
    /// True iff at least one channel resolved and every one of them is
    /// fully connected.
    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty() && self.connections.values().all(ChannelConnection::is_connected)
    }

    /// True iff any resolved channel has exactly one leg of a redundant
    /// pair up.
    pub fn is_partially_connected(&self) -> bool {
        self.connections.values().any(ChannelConnection::is_partially_connected)
    }

    pub fn insert(&mut self, listener: ClusterIdentification, connection: ChannelConnection) {
        self.connections.insert(listener, connection);
    }

    pub fn remove(&mut self, listener: &ClusterIdentification) {
        self.connections.remove(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::DescriptorIndex;

    fn cid(index: u16, channel: u16) -> ClusterIdentification {
        ClusterIdentification::new(DescriptorIndex(index), channel)
    }

    #[test]
    fn empty_connections_are_not_connected() {
        let c = ChannelConnections::default();
        assert!(!c.is_connected());
        assert!(!c.is_partially_connected());
    }

    #[test]
    fn non_redundant_channel_is_connected_once_primary_resolves() {
        let mut c = ChannelConnections::default();
        c.insert(
            cid(1, 0),
            ChannelConnection {
                primary: Some(ChannelConnectionIdentification { talker: cid(0, 0), listener: cid(1, 0) }),
                secondary: None,
                redundant: false,
            },
        );
        assert!(c.is_connected());
        assert!(!c.is_partially_connected());
    }

    #[test]
    fn redundant_channel_with_only_primary_resolved_is_partially_connected() {
        let mut c = ChannelConnections::default();
        c.insert(
            cid(1, 0),
            ChannelConnection {
                primary: Some(ChannelConnectionIdentification { talker: cid(0, 0), listener: cid(1, 0) }),
                secondary: None,
                redundant: true,
            },
        );
        assert!(!c.is_connected());
        assert!(c.is_partially_connected());
    }

    #[test]
    fn redundant_channel_with_both_legs_resolved_is_connected() {
        let mut c = ChannelConnections::default();
        c.insert(
            cid(1, 0),
            ChannelConnection {
                primary: Some(ChannelConnectionIdentification { talker: cid(0, 0), listener: cid(1, 0) }),
                secondary: Some(ChannelConnectionIdentification { talker: cid(0, 1), listener: cid(1, 0) }),
                redundant: true,
            },
        );
        assert!(c.is_connected());
        assert!(!c.is_partially_connected());
    }
}
