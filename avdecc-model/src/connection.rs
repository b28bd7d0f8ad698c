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

//! Stream connection state (spec §3.3).

use crate::ids::StreamIdentification;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    NotConnected,
    FastConnecting,
    Connected,
}

/// A listener stream's connection to a talker stream.
///
/// Equality deliberately ignores `talker_stream` when `state` is
/// `NotConnected`, matching the wire behavior where a disconnected stream's
/// reported talker identification is meaningless (spec §3.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StreamInputConnectionInfo {
    pub talker_stream: StreamIdentification,
    pub state: ConnectionState,
}

impl StreamInputConnectionInfo {
    pub fn not_connected() -> Self {
        Self {
            talker_stream: StreamIdentification::new(
                crate::ids::EntityID::NULL,
                crate::ids::DescriptorIndex::INVALID,
            ),
            state: ConnectionState::NotConnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl PartialEq for StreamInputConnectionInfo {
    fn eq(&self, other: &Self) -> bool {
        if self.state != other.state {
            return false;
        }
        if self.state == ConnectionState::NotConnected {
            return true;
        }
        self.talker_stream == other.talker_stream
    }
}

impl Eq for StreamInputConnectionInfo {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{DescriptorIndex, EntityID};

    #[test]
    fn not_connected_ignores_talker_stream() {
        let a = StreamInputConnectionInfo {
            talker_stream: StreamIdentification::new(EntityID(1), DescriptorIndex(0)),
            state: ConnectionState::NotConnected,
        };
        let b = StreamInputConnectionInfo {
            talker_stream: StreamIdentification::new(EntityID(2), DescriptorIndex(9)),
            state: ConnectionState::NotConnected,
        };
        assert_eq!(a, b);
    }

    #[test]
    fn connected_compares_talker_stream() {
        let a = StreamInputConnectionInfo {
            talker_stream: StreamIdentification::new(EntityID(1), DescriptorIndex(0)),
            state: ConnectionState::Connected,
        };
        let b = StreamInputConnectionInfo {
            talker_stream: StreamIdentification::new(EntityID(2), DescriptorIndex(0)),
            state: ConnectionState::Connected,
        };
        assert_ne!(a, b);
    }
}
