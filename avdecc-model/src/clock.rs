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

//! Media clock chain resolution (spec §3.4). A clock domain's active clock
//! source is resolved by following clock source selections across entities;
//! the chain is the ordered list of hops that resolution takes, terminating
//! in a concrete clock or in one of the failure statuses below.

use crate::ids::{DescriptorIndex, EntityID};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockChainNodeType {
    Internal,
    External,
    StreamInput,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockChainStatus {
    Active,
    StreamNotConnected,
    EntityOffline,
    Recursive,
    AemError,
    UnsupportedClockSource,
}

/// One hop in a resolved media clock chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaClockChainNode {
    pub entity_id: EntityID,
    pub clock_domain_index: DescriptorIndex,
    pub node_type: ClockChainNodeType,
    pub stream_input_index: Option<DescriptorIndex>,
    pub stream_output_index: Option<DescriptorIndex>,
}

impl MediaClockChainNode {
    pub fn internal(entity_id: EntityID, clock_domain_index: DescriptorIndex) -> Self {
        Self {
            entity_id,
            clock_domain_index,
            node_type: ClockChainNodeType::Internal,
            stream_input_index: None,
            stream_output_index: None,
        }
    }

    pub fn external(entity_id: EntityID, clock_domain_index: DescriptorIndex) -> Self {
        Self {
            entity_id,
            clock_domain_index,
            node_type: ClockChainNodeType::External,
            stream_input_index: None,
            stream_output_index: None,
        }
    }

    /// A chain's terminal node when resolution couldn't reach a concrete
    /// clock: the entity/domain it stopped at is known, but the node's own
    /// type isn't, since resolution never got far enough to read its clock
    /// source.
    pub fn undefined(entity_id: EntityID, clock_domain_index: DescriptorIndex) -> Self {
        Self {
            entity_id,
            clock_domain_index,
            node_type: ClockChainNodeType::Undefined,
            stream_input_index: None,
            stream_output_index: None,
        }
    }

    pub fn stream_input(
        entity_id: EntityID,
        clock_domain_index: DescriptorIndex,
        stream_input_index: DescriptorIndex,
        stream_output_index: Option<DescriptorIndex>,
    ) -> Self {
        Self {
            entity_id,
            clock_domain_index,
            node_type: ClockChainNodeType::StreamInput,
            stream_input_index: Some(stream_input_index),
            stream_output_index,
        }
    }
}

/// The resolved chain of hops for one clock domain, along with the terminal
/// status. A chain with `status != Active` should still retain whatever
/// nodes were resolved before the failure, so a controller can show where
/// resolution broke down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaClockChain {
    pub nodes: Vec<MediaClockChainNode>,
    pub status: ClockChainStatus,
}

impl MediaClockChain {
    pub fn active(nodes: Vec<MediaClockChainNode>) -> Self {
        Self {
            nodes,
            status: ClockChainStatus::Active,
        }
    }

    pub fn failed(nodes: Vec<MediaClockChainNode>, status: ClockChainStatus) -> Self {
        debug_assert_ne!(status, ClockChainStatus::Active);
        Self { nodes, status }
    }

    pub fn terminal(&self) -> Option<&MediaClockChainNode> {
        self.nodes.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursive_chain_keeps_partial_nodes() {
        let e = EntityID(1);
        let d = DescriptorIndex(0);
        let chain = MediaClockChain::failed(
            vec![
                MediaClockChainNode::stream_input(e, d, DescriptorIndex(1), None),
                MediaClockChainNode::stream_input(e, d, DescriptorIndex(1), None),
            ],
            ClockChainStatus::Recursive,
        );
        assert_eq!(chain.status, ClockChainStatus::Recursive);
        assert_eq!(chain.nodes.len(), 2);
    }

    #[test]
    fn active_chain_terminates_in_internal_or_external() {
        let e = EntityID(1);
        let d = DescriptorIndex(0);
        let chain = MediaClockChain::active(vec![MediaClockChainNode::internal(e, d)]);
        assert_eq!(chain.terminal().unwrap().node_type, ClockChainNodeType::Internal);
    }
}
