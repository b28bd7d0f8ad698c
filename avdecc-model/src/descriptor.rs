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

//! The AVDECC Entity Model descriptor tree (spec §3.2). Every descriptor is
//! split into its static model (read once at enumeration time, constant for
//! the life of a configuration) and its dynamic model (refreshed by AECP
//! unsolicited notifications and polling). Child collections are kept in
//! `BTreeMap`s so iteration order is deterministic, which the checksum
//! (`checksum.rs`) and JSON persistence (`persistence.rs`) both depend on.

use crate::control_values::ControlValues;
use crate::connection::StreamInputConnectionInfo;
use crate::ids::{AudioMapping, DescriptorIndex, DescriptorType, EntityID, MacAddress};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The clock source's physical origin, reused by `ClockSourceStaticModel`
/// (the chain resolver in `clock.rs` has its own superset enum that also
/// tracks `Undefined`/resolution-in-progress states).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockSourceType {
    Internal,
    External,
    InputStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamDirection {
    Input,
    Output,
}

// ---------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStaticModel {
    pub entity_model_id: u64,
    pub entity_capabilities: u32,
    pub talker_stream_sources: u16,
    pub talker_capabilities: u16,
    pub listener_stream_sinks: u16,
    pub listener_capabilities: u16,
    pub controller_capabilities: u32,
    pub identify_control_index: Option<DescriptorIndex>,
    pub configurations_count: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDynamicModel {
    pub entity_name: String,
    pub group_name: String,
    pub firmware_version: String,
    pub serial_number: String,
    pub current_configuration: DescriptorIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub entity_id: EntityID,
    pub static_model: EntityStaticModel,
    pub dynamic_model: EntityDynamicModel,
    pub configurations: BTreeMap<DescriptorIndex, ConfigurationNode>,
}

impl EntityNode {
    /// The configuration currently marked active on the entity, per
    /// `dynamic_model.current_configuration`.
    pub fn active_configuration(&self) -> Option<&ConfigurationNode> {
        self.configurations.get(&self.dynamic_model.current_configuration)
    }

    pub fn active_configuration_mut(&mut self) -> Option<&mut ConfigurationNode> {
        self.configurations
            .get_mut(&self.dynamic_model.current_configuration)
    }
}

// ---------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationStaticModel {
    pub descriptor_counts: BTreeMap<DescriptorType, u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDynamicModel {
    pub object_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfigurationNode {
    pub index: DescriptorIndex,
    pub static_model: Option<ConfigurationStaticModel>,
    pub dynamic_model: Option<ConfigurationDynamicModel>,
    pub audio_units: BTreeMap<DescriptorIndex, AudioUnitNode>,
    pub stream_inputs: BTreeMap<DescriptorIndex, StreamNode>,
    pub stream_outputs: BTreeMap<DescriptorIndex, StreamNode>,
    pub jack_inputs: BTreeMap<DescriptorIndex, JackNode>,
    pub jack_outputs: BTreeMap<DescriptorIndex, JackNode>,
    pub avb_interfaces: BTreeMap<DescriptorIndex, AvbInterfaceNode>,
    pub clock_sources: BTreeMap<DescriptorIndex, ClockSourceNode>,
    pub clock_domains: BTreeMap<DescriptorIndex, ClockDomainNode>,
    pub locales: BTreeMap<DescriptorIndex, LocaleNode>,
    pub strings: BTreeMap<DescriptorIndex, StringsNode>,
    pub controls: BTreeMap<DescriptorIndex, ControlNode>,
    pub memory_objects: BTreeMap<DescriptorIndex, MemoryObjectNode>,
    pub timings: BTreeMap<DescriptorIndex, TimingNode>,
    pub ptp_instances: BTreeMap<DescriptorIndex, PtpInstanceNode>,
}

impl ConfigurationNode {
    /// Splits stream inputs/outputs into redundant pairs and independent
    /// streams (spec §3.2). The primary of a pair is always the
    /// lower-indexed stream; this is computed on demand rather than stored,
    /// since it's fully derivable from `static_model.redundant_partner`.
    pub fn redundant_stream_outputs(&self) -> Vec<RedundantStreamNode> {
        redundant_pairs(&self.stream_outputs)
    }

    pub fn redundant_stream_inputs(&self) -> Vec<RedundantStreamNode> {
        redundant_pairs(&self.stream_inputs)
    }
}

fn redundant_pairs(streams: &BTreeMap<DescriptorIndex, StreamNode>) -> Vec<RedundantStreamNode> {
    let mut seen = std::collections::HashSet::new();
    let mut pairs = Vec::new();
    for (index, node) in streams {
        if seen.contains(index) {
            continue;
        }
        if let Some(partner) = node.static_model.redundant_partner {
            if let Some(partner_node) = streams.get(&partner) {
                let (primary, secondary) = if *index < partner {
                    (*index, partner)
                } else {
                    (partner, *index)
                };
                seen.insert(primary);
                seen.insert(secondary);
                pairs.push(RedundantStreamNode { primary, secondary });
            }
        }
    }
    pairs
}

/// A virtual grouping node for a redundant stream pair; never stored on the
/// tree, always computed from the two member `StreamNode`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundantStreamNode {
    pub primary: DescriptorIndex,
    pub secondary: DescriptorIndex,
}

// ---------------------------------------------------------------------
// AudioUnit
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioUnitStaticModel {
    pub number_of_stream_input_ports: u16,
    pub number_of_stream_output_ports: u16,
    pub sampling_rates: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioUnitDynamicModel {
    pub object_name: String,
    pub current_sampling_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioUnitNode {
    pub index: DescriptorIndex,
    pub static_model: AudioUnitStaticModel,
    pub dynamic_model: AudioUnitDynamicModel,
    pub stream_port_inputs: BTreeMap<DescriptorIndex, StreamPortNode>,
    pub stream_port_outputs: BTreeMap<DescriptorIndex, StreamPortNode>,
}

// ---------------------------------------------------------------------
// Stream (input/output share a shape)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStaticModel {
    pub formats: Vec<u64>,
    pub redundant_partner: Option<DescriptorIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDynamicModel {
    pub object_name: String,
    pub current_format: u64,
    /// Only meaningful for `StreamDirection::Input`.
    pub connection_info: Option<StreamInputConnectionInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamNode {
    pub index: DescriptorIndex,
    pub direction: StreamDirection,
    pub static_model: StreamStaticModel,
    pub dynamic_model: StreamDynamicModel,
}

// ---------------------------------------------------------------------
// Jack
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JackStaticModel {
    pub jack_type: u16,
    pub number_of_controls: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JackDynamicModel {
    pub object_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JackNode {
    pub index: DescriptorIndex,
    pub direction: StreamDirection,
    pub static_model: JackStaticModel,
    pub dynamic_model: JackDynamicModel,
    pub controls: BTreeMap<DescriptorIndex, ControlNode>,
}

// ---------------------------------------------------------------------
// AvbInterface
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvbInterfaceStaticModel {
    pub mac_address: MacAddress,
    pub interface_flags: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvbInterfaceDynamicModel {
    pub object_name: String,
    pub gptp_grandmaster_id: u64,
    pub gptp_domain_number: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvbInterfaceNode {
    pub index: DescriptorIndex,
    pub static_model: AvbInterfaceStaticModel,
    pub dynamic_model: AvbInterfaceDynamicModel,
}

// ---------------------------------------------------------------------
// ClockSource / ClockDomain
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSourceStaticModel {
    pub clock_source_type: ClockSourceType,
    pub clock_source_location_type: DescriptorType,
    pub clock_source_location_index: DescriptorIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSourceDynamicModel {
    pub object_name: String,
    pub clock_source_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSourceNode {
    pub index: DescriptorIndex,
    pub static_model: ClockSourceStaticModel,
    pub dynamic_model: ClockSourceDynamicModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockDomainStaticModel {
    pub clock_sources: Vec<DescriptorIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockDomainDynamicModel {
    pub object_name: String,
    pub clock_source_index: DescriptorIndex,
    pub media_clock_chain: Option<crate::clock::MediaClockChain>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockDomainNode {
    pub index: DescriptorIndex,
    pub static_model: ClockDomainStaticModel,
    pub dynamic_model: ClockDomainDynamicModel,
}

// ---------------------------------------------------------------------
// Locale / Strings
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleStaticModel {
    pub locale_id: String,
    pub number_of_strings: u16,
    pub base_strings_index: DescriptorIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleNode {
    pub index: DescriptorIndex,
    pub static_model: LocaleStaticModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringsStaticModel {
    pub strings: [String; 7],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringsNode {
    pub index: DescriptorIndex,
    pub static_model: StringsStaticModel,
}

// ---------------------------------------------------------------------
// StreamPort / AudioCluster / AudioMap
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPortStaticModel {
    pub number_of_clusters: u16,
    pub base_cluster: DescriptorIndex,
    pub number_of_maps: u16,
    pub has_dynamic_audio_map: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StreamPortDynamicModel {
    pub dynamic_audio_map: Vec<AudioMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPortNode {
    pub index: DescriptorIndex,
    pub direction: StreamDirection,
    pub static_model: StreamPortStaticModel,
    pub dynamic_model: StreamPortDynamicModel,
    pub audio_clusters: BTreeMap<DescriptorIndex, AudioClusterNode>,
    pub audio_maps: BTreeMap<DescriptorIndex, AudioMapNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClusterStaticModel {
    pub signal_type: DescriptorType,
    pub signal_index: DescriptorIndex,
    pub path_latency: u32,
    pub channel_count: u16,
    pub format: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClusterDynamicModel {
    pub object_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClusterNode {
    pub index: DescriptorIndex,
    pub static_model: AudioClusterStaticModel,
    pub dynamic_model: AudioClusterDynamicModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMapStaticModel {
    pub mappings: Vec<AudioMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMapNode {
    pub index: DescriptorIndex,
    pub static_model: AudioMapStaticModel,
}

// ---------------------------------------------------------------------
// Control / MemoryObject
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlStaticModel {
    pub control_type: u64,
    pub control_value_type: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDynamicModel {
    pub object_name: String,
    pub values: ControlValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlNode {
    pub index: DescriptorIndex,
    pub static_model: ControlStaticModel,
    pub dynamic_model: ControlDynamicModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryObjectStaticModel {
    pub memory_object_type: u16,
    pub target_descriptor_type: DescriptorType,
    pub target_descriptor_index: DescriptorIndex,
    pub start_address: u64,
    pub maximum_length: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryObjectDynamicModel {
    pub object_name: String,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryObjectNode {
    pub index: DescriptorIndex,
    pub static_model: MemoryObjectStaticModel,
    pub dynamic_model: MemoryObjectDynamicModel,
}

// ---------------------------------------------------------------------
// Timing / PtpInstance / PtpPort
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingStaticModel {
    pub algorithm: u16,
    pub ptp_instances: Vec<DescriptorIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingNode {
    pub index: DescriptorIndex,
    pub static_model: TimingStaticModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtpInstanceStaticModel {
    pub clock_identity: u64,
    pub number_of_ptp_ports: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtpInstanceNode {
    pub index: DescriptorIndex,
    pub static_model: PtpInstanceStaticModel,
    pub ptp_ports: BTreeMap<DescriptorIndex, PtpPortNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtpPortStaticModel {
    pub port_number: u16,
    pub port_type: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtpPortNode {
    pub index: DescriptorIndex,
    pub static_model: PtpPortStaticModel,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(index: u16, partner: Option<u16>) -> StreamNode {
        StreamNode {
            index: DescriptorIndex(index),
            direction: StreamDirection::Output,
            static_model: StreamStaticModel {
                formats: vec![],
                redundant_partner: partner.map(DescriptorIndex),
            },
            dynamic_model: StreamDynamicModel {
                object_name: String::new(),
                current_format: 0,
                connection_info: None,
            },
        }
    }

    #[test]
    fn redundant_pair_primary_is_lower_index() {
        let mut streams = BTreeMap::new();
        streams.insert(DescriptorIndex(3), stream(3, Some(0)));
        streams.insert(DescriptorIndex(0), stream(0, Some(3)));
        let pairs = redundant_pairs(&streams);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].primary, DescriptorIndex(0));
        assert_eq!(pairs[0].secondary, DescriptorIndex(3));
    }

    #[test]
    fn independent_stream_produces_no_pair() {
        let mut streams = BTreeMap::new();
        streams.insert(DescriptorIndex(0), stream(0, None));
        assert!(redundant_pairs(&streams).is_empty());
    }

    #[test]
    fn active_configuration_resolves_by_current_index() {
        let mut entity = EntityNode {
            entity_id: EntityID(1),
            static_model: EntityStaticModel {
                entity_model_id: 0,
                entity_capabilities: 0,
                talker_stream_sources: 0,
                talker_capabilities: 0,
                listener_stream_sinks: 0,
                listener_capabilities: 0,
                controller_capabilities: 0,
                identify_control_index: None,
                configurations_count: 1,
            },
            dynamic_model: EntityDynamicModel {
                entity_name: String::new(),
                group_name: String::new(),
                firmware_version: String::new(),
                serial_number: String::new(),
                current_configuration: DescriptorIndex(0),
            },
            configurations: BTreeMap::new(),
        };
        assert!(entity.active_configuration().is_none());
        entity
            .configurations
            .insert(DescriptorIndex(0), ConfigurationNode::default());
        assert!(entity.active_configuration().is_some());
    }
}
