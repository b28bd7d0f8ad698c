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

//! Channel-connection resolution (spec §4.J.1): walks a listener stream
//! port's audio mappings across its connected talker to find, for each
//! listener cluster channel, the talker cluster channel it is routed to.
//!
//! Redundant stream pairs (spec §3.5) resolve both legs independently off
//! the same listener stream port, since one can drop while the other stays
//! connected — a single `ChannelConnection` entry carries both outcomes.

use crate::registry::ControllerRegistry;
use avdecc_model::channel::{ChannelConnection, ChannelConnectionIdentification, ChannelConnections};
use avdecc_model::connection::ConnectionState;
use avdecc_model::descriptor::{ConfigurationNode, StreamPortNode};
use avdecc_model::ids::{AudioMapping, ClusterIdentification, DescriptorIndex};
use std::collections::{BTreeMap, BTreeSet};

/// Effective mapping set for a stream port: a static `AudioMap` descriptor
/// overrides the port's dynamic mappings for the same (stream, channel)
/// pair (spec §4.J.1).
fn effective_mappings(port: &StreamPortNode) -> Vec<AudioMapping> {
    let mut by_key: std::collections::BTreeMap<(DescriptorIndex, u16), AudioMapping> =
        std::collections::BTreeMap::new();
    for mapping in &port.dynamic_model.dynamic_audio_map {
        by_key.insert((mapping.stream_index, mapping.stream_channel), *mapping);
    }
    for map in port.audio_maps.values() {
        for mapping in &map.static_model.mappings {
            by_key.insert((mapping.stream_index, mapping.stream_channel), *mapping);
        }
    }
    by_key.into_values().collect()
}

fn cluster_identification(port: &StreamPortNode, mapping: &AudioMapping) -> Option<ClusterIdentification> {
    let cluster_index = DescriptorIndex(mapping.cluster_offset);
    let cluster = port.audio_clusters.get(&cluster_index)?;
    if mapping.cluster_channel >= cluster.static_model.channel_count {
        return None;
    }
    Some(ClusterIdentification::new(cluster_index, mapping.cluster_channel))
}

fn port_has_mapping(port: &StreamPortNode, stream_index: DescriptorIndex) -> bool {
    port.dynamic_model.dynamic_audio_map.iter().any(|m| m.stream_index == stream_index)
        || port.audio_maps.values().any(|map| map.static_model.mappings.iter().any(|m| m.stream_index == stream_index))
}

fn listener_port_for(configuration: &ConfigurationNode, stream_index: DescriptorIndex) -> Option<&StreamPortNode> {
    listener_stream_ports(configuration)
        .map(|(_, port)| port)
        .find(|port| port_has_mapping(port, stream_index))
}

fn talker_port_for(configuration: &ConfigurationNode, stream_index: DescriptorIndex) -> Option<&StreamPortNode> {
    talker_stream_ports(configuration).map(|(_, port)| port).find(|port| port_has_mapping(port, stream_index))
}

/// Resolves one stream leg's listener-cluster → talker-cluster map, given
/// the connected talker stream port (`None` if disconnected or the talker
/// couldn't be looked up).
fn resolve_leg(
    listener_port: &StreamPortNode,
    stream_index: DescriptorIndex,
    talker: Option<(DescriptorIndex, &StreamPortNode)>,
) -> BTreeMap<ClusterIdentification, ChannelConnectionIdentification> {
    let mut out = BTreeMap::new();
    let Some((talker_stream_index, talker_port)) = talker else {
        return out;
    };

    let talker_by_channel: BTreeMap<u16, ClusterIdentification> = effective_mappings(talker_port)
        .iter()
        .filter(|m| m.stream_index == talker_stream_index)
        .filter_map(|m| cluster_identification(talker_port, m).map(|c| (m.stream_channel, c)))
        .collect();

    for mapping in effective_mappings(listener_port) {
        if mapping.stream_index != stream_index {
            continue;
        }
        let Some(listener_cluster) = cluster_identification(listener_port, &mapping) else {
            continue;
        };
        let Some(&talker_cluster) = talker_by_channel.get(&mapping.stream_channel) else {
            continue;
        };
        out.insert(listener_cluster, ChannelConnectionIdentification { talker: talker_cluster, listener: listener_cluster });
    }
    out
}

/// Looks up `stream_index`'s connection info in `configuration` and, if
/// connected, the talker stream port it names (spec §4.J.1). Stops at
/// `None` on any missing piece: the stream descriptor, its connection info,
/// a non-`Connected` state, or the talker entity/port itself.
fn connected_talker<'r>(
    registry: &'r ControllerRegistry,
    configuration: &ConfigurationNode,
    stream_index: DescriptorIndex,
) -> Option<(avdecc_model::ids::EntityID, DescriptorIndex, crate::registry::ControlledEntityGuard<'r>)> {
    let stream = configuration.stream_inputs.get(&stream_index)?;
    let info = stream.dynamic_model.connection_info.as_ref()?;
    if info.state != ConnectionState::Connected {
        return None;
    }
    let talker_guard = registry.get(info.talker_stream.entity_id)?;
    if !talker_guard.is_loaded() {
        return None;
    }
    Some((info.talker_stream.entity_id, info.talker_stream.stream_index, talker_guard))
}

/// Resolves the channel connections for `stream_index` on `listener_entity`
/// (spec §4.J.1). If `stream_index` is part of a redundant pair (spec
/// §3.5), both legs are resolved independently off the shared listener
/// stream port, so a dropped secondary leaves the primary's channels intact
/// and marks them only partially connected.
pub fn resolve(
    registry: &ControllerRegistry,
    configuration: &ConfigurationNode,
    stream_index: DescriptorIndex,
) -> ChannelConnections {
    let partner = configuration
        .redundant_stream_inputs()
        .into_iter()
        .find(|pair| pair.primary == stream_index || pair.secondary == stream_index);
    let (primary_index, secondary_index) = match partner {
        Some(pair) => (pair.primary, Some(pair.secondary)),
        None => (stream_index, None),
    };

    let mut connections = ChannelConnections::default();
    let Some(listener_port) = listener_port_for(configuration, primary_index) else {
        return connections;
    };

    let primary_ids = resolve_leg_via_registry(registry, configuration, listener_port, primary_index);
    let secondary_ids = secondary_index
        .map(|index| resolve_leg_via_registry(registry, configuration, listener_port, index))
        .unwrap_or_default();

    let mut clusters: BTreeSet<ClusterIdentification> = primary_ids.keys().copied().collect();
    clusters.extend(secondary_ids.keys().copied());

    let redundant = secondary_index.is_some();
    for cluster in clusters {
        connections.insert(
            cluster,
            ChannelConnection { primary: primary_ids.get(&cluster).copied(), secondary: secondary_ids.get(&cluster).copied(), redundant },
        );
    }

    connections
}

fn resolve_leg_via_registry(
    registry: &ControllerRegistry,
    configuration: &ConfigurationNode,
    listener_port: &StreamPortNode,
    stream_index: DescriptorIndex,
) -> BTreeMap<ClusterIdentification, ChannelConnectionIdentification> {
    let Some((_, talker_stream_index, talker_guard)) = connected_talker(registry, configuration, stream_index) else {
        return BTreeMap::new();
    };
    let Some(talker_entity) = talker_guard.entity.as_ref() else {
        return BTreeMap::new();
    };
    let Some(talker_configuration) = talker_entity.active_configuration() else {
        return BTreeMap::new();
    };
    let Some(talker_port) = talker_port_for(talker_configuration, talker_stream_index) else {
        return BTreeMap::new();
    };
    resolve_leg(listener_port, stream_index, Some((talker_stream_index, talker_port)))
}

/// Every (listener stream port, index) pair in `configuration`, for driving
/// the recomputation sweep on mapping/connection change events.
pub fn listener_stream_ports(
    configuration: &ConfigurationNode,
) -> impl Iterator<Item = (DescriptorIndex, &StreamPortNode)> {
    configuration
        .audio_units
        .values()
        .flat_map(|unit| unit.stream_port_inputs.iter())
        .map(|(index, port)| (*index, port))
}

/// One listener stream index per resolvable channel-connection set: the
/// primary of each redundant pair, plus every independent stream input.
/// Iterating this instead of `stream_inputs` directly avoids resolving (and
/// notifying on) the same pair twice, once per leg.
pub fn canonical_listener_streams(configuration: &ConfigurationNode) -> Vec<DescriptorIndex> {
    let pairs = configuration.redundant_stream_inputs();
    let paired: BTreeSet<DescriptorIndex> = pairs.iter().flat_map(|pair| [pair.primary, pair.secondary]).collect();
    let mut streams: Vec<DescriptorIndex> = pairs.iter().map(|pair| pair.primary).collect();
    streams.extend(configuration.stream_inputs.keys().filter(|index| !paired.contains(index)).copied());
    streams
}

/// The `StreamPortInput` index feeding `stream_index`'s mappings, if any.
pub fn listener_port_index_for(configuration: &ConfigurationNode, stream_index: DescriptorIndex) -> Option<DescriptorIndex> {
    listener_stream_ports(configuration).find(|(_, port)| port_has_mapping(port, stream_index)).map(|(index, _)| index)
}

/// The talker entity and `StreamPortOutput` index feeding `stream_index` on
/// the entity it's connected to, if connected and resolvable.
pub fn talker_port_index(
    registry: &ControllerRegistry,
    configuration: &ConfigurationNode,
    stream_index: DescriptorIndex,
) -> Option<(avdecc_model::ids::EntityID, DescriptorIndex)> {
    let (talker_entity_id, talker_stream_index, talker_guard) = connected_talker(registry, configuration, stream_index)?;
    let talker_entity = talker_guard.entity.as_ref()?;
    let talker_configuration = talker_entity.active_configuration()?;
    let talker_port_index = talker_stream_ports(talker_configuration)
        .find(|(_, port)| port_has_mapping(port, talker_stream_index))
        .map(|(index, _)| index)?;
    Some((talker_entity_id, talker_port_index))
}

fn talker_stream_ports(configuration: &ConfigurationNode) -> impl Iterator<Item = (DescriptorIndex, &StreamPortNode)> {
    configuration.audio_units.values().flat_map(|unit| unit.stream_port_outputs.iter()).map(|(index, port)| (*index, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use avdecc_model::descriptor::{
        AudioClusterDynamicModel, AudioClusterNode, AudioClusterStaticModel, AudioMapNode,
        AudioMapStaticModel, AudioUnitDynamicModel, AudioUnitNode, AudioUnitStaticModel,
        EntityDynamicModel, EntityStaticModel, EntityNode, StreamDirection, StreamDynamicModel,
        StreamInputConnectionInfo, StreamNode, StreamPortDynamicModel, StreamPortStaticModel,
        StreamStaticModel,
    };
    use avdecc_model::ids::{DescriptorType, EntityID, StreamIdentification};
    use std::collections::BTreeMap;

    fn bare_entity(entity_id: EntityID) -> EntityNode {
        EntityNode {
            entity_id,
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
            configurations: Default::default(),
        }
    }

    fn audio_unit(stream_port_inputs: BTreeMap<DescriptorIndex, StreamPortNode>) -> AudioUnitNode {
        AudioUnitNode {
            index: DescriptorIndex(0),
            static_model: AudioUnitStaticModel { number_of_stream_input_ports: 1, number_of_stream_output_ports: 0, sampling_rates: vec![] },
            dynamic_model: AudioUnitDynamicModel { object_name: String::new(), current_sampling_rate: 0 },
            stream_port_inputs,
            stream_port_outputs: Default::default(),
        }
    }

    fn output_audio_unit(stream_port_outputs: BTreeMap<DescriptorIndex, StreamPortNode>) -> AudioUnitNode {
        AudioUnitNode {
            index: DescriptorIndex(0),
            static_model: AudioUnitStaticModel { number_of_stream_input_ports: 0, number_of_stream_output_ports: 1, sampling_rates: vec![] },
            dynamic_model: AudioUnitDynamicModel { object_name: String::new(), current_sampling_rate: 0 },
            stream_port_inputs: Default::default(),
            stream_port_outputs,
        }
    }

    fn stream_input(connection_info: Option<StreamInputConnectionInfo>) -> StreamNode {
        StreamNode {
            index: DescriptorIndex(0),
            direction: StreamDirection::Input,
            static_model: StreamStaticModel { formats: vec![], redundant_partner: None },
            dynamic_model: StreamDynamicModel { object_name: String::new(), current_format: 0, connection_info },
        }
    }

    fn stream_output() -> StreamNode {
        StreamNode {
            index: DescriptorIndex(0),
            direction: StreamDirection::Output,
            static_model: StreamStaticModel { formats: vec![], redundant_partner: None },
            dynamic_model: StreamDynamicModel { object_name: String::new(), current_format: 0, connection_info: None },
        }
    }

    fn cluster(channel_count: u16) -> AudioClusterNode {
        AudioClusterNode {
            index: DescriptorIndex(0),
            static_model: AudioClusterStaticModel {
                signal_type: DescriptorType::AudioCluster,
                signal_index: DescriptorIndex(0),
                path_latency: 0,
                channel_count,
                format: 0,
            },
            dynamic_model: AudioClusterDynamicModel { object_name: String::new() },
        }
    }

    fn port_with_mappings(cluster_index: DescriptorIndex, mappings: Vec<AudioMapping>) -> StreamPortNode {
        let mut audio_clusters = BTreeMap::new();
        audio_clusters.insert(cluster_index, cluster(2));
        let mut audio_maps = BTreeMap::new();
        audio_maps.insert(DescriptorIndex(0), AudioMapNode {
            index: DescriptorIndex(0),
            static_model: AudioMapStaticModel { mappings },
        });
        StreamPortNode {
            index: DescriptorIndex(0),
            direction: StreamDirection::Input,
            static_model: StreamPortStaticModel {
                number_of_clusters: 1,
                base_cluster: cluster_index,
                number_of_maps: 1,
                has_dynamic_audio_map: false,
            },
            dynamic_model: StreamPortDynamicModel::default(),
            audio_clusters,
            audio_maps,
        }
    }

    fn port_with_mapping(cluster_index: DescriptorIndex, mapping: AudioMapping) -> StreamPortNode {
        port_with_mappings(cluster_index, vec![mapping])
    }

    fn single_port(port: StreamPortNode) -> BTreeMap<DescriptorIndex, StreamPortNode> {
        let mut ports = BTreeMap::new();
        ports.insert(DescriptorIndex(0), port);
        ports
    }

    #[test]
    fn connected_matching_channel_resolves() {
        let registry = ControllerRegistry::new();
        let listener_id = EntityID(1);
        let talker_id = EntityID(2);

        let listener_port = port_with_mapping(
            DescriptorIndex(0),
            AudioMapping { stream_index: DescriptorIndex(0), stream_channel: 0, cluster_offset: 0, cluster_channel: 0 },
        );
        let talker_port = port_with_mapping(
            DescriptorIndex(0),
            AudioMapping { stream_index: DescriptorIndex(0), stream_channel: 0, cluster_offset: 0, cluster_channel: 1 },
        );

        let mut listener = bare_entity(listener_id);
        let mut listener_config = ConfigurationNode::default();
        listener_config.stream_inputs.insert(
            DescriptorIndex(0),
            stream_input(Some(StreamInputConnectionInfo {
                talker_stream: StreamIdentification::new(talker_id, DescriptorIndex(0)),
                state: ConnectionState::Connected,
            })),
        );
        listener_config.audio_units.insert(DescriptorIndex(0), audio_unit(single_port(listener_port)));
        listener.configurations.insert(DescriptorIndex(0), listener_config);

        let mut talker = bare_entity(talker_id);
        let mut talker_config = ConfigurationNode::default();
        talker_config.stream_outputs.insert(DescriptorIndex(0), stream_output());
        talker_config.audio_units.insert(DescriptorIndex(0), output_audio_unit(single_port(talker_port)));
        talker.configurations.insert(DescriptorIndex(0), talker_config);

        registry.entity_online(listener_id, 0);
        registry.mark_loaded(listener_id, listener, Default::default());
        registry.entity_online(talker_id, 0);
        registry.mark_loaded(talker_id, talker, Default::default());

        let listener_guard = registry.get(listener_id).expect("registered");
        let configuration = listener_guard.entity.as_ref().unwrap().active_configuration().unwrap();
        let connections = resolve(&registry, configuration, DescriptorIndex(0));
        assert!(connections.is_connected());
        assert!(!connections.is_partially_connected());
    }

    #[test]
    fn disconnected_stream_resolves_empty() {
        let registry = ControllerRegistry::new();
        let listener_id = EntityID(1);

        let listener_port = port_with_mapping(
            DescriptorIndex(0),
            AudioMapping { stream_index: DescriptorIndex(0), stream_channel: 0, cluster_offset: 0, cluster_channel: 0 },
        );

        let mut listener = bare_entity(listener_id);
        let mut listener_config = ConfigurationNode::default();
        listener_config.stream_inputs.insert(DescriptorIndex(0), stream_input(None));
        listener_config.audio_units.insert(DescriptorIndex(0), audio_unit(single_port(listener_port)));
        listener.configurations.insert(DescriptorIndex(0), listener_config);

        registry.entity_online(listener_id, 0);
        registry.mark_loaded(listener_id, listener, Default::default());

        let listener_guard = registry.get(listener_id).expect("registered");
        let configuration = listener_guard.entity.as_ref().unwrap().active_configuration().unwrap();
        let connections = resolve(&registry, configuration, DescriptorIndex(0));
        assert!(!connections.is_connected());
    }

    /// Spec §8 scenario 8: a redundant listener pair both connected, then
    /// the secondary leg's stream connection is removed. The shared cluster
    /// must read back not-connected-but-partially-connected, with the
    /// primary leg's identification intact and the secondary leg empty.
    #[test]
    fn redundant_pair_with_dropped_secondary_is_partially_connected() {
        let registry = ControllerRegistry::new();
        let listener_id = EntityID(1);
        let talker_id = EntityID(2);

        let listener_port = port_with_mappings(
            DescriptorIndex(0),
            vec![
                AudioMapping { stream_index: DescriptorIndex(0), stream_channel: 0, cluster_offset: 0, cluster_channel: 0 },
                AudioMapping { stream_index: DescriptorIndex(1), stream_channel: 0, cluster_offset: 0, cluster_channel: 0 },
            ],
        );
        let talker_port = port_with_mappings(
            DescriptorIndex(0),
            vec![
                AudioMapping { stream_index: DescriptorIndex(0), stream_channel: 0, cluster_offset: 0, cluster_channel: 1 },
                AudioMapping { stream_index: DescriptorIndex(1), stream_channel: 0, cluster_offset: 0, cluster_channel: 1 },
            ],
        );

        let mut primary_input = stream_input(Some(StreamInputConnectionInfo {
            talker_stream: StreamIdentification::new(talker_id, DescriptorIndex(0)),
            state: ConnectionState::Connected,
        }));
        primary_input.static_model.redundant_partner = Some(DescriptorIndex(1));
        let mut secondary_input = stream_input(None);
        secondary_input.index = DescriptorIndex(1);
        secondary_input.static_model.redundant_partner = Some(DescriptorIndex(0));

        let mut listener = bare_entity(listener_id);
        let mut listener_config = ConfigurationNode::default();
        listener_config.stream_inputs.insert(DescriptorIndex(0), primary_input);
        listener_config.stream_inputs.insert(DescriptorIndex(1), secondary_input);
        listener_config.audio_units.insert(DescriptorIndex(0), audio_unit(single_port(listener_port)));
        listener.configurations.insert(DescriptorIndex(0), listener_config);

        let mut talker_primary_output = stream_output();
        talker_primary_output.static_model.redundant_partner = Some(DescriptorIndex(1));
        let mut talker_secondary_output = stream_output();
        talker_secondary_output.index = DescriptorIndex(1);
        talker_secondary_output.static_model.redundant_partner = Some(DescriptorIndex(0));

        let mut talker = bare_entity(talker_id);
        let mut talker_config = ConfigurationNode::default();
        talker_config.stream_outputs.insert(DescriptorIndex(0), talker_primary_output);
        talker_config.stream_outputs.insert(DescriptorIndex(1), talker_secondary_output);
        talker_config.audio_units.insert(DescriptorIndex(0), output_audio_unit(single_port(talker_port)));
        talker.configurations.insert(DescriptorIndex(0), talker_config);

        registry.entity_online(listener_id, 0);
        registry.mark_loaded(listener_id, listener, Default::default());
        registry.entity_online(talker_id, 0);
        registry.mark_loaded(talker_id, talker, Default::default());

        let listener_guard = registry.get(listener_id).expect("registered");
        let configuration = listener_guard.entity.as_ref().unwrap().active_configuration().unwrap();
        let connections = resolve(&registry, configuration, DescriptorIndex(0));

        assert!(!connections.is_connected());
        assert!(connections.is_partially_connected());
        let cluster = ClusterIdentification::new(DescriptorIndex(0), 0);
        let entry = connections.connections.get(&cluster).expect("cluster resolved");
        assert!(entry.primary.is_some());
        assert!(entry.secondary.is_none());
    }
}
