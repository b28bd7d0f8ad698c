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

//! Media-clock chain resolution (spec §4.J.2): follows a clock domain's
//! active clock source across entities, jumping from a listener's connected
//! `StreamInput` to the talker it's connected to and recursing there.
//!
//! The model carries no direct stream→clock-domain association (real AEM
//! doesn't give a stream descriptor a clock domain index either — only the
//! clock domain lists which sources feed it). When a hop lands on a talker,
//! its clock domain is taken to be the domain with the same index as the one
//! we just came from if the talker has one, otherwise its lowest-indexed
//! domain. Single-clock-domain entities, the overwhelming majority in
//! practice, are unaffected by this choice.

use crate::registry::ControllerRegistry;
use avdecc_model::clock::{ClockChainStatus, MediaClockChain, MediaClockChainNode};
use avdecc_model::connection::ConnectionState;
use avdecc_model::descriptor::ClockSourceType;
use avdecc_model::ids::{DescriptorIndex, EntityID};
use std::collections::HashSet;

pub fn resolve(registry: &ControllerRegistry, entity_id: EntityID, domain_index: DescriptorIndex) -> MediaClockChain {
    let mut nodes = Vec::new();
    let mut visited = HashSet::new();
    let mut current_entity = entity_id;
    let mut current_domain = domain_index;

    loop {
        if !visited.insert((current_entity, current_domain)) {
            nodes.push(MediaClockChainNode::undefined(current_entity, current_domain));
            return MediaClockChain::failed(nodes, ClockChainStatus::Recursive);
        }

        macro_rules! stop {
            ($status:expr) => {{
                nodes.push(MediaClockChainNode::undefined(current_entity, current_domain));
                return MediaClockChain::failed(nodes, $status);
            }};
        }

        let Some(guard) = registry.get(current_entity) else { stop!(ClockChainStatus::EntityOffline) };
        if !guard.is_loaded() {
            stop!(ClockChainStatus::EntityOffline)
        }
        let Some(entity) = guard.entity.as_ref() else { stop!(ClockChainStatus::EntityOffline) };
        let Some(configuration) = entity.active_configuration() else { stop!(ClockChainStatus::AemError) };
        let Some(domain) = configuration.clock_domains.get(&current_domain) else {
            stop!(ClockChainStatus::AemError)
        };
        let Some(source) = configuration.clock_sources.get(&domain.dynamic_model.clock_source_index) else {
            stop!(ClockChainStatus::AemError)
        };

        match source.static_model.clock_source_type {
            ClockSourceType::Internal => {
                nodes.push(MediaClockChainNode::internal(current_entity, current_domain));
                return MediaClockChain::active(nodes);
            }
            ClockSourceType::External => {
                nodes.push(MediaClockChainNode::external(current_entity, current_domain));
                return MediaClockChain::active(nodes);
            }
            ClockSourceType::InputStream => {
                let stream_index = source.static_model.clock_source_location_index;
                let Some(stream) = configuration.stream_inputs.get(&stream_index) else {
                    stop!(ClockChainStatus::AemError)
                };
                let Some(info) = &stream.dynamic_model.connection_info else {
                    nodes.push(MediaClockChainNode::stream_input(current_entity, current_domain, stream_index, None));
                    return MediaClockChain::failed(nodes, ClockChainStatus::StreamNotConnected);
                };
                if info.state != ConnectionState::Connected {
                    nodes.push(MediaClockChainNode::stream_input(current_entity, current_domain, stream_index, None));
                    return MediaClockChain::failed(nodes, ClockChainStatus::StreamNotConnected);
                }
                let talker = info.talker_stream;
                nodes.push(MediaClockChainNode::stream_input(
                    current_entity,
                    current_domain,
                    stream_index,
                    Some(talker.stream_index),
                ));
                drop(guard);

                // From here on a failure stops on the talker, not on the hop
                // we already resolved and pushed above.
                current_entity = talker.entity_id;

                let Some(talker_guard) = registry.get(talker.entity_id) else {
                    stop!(ClockChainStatus::EntityOffline)
                };
                if !talker_guard.is_loaded() {
                    stop!(ClockChainStatus::EntityOffline)
                }
                let Some(talker_entity) = talker_guard.entity.as_ref() else {
                    stop!(ClockChainStatus::EntityOffline)
                };
                let Some(talker_config) = talker_entity.active_configuration() else {
                    stop!(ClockChainStatus::AemError)
                };
                if !talker_config.stream_outputs.contains_key(&talker.stream_index) {
                    stop!(ClockChainStatus::AemError)
                }
                let next_domain = if talker_config.clock_domains.contains_key(&current_domain) {
                    current_domain
                } else if let Some(&first) = talker_config.clock_domains.keys().next() {
                    first
                } else {
                    stop!(ClockChainStatus::AemError)
                };

                current_domain = next_domain;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avdecc_model::clock::ClockChainNodeType;
    use avdecc_model::descriptor::{
        ClockDomainDynamicModel, ClockDomainNode, ClockDomainStaticModel, ClockSourceDynamicModel,
        ClockSourceNode, ClockSourceStaticModel, ConfigurationNode, EntityDynamicModel, EntityStaticModel,
        StreamDirection, StreamDynamicModel, StreamInputConnectionInfo, StreamNode, StreamStaticModel,
    };
    use avdecc_model::descriptor::DescriptorType;
    use avdecc_model::descriptor::EntityNode;
    use avdecc_model::ids::StreamIdentification;

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

    fn domain_with_source(source_index: DescriptorIndex) -> ClockDomainNode {
        ClockDomainNode {
            index: DescriptorIndex(0),
            static_model: ClockDomainStaticModel { clock_sources: vec![source_index] },
            dynamic_model: ClockDomainDynamicModel {
                object_name: String::new(),
                clock_source_index: source_index,
                media_clock_chain: None,
            },
        }
    }

    fn internal_source() -> ClockSourceNode {
        ClockSourceNode {
            index: DescriptorIndex(0),
            static_model: ClockSourceStaticModel {
                clock_source_type: ClockSourceType::Internal,
                clock_source_location_type: DescriptorType::ClockSource,
                clock_source_location_index: DescriptorIndex(0),
            },
            dynamic_model: ClockSourceDynamicModel { object_name: String::new(), clock_source_valid: true },
        }
    }

    #[test]
    fn internal_source_resolves_single_hop() {
        let registry = ControllerRegistry::new();
        let entity_id = EntityID(1);
        let mut entity = bare_entity(entity_id);
        let mut configuration = ConfigurationNode::default();
        configuration.clock_domains.insert(DescriptorIndex(0), domain_with_source(DescriptorIndex(0)));
        configuration.clock_sources.insert(DescriptorIndex(0), internal_source());
        entity.configurations.insert(DescriptorIndex(0), configuration);

        registry.entity_online(entity_id, 0);
        registry.mark_loaded(entity_id, entity, Default::default());

        let chain = resolve(&registry, entity_id, DescriptorIndex(0));
        assert_eq!(chain.status, ClockChainStatus::Active);
        assert_eq!(chain.nodes.len(), 1);
    }

    #[test]
    fn offline_entity_yields_entity_offline() {
        let registry = ControllerRegistry::new();
        let chain = resolve(&registry, EntityID(99), DescriptorIndex(0));
        assert_eq!(chain.status, ClockChainStatus::EntityOffline);
        assert_eq!(chain.nodes.len(), 1);
        assert_eq!(chain.terminal().unwrap().node_type, ClockChainNodeType::Undefined);
        assert_eq!(chain.terminal().unwrap().entity_id, EntityID(99));
    }

    #[test]
    fn two_entity_chain_follows_connected_stream_input() {
        let registry = ControllerRegistry::new();
        let listener_id = EntityID(1);
        let talker_id = EntityID(2);

        let stream_source = ClockSourceNode {
            index: DescriptorIndex(1),
            static_model: ClockSourceStaticModel {
                clock_source_type: ClockSourceType::InputStream,
                clock_source_location_type: DescriptorType::StreamInput,
                clock_source_location_index: DescriptorIndex(0),
            },
            dynamic_model: ClockSourceDynamicModel { object_name: String::new(), clock_source_valid: true },
        };
        let connected_stream = StreamNode {
            index: DescriptorIndex(0),
            direction: StreamDirection::Input,
            static_model: StreamStaticModel { formats: vec![], redundant_partner: None },
            dynamic_model: StreamDynamicModel {
                object_name: String::new(),
                current_format: 0,
                connection_info: Some(StreamInputConnectionInfo {
                    talker_stream: StreamIdentification::new(talker_id, DescriptorIndex(0)),
                    state: ConnectionState::Connected,
                }),
            },
        };

        let mut listener = bare_entity(listener_id);
        let mut listener_config = ConfigurationNode::default();
        listener_config.clock_domains.insert(DescriptorIndex(0), domain_with_source(DescriptorIndex(1)));
        listener_config.clock_sources.insert(DescriptorIndex(1), stream_source);
        listener_config.stream_inputs.insert(DescriptorIndex(0), connected_stream);
        listener.configurations.insert(DescriptorIndex(0), listener_config);

        let mut talker = bare_entity(talker_id);
        let mut talker_config = ConfigurationNode::default();
        talker_config.clock_domains.insert(DescriptorIndex(0), domain_with_source(DescriptorIndex(0)));
        talker_config.clock_sources.insert(DescriptorIndex(0), internal_source());
        talker_config.stream_outputs.insert(
            DescriptorIndex(0),
            StreamNode {
                index: DescriptorIndex(0),
                direction: StreamDirection::Output,
                static_model: StreamStaticModel { formats: vec![], redundant_partner: None },
                dynamic_model: StreamDynamicModel { object_name: String::new(), current_format: 0, connection_info: None },
            },
        );
        talker.configurations.insert(DescriptorIndex(0), talker_config);

        registry.entity_online(listener_id, 0);
        registry.mark_loaded(listener_id, listener, Default::default());
        registry.entity_online(talker_id, 0);
        registry.mark_loaded(talker_id, talker, Default::default());

        let chain = resolve(&registry, listener_id, DescriptorIndex(0));
        assert_eq!(chain.status, ClockChainStatus::Active);
        assert_eq!(chain.nodes.len(), 2);
        assert_eq!(chain.terminal().unwrap().entity_id, talker_id);
    }

    #[test]
    fn disconnected_stream_input_yields_stream_not_connected() {
        let registry = ControllerRegistry::new();
        let entity_id = EntityID(1);
        let stream_source = ClockSourceNode {
            index: DescriptorIndex(1),
            static_model: ClockSourceStaticModel {
                clock_source_type: ClockSourceType::InputStream,
                clock_source_location_type: DescriptorType::StreamInput,
                clock_source_location_index: DescriptorIndex(0),
            },
            dynamic_model: ClockSourceDynamicModel { object_name: String::new(), clock_source_valid: true },
        };
        let mut entity = bare_entity(entity_id);
        let mut configuration = ConfigurationNode::default();
        configuration.clock_domains.insert(DescriptorIndex(0), domain_with_source(DescriptorIndex(1)));
        configuration.clock_sources.insert(DescriptorIndex(1), stream_source);
        configuration.stream_inputs.insert(
            DescriptorIndex(0),
            StreamNode {
                index: DescriptorIndex(0),
                direction: StreamDirection::Input,
                static_model: StreamStaticModel { formats: vec![], redundant_partner: None },
                dynamic_model: StreamDynamicModel { object_name: String::new(), current_format: 0, connection_info: None },
            },
        );
        entity.configurations.insert(DescriptorIndex(0), configuration);

        registry.entity_online(entity_id, 0);
        registry.mark_loaded(entity_id, entity, Default::default());

        let chain = resolve(&registry, entity_id, DescriptorIndex(0));
        assert_eq!(chain.status, ClockChainStatus::StreamNotConnected);
        assert_eq!(chain.nodes.len(), 1);
    }

    /// Two entities each following a `StreamInput` fed by the other's
    /// `StreamOutput` (spec §8 scenario 3): resolution bounces between them
    /// once each way before the second visit to entity one is detected.
    #[test]
    fn mutual_listeners_yield_recursive_chain() {
        let registry = ControllerRegistry::new();
        let first_id = EntityID(1);
        let second_id = EntityID(2);

        fn stream_input_source() -> ClockSourceNode {
            ClockSourceNode {
                index: DescriptorIndex(1),
                static_model: ClockSourceStaticModel {
                    clock_source_type: ClockSourceType::InputStream,
                    clock_source_location_type: DescriptorType::StreamInput,
                    clock_source_location_index: DescriptorIndex(0),
                },
                dynamic_model: ClockSourceDynamicModel { object_name: String::new(), clock_source_valid: true },
            }
        }

        fn connected_input(peer: EntityID) -> StreamNode {
            StreamNode {
                index: DescriptorIndex(0),
                direction: StreamDirection::Input,
                static_model: StreamStaticModel { formats: vec![], redundant_partner: None },
                dynamic_model: StreamDynamicModel {
                    object_name: String::new(),
                    current_format: 0,
                    connection_info: Some(StreamInputConnectionInfo {
                        talker_stream: StreamIdentification::new(peer, DescriptorIndex(0)),
                        state: ConnectionState::Connected,
                    }),
                },
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

        let mut first = bare_entity(first_id);
        let mut first_config = ConfigurationNode::default();
        first_config.clock_domains.insert(DescriptorIndex(0), domain_with_source(DescriptorIndex(1)));
        first_config.clock_sources.insert(DescriptorIndex(1), stream_input_source());
        first_config.stream_inputs.insert(DescriptorIndex(0), connected_input(second_id));
        first_config.stream_outputs.insert(DescriptorIndex(0), stream_output());
        first.configurations.insert(DescriptorIndex(0), first_config);

        let mut second = bare_entity(second_id);
        let mut second_config = ConfigurationNode::default();
        second_config.clock_domains.insert(DescriptorIndex(0), domain_with_source(DescriptorIndex(1)));
        second_config.clock_sources.insert(DescriptorIndex(1), stream_input_source());
        second_config.stream_inputs.insert(DescriptorIndex(0), connected_input(first_id));
        second_config.stream_outputs.insert(DescriptorIndex(0), stream_output());
        second.configurations.insert(DescriptorIndex(0), second_config);

        registry.entity_online(first_id, 0);
        registry.mark_loaded(first_id, first, Default::default());
        registry.entity_online(second_id, 0);
        registry.mark_loaded(second_id, second, Default::default());

        let chain = resolve(&registry, first_id, DescriptorIndex(0));
        assert_eq!(chain.status, ClockChainStatus::Recursive);
        assert_eq!(chain.nodes.len(), 3);
        assert_eq!(chain.terminal().unwrap().node_type, ClockChainNodeType::Undefined);
        assert_eq!(chain.terminal().unwrap().entity_id, first_id);
    }
}
