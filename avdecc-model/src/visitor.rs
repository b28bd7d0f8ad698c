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

//! Descriptor tree walk (spec §4.H). Rather than the source's
//! per-(grandparent, parent, self) overloaded `visit` methods, a single
//! `visit` call takes a `VisitContext` that tags which descriptor kind is
//! being visited and carries its parent chain, so a visitor implementation
//! matches on one enum instead of providing twenty near-identical overloads.

use crate::descriptor::*;
use crate::ids::{DescriptorIndex, EntityID};

/// Identifies one node in the tree together with enough of its ancestry for
/// a visitor to place it (e.g. "stream port 2 of audio unit 0").
#[derive(Debug, Clone, Copy)]
pub enum VisitContext<'a> {
    Entity(&'a EntityNode),
    Configuration {
        entity: &'a EntityNode,
        configuration: &'a ConfigurationNode,
    },
    AudioUnit {
        configuration: &'a ConfigurationNode,
        audio_unit: &'a AudioUnitNode,
    },
    StreamPort {
        audio_unit: &'a AudioUnitNode,
        stream_port: &'a StreamPortNode,
    },
    AudioCluster {
        stream_port: &'a StreamPortNode,
        audio_cluster: &'a AudioClusterNode,
    },
    AudioMap {
        stream_port: &'a StreamPortNode,
        audio_map: &'a AudioMapNode,
    },
    Stream {
        configuration: &'a ConfigurationNode,
        stream: &'a StreamNode,
    },
    RedundantStream {
        configuration: &'a ConfigurationNode,
        redundant: RedundantStreamNode,
        direction: StreamDirection,
    },
    Jack {
        configuration: &'a ConfigurationNode,
        jack: &'a JackNode,
    },
    Control {
        jack: Option<&'a JackNode>,
        control: &'a ControlNode,
    },
    AvbInterface {
        configuration: &'a ConfigurationNode,
        avb_interface: &'a AvbInterfaceNode,
    },
    ClockSource {
        configuration: &'a ConfigurationNode,
        clock_source: &'a ClockSourceNode,
    },
    ClockDomain {
        configuration: &'a ConfigurationNode,
        clock_domain: &'a ClockDomainNode,
    },
    Locale {
        configuration: &'a ConfigurationNode,
        locale: &'a LocaleNode,
    },
    Strings {
        configuration: &'a ConfigurationNode,
        strings: &'a StringsNode,
    },
    MemoryObject {
        configuration: &'a ConfigurationNode,
        memory_object: &'a MemoryObjectNode,
    },
    Timing {
        configuration: &'a ConfigurationNode,
        timing: &'a TimingNode,
    },
    PtpInstance {
        timing: &'a TimingNode,
        ptp_instance: &'a PtpInstanceNode,
    },
    PtpPort {
        ptp_instance: &'a PtpInstanceNode,
        ptp_port: &'a PtpPortNode,
    },
}

pub trait EntityModelVisitor {
    fn visit(&mut self, context: VisitContext<'_>);
}

/// Walks the full tree of `entity`, calling `visitor.visit` once per node in
/// a stable, parent-before-child, index-ascending order (guaranteed by the
/// underlying `BTreeMap`s).
pub fn walk(entity: &EntityNode, visitor: &mut dyn EntityModelVisitor) {
    visitor.visit(VisitContext::Entity(entity));
    for configuration in entity.configurations.values() {
        walk_configuration(entity, configuration, visitor);
    }
}

fn walk_configuration(
    entity: &EntityNode,
    configuration: &ConfigurationNode,
    visitor: &mut dyn EntityModelVisitor,
) {
    visitor.visit(VisitContext::Configuration {
        entity,
        configuration,
    });

    for audio_unit in configuration.audio_units.values() {
        visitor.visit(VisitContext::AudioUnit {
            configuration,
            audio_unit,
        });
        for stream_port in audio_unit
            .stream_port_inputs
            .values()
            .chain(audio_unit.stream_port_outputs.values())
        {
            visitor.visit(VisitContext::StreamPort {
                audio_unit,
                stream_port,
            });
            for audio_cluster in stream_port.audio_clusters.values() {
                visitor.visit(VisitContext::AudioCluster {
                    stream_port,
                    audio_cluster,
                });
            }
            for audio_map in stream_port.audio_maps.values() {
                visitor.visit(VisitContext::AudioMap {
                    stream_port,
                    audio_map,
                });
            }
        }
    }

    let mut visited_redundant = std::collections::HashSet::new();
    for (direction, streams, pairs) in [
        (
            StreamDirection::Input,
            &configuration.stream_inputs,
            configuration.redundant_stream_inputs(),
        ),
        (
            StreamDirection::Output,
            &configuration.stream_outputs,
            configuration.redundant_stream_outputs(),
        ),
    ] {
        for pair in &pairs {
            visitor.visit(VisitContext::RedundantStream {
                configuration,
                redundant: *pair,
                direction,
            });
            visited_redundant.insert(pair.primary);
            visited_redundant.insert(pair.secondary);
        }
        for (index, stream) in streams {
            if !visited_redundant.contains(index) {
                visitor.visit(VisitContext::Stream {
                    configuration,
                    stream,
                });
            }
        }
    }

    for jack in configuration
        .jack_inputs
        .values()
        .chain(configuration.jack_outputs.values())
    {
        visitor.visit(VisitContext::Jack { configuration, jack });
        for control in jack.controls.values() {
            visitor.visit(VisitContext::Control {
                jack: Some(jack),
                control,
            });
        }
    }

    for control in configuration.controls.values() {
        visitor.visit(VisitContext::Control {
            jack: None,
            control,
        });
    }

    for avb_interface in configuration.avb_interfaces.values() {
        visitor.visit(VisitContext::AvbInterface {
            configuration,
            avb_interface,
        });
    }
    for clock_source in configuration.clock_sources.values() {
        visitor.visit(VisitContext::ClockSource {
            configuration,
            clock_source,
        });
    }
    for clock_domain in configuration.clock_domains.values() {
        visitor.visit(VisitContext::ClockDomain {
            configuration,
            clock_domain,
        });
    }
    for locale in configuration.locales.values() {
        visitor.visit(VisitContext::Locale { configuration, locale });
    }
    for strings in configuration.strings.values() {
        visitor.visit(VisitContext::Strings {
            configuration,
            strings,
        });
    }
    for memory_object in configuration.memory_objects.values() {
        visitor.visit(VisitContext::MemoryObject {
            configuration,
            memory_object,
        });
    }
    for timing in configuration.timings.values() {
        visitor.visit(VisitContext::Timing { configuration, timing });
        for ptp_instance in timing
            .static_model
            .ptp_instances
            .iter()
            .filter_map(|idx| configuration.ptp_instances.get(idx))
        {
            visitor.visit(VisitContext::PtpInstance {
                timing,
                ptp_instance,
            });
            for ptp_port in ptp_instance.ptp_ports.values() {
                visitor.visit(VisitContext::PtpPort {
                    ptp_instance,
                    ptp_port,
                });
            }
        }
    }
}

/// A human-readable dump of an entity's descriptor tree, in the spirit of a
/// simple command-line entity inspector: one indented line per node.
#[derive(Debug, Default)]
pub struct TextDumpVisitor {
    pub lines: Vec<String>,
}

impl EntityModelVisitor for TextDumpVisitor {
    fn visit(&mut self, context: VisitContext<'_>) {
        let line = match context {
            VisitContext::Entity(e) => format!("ENTITY {} \"{}\"", e.entity_id, e.dynamic_model.entity_name),
            VisitContext::Configuration { configuration, .. } => {
                format!("  CONFIGURATION {}", configuration.index)
            }
            VisitContext::AudioUnit { audio_unit, .. } => {
                format!("    AUDIO_UNIT {} \"{}\"", audio_unit.index, audio_unit.dynamic_model.object_name)
            }
            VisitContext::StreamPort { stream_port, .. } => {
                format!("      STREAM_PORT {}", stream_port.index)
            }
            VisitContext::AudioCluster { audio_cluster, .. } => {
                format!("        AUDIO_CLUSTER {} \"{}\"", audio_cluster.index, audio_cluster.dynamic_model.object_name)
            }
            VisitContext::AudioMap { audio_map, .. } => {
                format!("        AUDIO_MAP {}", audio_map.index)
            }
            VisitContext::Stream { stream, .. } => format!(
                "    STREAM_{:?} {} \"{}\"",
                stream.direction, stream.index, stream.dynamic_model.object_name
            ),
            VisitContext::RedundantStream { redundant, direction, .. } => format!(
                "    REDUNDANT_STREAM_{:?} primary={} secondary={}",
                direction, redundant.primary, redundant.secondary
            ),
            VisitContext::Jack { jack, .. } => {
                format!("    JACK_{:?} {} \"{}\"", jack.direction, jack.index, jack.dynamic_model.object_name)
            }
            VisitContext::Control { control, .. } => {
                format!("      CONTROL {} \"{}\"", control.index, control.dynamic_model.object_name)
            }
            VisitContext::AvbInterface { avb_interface, .. } => format!(
                "    AVB_INTERFACE {} {}",
                avb_interface.index, avb_interface.static_model.mac_address
            ),
            VisitContext::ClockSource { clock_source, .. } => {
                format!("    CLOCK_SOURCE {} \"{}\"", clock_source.index, clock_source.dynamic_model.object_name)
            }
            VisitContext::ClockDomain { clock_domain, .. } => {
                format!("    CLOCK_DOMAIN {} \"{}\"", clock_domain.index, clock_domain.dynamic_model.object_name)
            }
            VisitContext::Locale { locale, .. } => {
                format!("    LOCALE {} {}", locale.index, locale.static_model.locale_id)
            }
            VisitContext::Strings { strings, .. } => format!("    STRINGS {}", strings.index),
            VisitContext::MemoryObject { memory_object, .. } => format!(
                "    MEMORY_OBJECT {} \"{}\"",
                memory_object.index, memory_object.dynamic_model.object_name
            ),
            VisitContext::Timing { timing, .. } => format!("    TIMING {}", timing.index),
            VisitContext::PtpInstance { ptp_instance, .. } => {
                format!("      PTP_INSTANCE {}", ptp_instance.index)
            }
            VisitContext::PtpPort { ptp_port, .. } => format!("        PTP_PORT {}", ptp_port.index),
        };
        self.lines.push(line);
    }
}

impl TextDumpVisitor {
    pub fn dump(entity: &EntityNode) -> String {
        let mut visitor = TextDumpVisitor::default();
        walk(entity, &mut visitor);
        visitor.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::DescriptorIndex;
    use std::collections::BTreeMap;

    fn sample_entity() -> EntityNode {
        let mut config = ConfigurationNode {
            index: DescriptorIndex(0),
            ..ConfigurationNode::default()
        };
        config.clock_domains.insert(
            DescriptorIndex(0),
            ClockDomainNode {
                index: DescriptorIndex(0),
                static_model: ClockDomainStaticModel {
                    clock_sources: vec![],
                },
                dynamic_model: ClockDomainDynamicModel {
                    object_name: "CLK".into(),
                    clock_source_index: DescriptorIndex(0),
                    media_clock_chain: None,
                },
            },
        );
        let mut configurations = BTreeMap::new();
        configurations.insert(DescriptorIndex(0), config);
        EntityNode {
            entity_id: EntityID(0x1122),
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
                entity_name: "My Entity".into(),
                group_name: String::new(),
                firmware_version: String::new(),
                serial_number: String::new(),
                current_configuration: DescriptorIndex(0),
            },
            configurations,
        }
    }

    #[test]
    fn walk_visits_entity_then_configuration_then_clock_domain() {
        let entity = sample_entity();
        let mut visitor = TextDumpVisitor::default();
        walk(&entity, &mut visitor);
        assert_eq!(visitor.lines.len(), 3);
        assert!(visitor.lines[0].starts_with("ENTITY"));
        assert!(visitor.lines[1].contains("CONFIGURATION"));
        assert!(visitor.lines[2].contains("CLOCK_DOMAIN"));
    }

    #[test]
    fn dump_is_deterministic_across_runs() {
        let entity = sample_entity();
        assert_eq!(TextDumpVisitor::dump(&entity), TextDumpVisitor::dump(&entity));
    }
}
