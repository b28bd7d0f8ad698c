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

//! The enumeration scheduler (spec §4.I): turns a freshly-discovered
//! `EntityID` into a fully populated `EntityNode`.
//!
//! 1. `ReadDescriptor` the `EntityDescriptor`. Failure here is catastrophic
//!    (`EnumerationError::CatastrophicFailure`); the entity never completes.
//! 2. Recursively `ReadDescriptor` the rest of the static tree, unless a
//!    cache hit for this `entityModelID` lets the walk be skipped.
//! 3. Re-fetch dynamic state a cache hit can't have given us for free
//!    (names, current format, current sampling rate, current clock source).
//! 4. Subscribe to unsolicited notifications.
//!
//! Per-descriptor failure policy: `NotImplemented`/`NoSuchDescriptor` marks
//! that descriptor absent and continues; anything else (most commonly a
//! timeout after the AECP state machine's own retries) flags the entity
//! `misbehaving` and continues. Only a failure reading the entity
//! descriptor itself aborts the whole walk.

use crate::cache::ModelCache;
use crate::config::EnumerationConfig;
use crate::descriptor_codec;
use crate::error::{EnumerationError, EnumerationResult};
use avdecc_core::error::{AemStatus, ProtocolError};
use avdecc_core::local_entity::LocalEntity;
use avdecc_model::descriptor::*;
use avdecc_model::ids::{DescriptorIndex, DescriptorType, EntityID};
use std::collections::BTreeMap;
use tracing::debug;

/// What the scheduler learned while walking one entity.
pub struct EnumerationOutcome {
    pub entity: EntityNode,
    /// Set the first time a descriptor read fails in a way other than
    /// `NotImplemented`/`NoSuchDescriptor` (spec §4.I); the caller should
    /// fold this into the entity's `Misbehaving` compatibility flag.
    pub misbehaving: bool,
    pub used_cache: bool,
}

enum ReadFailure {
    Absent,
    Misbehaving,
}

fn classify(err: &ProtocolError) -> ReadFailure {
    match err {
        ProtocolError::AemStatus(AemStatus::NotImplemented)
        | ProtocolError::AemStatus(AemStatus::NoSuchDescriptor) => ReadFailure::Absent,
        _ => ReadFailure::Misbehaving,
    }
}

pub struct EnumerationScheduler {
    cache: ModelCache,
    fast_enumeration: bool,
}

/// The three handles every step of the recursive descriptor walk needs.
/// Bundled so the walk's helper methods take one argument instead of three.
struct WalkContext<'a> {
    local_entity: &'a LocalEntity,
    entity_id: EntityID,
    config_index: DescriptorIndex,
}

impl EnumerationScheduler {
    pub fn new(config: EnumerationConfig) -> Self {
        Self {
            cache: ModelCache::new(config.cache_directory),
            fast_enumeration: config.fast_enumeration,
        }
    }

    pub fn fast_enumeration(&self) -> bool {
        self.fast_enumeration
    }

    pub async fn enumerate(
        &self,
        local_entity: &LocalEntity,
        entity_id: EntityID,
    ) -> EnumerationResult<EnumerationOutcome> {
        let mut misbehaving = false;

        let entity_bytes = local_entity
            .read_descriptor(
                entity_id,
                DescriptorIndex(0),
                DescriptorType::Entity,
                DescriptorIndex(0),
            )
            .await
            .map_err(|err| EnumerationError::CatastrophicFailure(entity_id, err))?;
        let (entity_static, entity_dynamic) = descriptor_codec::parse_entity(&entity_bytes)?;

        let cached = self
            .cache
            .load_by_entity_model_id(entity_static.entity_model_id)
            .await?;

        let (configurations, used_cache) = match cached {
            Some(cached_entity) => {
                debug!(entity = %entity_id, "cache hit for entityModelID {:#x}", entity_static.entity_model_id);
                let mut configurations = cached_entity.configurations;
                self.refresh_dynamic_state(
                    local_entity,
                    entity_id,
                    &entity_dynamic,
                    &mut configurations,
                    &mut misbehaving,
                )
                .await;
                (configurations, true)
            }
            None => {
                let mut configurations = BTreeMap::new();
                for index in 0..entity_static.configurations_count {
                    let config_index = DescriptorIndex(index);
                    let ctx = WalkContext {
                        local_entity,
                        entity_id,
                        config_index,
                    };
                    if let Some(node) = self.read_configuration(&ctx, &mut misbehaving).await {
                        configurations.insert(config_index, node);
                    }
                }
                (configurations, false)
            }
        };

        let entity = EntityNode {
            entity_id,
            static_model: entity_static,
            dynamic_model: entity_dynamic,
            configurations,
        };

        if !used_cache {
            if let Err(err) = self.cache.store(&entity).await {
                debug!(entity = %entity_id, "failed to persist entity-model cache entry: {err}");
            }
        }

        if let Err(err) = local_entity.register_unsolicited_notifications(entity_id).await {
            debug!(entity = %entity_id, "failed to subscribe to unsolicited notifications: {err}");
            misbehaving = true;
        }

        Ok(EnumerationOutcome {
            entity,
            misbehaving,
            used_cache,
        })
    }

    async fn read_configuration(
        &self,
        ctx: &WalkContext<'_>,
        misbehaving: &mut bool,
    ) -> Option<ConfigurationNode> {
        let bytes = match ctx
            .local_entity
            .read_descriptor(
                ctx.entity_id,
                DescriptorIndex(0),
                DescriptorType::Configuration,
                ctx.config_index,
            )
            .await
        {
            Ok(bytes) => bytes,
            Err(err) => {
                match classify(&err) {
                    ReadFailure::Absent => {}
                    ReadFailure::Misbehaving => *misbehaving = true,
                }
                return None;
            }
        };
        let (static_model, dynamic_model) = match descriptor_codec::parse_configuration(&bytes) {
            Ok(parsed) => parsed,
            Err(_) => return None,
        };

        let mut node = ConfigurationNode {
            index: ctx.config_index,
            static_model: Some(static_model.clone()),
            dynamic_model: Some(dynamic_model),
            ..ConfigurationNode::default()
        };

        for (descriptor_type, count) in &static_model.descriptor_counts {
            for i in 0..*count {
                let descriptor_index = DescriptorIndex(i);
                self.read_child_descriptor(ctx, *descriptor_type, descriptor_index, &mut node, misbehaving)
                    .await;
            }
        }

        Some(node)
    }

    async fn read_child_descriptor(
        &self,
        ctx: &WalkContext<'_>,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        node: &mut ConfigurationNode,
        misbehaving: &mut bool,
    ) {
        macro_rules! fetch {
            () => {
                match ctx
                    .local_entity
                    .read_descriptor(ctx.entity_id, ctx.config_index, descriptor_type, descriptor_index)
                    .await
                {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        match classify(&err) {
                            ReadFailure::Absent => {}
                            ReadFailure::Misbehaving => *misbehaving = true,
                        }
                        return;
                    }
                }
            };
        }

        match descriptor_type {
            DescriptorType::AudioUnit => {
                let bytes = fetch!();
                let Ok((static_model, dynamic_model)) = descriptor_codec::parse_audio_unit(&bytes) else {
                    return;
                };
                let mut unit = AudioUnitNode {
                    index: descriptor_index,
                    static_model,
                    dynamic_model,
                    stream_port_inputs: BTreeMap::new(),
                    stream_port_outputs: BTreeMap::new(),
                };
                for i in 0..unit.static_model.number_of_stream_input_ports {
                    if let Some(port) = self
                        .read_stream_port(
                            ctx,
                            DescriptorType::StreamPortInput,
                            DescriptorIndex(i),
                            StreamDirection::Input,
                            misbehaving,
                        )
                        .await
                    {
                        unit.stream_port_inputs.insert(DescriptorIndex(i), port);
                    }
                }
                for i in 0..unit.static_model.number_of_stream_output_ports {
                    if let Some(port) = self
                        .read_stream_port(
                            ctx,
                            DescriptorType::StreamPortOutput,
                            DescriptorIndex(i),
                            StreamDirection::Output,
                            misbehaving,
                        )
                        .await
                    {
                        unit.stream_port_outputs.insert(DescriptorIndex(i), port);
                    }
                }
                node.audio_units.insert(descriptor_index, unit);
            }
            DescriptorType::StreamInput | DescriptorType::StreamOutput => {
                let bytes = fetch!();
                let direction = if descriptor_type == DescriptorType::StreamInput {
                    StreamDirection::Input
                } else {
                    StreamDirection::Output
                };
                let Ok((static_model, dynamic_model)) =
                    descriptor_codec::parse_stream(&bytes, direction)
                else {
                    return;
                };
                let stream = StreamNode {
                    index: descriptor_index,
                    direction,
                    static_model,
                    dynamic_model,
                };
                if direction == StreamDirection::Input {
                    node.stream_inputs.insert(descriptor_index, stream);
                } else {
                    node.stream_outputs.insert(descriptor_index, stream);
                }
            }
            DescriptorType::JackInput | DescriptorType::JackOutput => {
                let bytes = fetch!();
                let direction = if descriptor_type == DescriptorType::JackInput {
                    StreamDirection::Input
                } else {
                    StreamDirection::Output
                };
                let Ok((static_model, dynamic_model)) = descriptor_codec::parse_jack(&bytes) else {
                    return;
                };
                let mut jack = JackNode {
                    index: descriptor_index,
                    direction,
                    static_model,
                    dynamic_model,
                    controls: BTreeMap::new(),
                };
                for i in 0..jack.static_model.number_of_controls {
                    if let Some(control) = self.read_control(ctx, DescriptorIndex(i), misbehaving).await {
                        jack.controls.insert(DescriptorIndex(i), control);
                    }
                }
                if direction == StreamDirection::Input {
                    node.jack_inputs.insert(descriptor_index, jack);
                } else {
                    node.jack_outputs.insert(descriptor_index, jack);
                }
            }
            DescriptorType::AvbInterface => {
                let bytes = fetch!();
                let Ok((static_model, dynamic_model)) = descriptor_codec::parse_avb_interface(&bytes)
                else {
                    return;
                };
                node.avb_interfaces.insert(
                    descriptor_index,
                    AvbInterfaceNode {
                        index: descriptor_index,
                        static_model,
                        dynamic_model,
                    },
                );
            }
            DescriptorType::ClockSource => {
                let bytes = fetch!();
                let Ok((static_model, dynamic_model)) = descriptor_codec::parse_clock_source(&bytes)
                else {
                    return;
                };
                node.clock_sources.insert(
                    descriptor_index,
                    ClockSourceNode {
                        index: descriptor_index,
                        static_model,
                        dynamic_model,
                    },
                );
            }
            DescriptorType::ClockDomain => {
                let bytes = fetch!();
                let Ok((static_model, dynamic_model)) = descriptor_codec::parse_clock_domain(&bytes)
                else {
                    return;
                };
                node.clock_domains.insert(
                    descriptor_index,
                    ClockDomainNode {
                        index: descriptor_index,
                        static_model,
                        dynamic_model,
                    },
                );
            }
            DescriptorType::Locale => {
                let bytes = fetch!();
                let Ok(static_model) = descriptor_codec::parse_locale(&bytes) else {
                    return;
                };
                node.locales.insert(
                    descriptor_index,
                    LocaleNode {
                        index: descriptor_index,
                        static_model,
                    },
                );
            }
            DescriptorType::Strings => {
                let bytes = fetch!();
                let Ok(static_model) = descriptor_codec::parse_strings(&bytes) else {
                    return;
                };
                node.strings.insert(
                    descriptor_index,
                    StringsNode {
                        index: descriptor_index,
                        static_model,
                    },
                );
            }
            DescriptorType::Control => {
                if let Some(control) = self.read_control(ctx, descriptor_index, misbehaving).await {
                    node.controls.insert(descriptor_index, control);
                }
            }
            DescriptorType::MemoryObject => {
                let bytes = fetch!();
                let Ok((static_model, dynamic_model)) =
                    descriptor_codec::parse_memory_object(&bytes)
                else {
                    return;
                };
                node.memory_objects.insert(
                    descriptor_index,
                    MemoryObjectNode {
                        index: descriptor_index,
                        static_model,
                        dynamic_model,
                    },
                );
            }
            DescriptorType::Timing => {
                let bytes = fetch!();
                let Ok(static_model) = descriptor_codec::parse_timing(&bytes) else {
                    return;
                };
                node.timings.insert(
                    descriptor_index,
                    TimingNode {
                        index: descriptor_index,
                        static_model,
                    },
                );
            }
            DescriptorType::PtpInstance => {
                let bytes = fetch!();
                let Ok(static_model) = descriptor_codec::parse_ptp_instance(&bytes) else {
                    return;
                };
                let mut instance = PtpInstanceNode {
                    index: descriptor_index,
                    static_model,
                    ptp_ports: BTreeMap::new(),
                };
                for i in 0..instance.static_model.number_of_ptp_ports {
                    let port_bytes = match ctx
                        .local_entity
                        .read_descriptor(
                            ctx.entity_id,
                            ctx.config_index,
                            DescriptorType::PtpPort,
                            DescriptorIndex(i),
                        )
                        .await
                    {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            match classify(&err) {
                                ReadFailure::Absent => continue,
                                ReadFailure::Misbehaving => *misbehaving = true,
                            }
                            continue;
                        }
                    };
                    if let Ok(static_model) = descriptor_codec::parse_ptp_port(&port_bytes) {
                        instance.ptp_ports.insert(
                            DescriptorIndex(i),
                            PtpPortNode {
                                index: DescriptorIndex(i),
                                static_model,
                            },
                        );
                    }
                }
                node.ptp_instances.insert(descriptor_index, instance);
            }
            _ => {
                // Not part of the entity-model surface this stack models
                // (video/sensor/matrix/signal-processing descriptor kinds).
            }
        }
    }

    async fn read_stream_port(
        &self,
        ctx: &WalkContext<'_>,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        direction: StreamDirection,
        misbehaving: &mut bool,
    ) -> Option<StreamPortNode> {
        let bytes = match ctx
            .local_entity
            .read_descriptor(ctx.entity_id, ctx.config_index, descriptor_type, descriptor_index)
            .await
        {
            Ok(bytes) => bytes,
            Err(err) => {
                match classify(&err) {
                    ReadFailure::Absent => {}
                    ReadFailure::Misbehaving => *misbehaving = true,
                }
                return None;
            }
        };
        let (static_model, dynamic_model) = descriptor_codec::parse_stream_port(&bytes).ok()?;

        let mut port = StreamPortNode {
            index: descriptor_index,
            direction,
            static_model: static_model.clone(),
            dynamic_model,
            audio_clusters: BTreeMap::new(),
            audio_maps: BTreeMap::new(),
        };

        for i in 0..static_model.number_of_clusters {
            let cluster_index = DescriptorIndex(static_model.base_cluster.0 + i);
            let cluster_bytes = match ctx
                .local_entity
                .read_descriptor(
                    ctx.entity_id,
                    ctx.config_index,
                    DescriptorType::AudioCluster,
                    cluster_index,
                )
                .await
            {
                Ok(bytes) => bytes,
                Err(err) => {
                    match classify(&err) {
                        ReadFailure::Absent => continue,
                        ReadFailure::Misbehaving => *misbehaving = true,
                    }
                    continue;
                }
            };
            if let Ok((static_model, dynamic_model)) =
                descriptor_codec::parse_audio_cluster(&cluster_bytes)
            {
                port.audio_clusters.insert(
                    cluster_index,
                    AudioClusterNode {
                        index: cluster_index,
                        static_model,
                        dynamic_model,
                    },
                );
            }
        }

        for i in 0..static_model.number_of_maps {
            let map_index = DescriptorIndex(i);
            let map_bytes = match ctx
                .local_entity
                .read_descriptor(ctx.entity_id, ctx.config_index, DescriptorType::AudioMap, map_index)
                .await
            {
                Ok(bytes) => bytes,
                Err(err) => {
                    match classify(&err) {
                        ReadFailure::Absent => continue,
                        ReadFailure::Misbehaving => *misbehaving = true,
                    }
                    continue;
                }
            };
            if let Ok(static_model) = descriptor_codec::parse_audio_map(&map_bytes) {
                port.audio_maps
                    .insert(map_index, AudioMapNode { index: map_index, static_model });
            }
        }

        Some(port)
    }

    async fn read_control(
        &self,
        ctx: &WalkContext<'_>,
        descriptor_index: DescriptorIndex,
        misbehaving: &mut bool,
    ) -> Option<ControlNode> {
        let bytes = match ctx
            .local_entity
            .read_descriptor(ctx.entity_id, ctx.config_index, DescriptorType::Control, descriptor_index)
            .await
        {
            Ok(bytes) => bytes,
            Err(err) => {
                match classify(&err) {
                    ReadFailure::Absent => {}
                    ReadFailure::Misbehaving => *misbehaving = true,
                }
                return None;
            }
        };
        let static_model = descriptor_codec::parse_control(&bytes).ok()?;
        // Control values carry their own variable-length wire shape per
        // `control_value_type`; this walk only needs the control's identity
        // to place it in the tree, so it seeds a zeroed linear value rather
        // than parsing the value block here.
        let values = avdecc_model::control_values::ControlValues::Linear(
            avdecc_model::control_values::LinearValues {
                minimum: 0,
                maximum: 0,
                step: 0,
                default: 0,
                current: 0,
            },
        );
        Some(ControlNode {
            index: descriptor_index,
            static_model,
            dynamic_model: ControlDynamicModel {
                object_name: String::new(),
                values,
            },
        })
    }

    /// Step 3 (spec §4.I): a cache hit gave us the static tree's shape for
    /// free, but none of its dynamic fields. Re-fetch the handful that
    /// actually change at runtime rather than re-reading every descriptor.
    async fn refresh_dynamic_state(
        &self,
        local_entity: &LocalEntity,
        entity_id: EntityID,
        _entity_dynamic: &EntityDynamicModel,
        configurations: &mut BTreeMap<DescriptorIndex, ConfigurationNode>,
        misbehaving: &mut bool,
    ) {
        for config in configurations.values_mut() {
            for (unit_index, unit) in config.audio_units.iter_mut() {
                match local_entity
                    .get_sampling_rate(entity_id, *unit_index, DescriptorType::AudioUnit)
                    .await
                {
                    Ok(rate) => unit.dynamic_model.current_sampling_rate = rate,
                    Err(err) => self.note_dynamic_read_failure(err, misbehaving),
                }
            }
            for streams in [&mut config.stream_inputs, &mut config.stream_outputs] {
                for (stream_index, stream) in streams.iter_mut() {
                    let descriptor_type = if stream.direction == StreamDirection::Input {
                        DescriptorType::StreamInput
                    } else {
                        DescriptorType::StreamOutput
                    };
                    match local_entity
                        .get_stream_info(entity_id, *stream_index, descriptor_type)
                        .await
                    {
                        Ok(info) => stream.dynamic_model.current_format = info.stream_format,
                        Err(err) => self.note_dynamic_read_failure(err, misbehaving),
                    }
                }
            }
            for (domain_index, domain) in config.clock_domains.iter_mut() {
                match local_entity.get_clock_source(entity_id, *domain_index).await {
                    Ok(source_index) => domain.dynamic_model.clock_source_index = source_index,
                    Err(err) => self.note_dynamic_read_failure(err, misbehaving),
                }
            }
        }
    }

    fn note_dynamic_read_failure(&self, err: ProtocolError, misbehaving: &mut bool) {
        if let ReadFailure::Misbehaving = classify(&err) {
            *misbehaving = true;
        }
    }
}
