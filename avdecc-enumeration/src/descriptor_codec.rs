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

//! Decodes the raw `commandSpecificData` a `ReadDescriptor` response carries
//! into the typed static/dynamic model pairs `avdecc_model::descriptor`
//! defines. Every AEM descriptor is big-endian with a fixed 64-byte padded
//! UTF-8 name field wherever the entity model has one, mirroring the name
//! encoding already used by `local_entity::get_name`/`set_name`.

use crate::error::{EnumerationError, EnumerationResult};
use avdecc_model::descriptor::*;
use avdecc_model::ids::{AudioMapping, DescriptorIndex, DescriptorType, MacAddress};
use std::collections::BTreeMap;

fn require_len(
    descriptor_type: DescriptorType,
    bytes: &[u8],
    needed: usize,
) -> EnumerationResult<()> {
    if bytes.len() < needed {
        return Err(EnumerationError::MalformedDescriptor {
            descriptor_type,
            needed,
            got: bytes.len(),
        });
    }
    Ok(())
}

fn read_name(bytes: &[u8], offset: usize) -> String {
    let field = bytes.get(offset..offset + 64).unwrap_or(&[]);
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(bytes[offset..offset + 4].try_into().expect("4-byte slice"))
}

fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    u64::from_be_bytes(bytes[offset..offset + 8].try_into().expect("8-byte slice"))
}

/// `EntityDescriptor` (spec §6.3 ReadDescriptor, Entity type): identifiers
/// and capability flags, plus the dynamic entity/group/firmware/serial
/// strings and the currently active configuration.
pub fn parse_entity(bytes: &[u8]) -> EnumerationResult<(EntityStaticModel, EntityDynamicModel)> {
    require_len(DescriptorType::Entity, bytes, 2 + 8 * 2 + 4 + 2 * 4 + 4 + 2 + 2 + 64 * 2 + 64 + 64 + 2)?;
    let entity_model_id = u64_at(bytes, 8);
    let entity_capabilities = u32_at(bytes, 16);
    let talker_stream_sources = u16_at(bytes, 20);
    let talker_capabilities = u16_at(bytes, 22);
    let listener_stream_sinks = u16_at(bytes, 24);
    let listener_capabilities = u16_at(bytes, 26);
    let controller_capabilities = u32_at(bytes, 28);
    let identify_control_index = match u16_at(bytes, 36) {
        0xffff => None,
        other => Some(DescriptorIndex(other)),
    };
    let configurations_count = u16_at(bytes, 46);
    let entity_name = read_name(bytes, 48);
    let group_name = read_name(bytes, 112);
    let firmware_version = read_name(bytes, 176);
    let serial_number = read_name(bytes, 240);
    let current_configuration = DescriptorIndex(u16_at(bytes, 304));

    Ok((
        EntityStaticModel {
            entity_model_id,
            entity_capabilities,
            talker_stream_sources,
            talker_capabilities,
            listener_stream_sinks,
            listener_capabilities,
            controller_capabilities,
            identify_control_index,
            configurations_count,
        },
        EntityDynamicModel {
            entity_name,
            group_name,
            firmware_version,
            serial_number,
            current_configuration,
        },
    ))
}

/// `ConfigurationDescriptor`: per-type descriptor counts plus the dynamic
/// object name and active flag.
pub fn parse_configuration(
    bytes: &[u8],
) -> EnumerationResult<(ConfigurationStaticModel, ConfigurationDynamicModel)> {
    require_len(DescriptorType::Configuration, bytes, 64 + 2 + 2)?;
    let object_name = read_name(bytes, 0);
    let descriptor_counts_count = u16_at(bytes, 66) as usize;
    let mut descriptor_counts = BTreeMap::new();
    let mut offset = 68;
    for _ in 0..descriptor_counts_count {
        require_len(DescriptorType::Configuration, bytes, offset + 4)?;
        let ty_raw = u16_at(bytes, offset);
        let count = u16_at(bytes, offset + 2);
        if let Some(ty) = DescriptorType::from_u16(ty_raw) {
            descriptor_counts.insert(ty, count);
        }
        offset += 4;
    }
    Ok((
        ConfigurationStaticModel { descriptor_counts },
        ConfigurationDynamicModel {
            object_name,
            is_active: false,
        },
    ))
}

pub fn parse_audio_unit(
    bytes: &[u8],
) -> EnumerationResult<(AudioUnitStaticModel, AudioUnitDynamicModel)> {
    require_len(DescriptorType::AudioUnit, bytes, 64 + 2 + 2 + 4 + 4)?;
    let object_name = read_name(bytes, 0);
    let number_of_stream_input_ports = u16_at(bytes, 64);
    let number_of_stream_output_ports = u16_at(bytes, 66);
    let current_sampling_rate = u32_at(bytes, 68);
    let sampling_rates_count = u16_at(bytes, 72) as usize;
    let mut sampling_rates = Vec::with_capacity(sampling_rates_count);
    let mut offset = 74;
    for _ in 0..sampling_rates_count {
        require_len(DescriptorType::AudioUnit, bytes, offset + 4)?;
        sampling_rates.push(u32_at(bytes, offset));
        offset += 4;
    }
    Ok((
        AudioUnitStaticModel {
            number_of_stream_input_ports,
            number_of_stream_output_ports,
            sampling_rates,
        },
        AudioUnitDynamicModel {
            object_name,
            current_sampling_rate,
        },
    ))
}

pub fn parse_stream(
    bytes: &[u8],
    direction: StreamDirection,
) -> EnumerationResult<(StreamStaticModel, StreamDynamicModel)> {
    require_len(DescriptorType::StreamInput, bytes, 64 + 8 + 2 + 2)?;
    let object_name = read_name(bytes, 0);
    let current_format = u64_at(bytes, 64);
    let redundant_partner = match u16_at(bytes, 72) {
        0xffff => None,
        other => Some(DescriptorIndex(other)),
    };
    let formats_count = u16_at(bytes, 74) as usize;
    let mut formats = Vec::with_capacity(formats_count);
    let mut offset = 76;
    for _ in 0..formats_count {
        require_len(DescriptorType::StreamInput, bytes, offset + 8)?;
        formats.push(u64_at(bytes, offset));
        offset += 8;
    }
    Ok((
        StreamStaticModel {
            formats,
            redundant_partner,
        },
        StreamDynamicModel {
            object_name,
            current_format,
            connection_info: if direction == StreamDirection::Input {
                Some(avdecc_model::connection::StreamInputConnectionInfo::not_connected())
            } else {
                None
            },
        },
    ))
}

pub fn parse_jack(bytes: &[u8]) -> EnumerationResult<(JackStaticModel, JackDynamicModel)> {
    require_len(DescriptorType::JackInput, bytes, 64 + 2 + 2 + 2)?;
    let object_name = read_name(bytes, 0);
    let jack_type = u16_at(bytes, 66);
    let number_of_controls = u16_at(bytes, 68);
    Ok((
        JackStaticModel {
            jack_type,
            number_of_controls,
        },
        JackDynamicModel { object_name },
    ))
}

pub fn parse_avb_interface(
    bytes: &[u8],
) -> EnumerationResult<(AvbInterfaceStaticModel, AvbInterfaceDynamicModel)> {
    require_len(DescriptorType::AvbInterface, bytes, 64 + 6 + 2 + 8 + 1)?;
    let object_name = read_name(bytes, 0);
    let mac_address = MacAddress([
        bytes[64], bytes[65], bytes[66], bytes[67], bytes[68], bytes[69],
    ]);
    let interface_flags = u16_at(bytes, 70);
    let gptp_grandmaster_id = u64_at(bytes, 72);
    let gptp_domain_number = bytes[80];
    Ok((
        AvbInterfaceStaticModel {
            mac_address,
            interface_flags,
        },
        AvbInterfaceDynamicModel {
            object_name,
            gptp_grandmaster_id,
            gptp_domain_number,
        },
    ))
}

pub fn parse_clock_source(
    bytes: &[u8],
) -> EnumerationResult<(ClockSourceStaticModel, ClockSourceDynamicModel)> {
    require_len(DescriptorType::ClockSource, bytes, 64 + 2 + 2 + 2 + 1)?;
    let object_name = read_name(bytes, 0);
    let clock_source_type = match u16_at(bytes, 64) {
        1 => ClockSourceType::External,
        2 => ClockSourceType::InputStream,
        _ => ClockSourceType::Internal,
    };
    let clock_source_location_type =
        DescriptorType::from_u16(u16_at(bytes, 66)).unwrap_or(DescriptorType::Entity);
    let clock_source_location_index = DescriptorIndex(u16_at(bytes, 68));
    let clock_source_valid = bytes[70] != 0;
    Ok((
        ClockSourceStaticModel {
            clock_source_type,
            clock_source_location_type,
            clock_source_location_index,
        },
        ClockSourceDynamicModel {
            object_name,
            clock_source_valid,
        },
    ))
}

pub fn parse_clock_domain(
    bytes: &[u8],
) -> EnumerationResult<(ClockDomainStaticModel, ClockDomainDynamicModel)> {
    require_len(DescriptorType::ClockDomain, bytes, 64 + 2 + 2)?;
    let object_name = read_name(bytes, 0);
    let clock_source_index = DescriptorIndex(u16_at(bytes, 64));
    let clock_sources_count = u16_at(bytes, 66) as usize;
    let mut clock_sources = Vec::with_capacity(clock_sources_count);
    let mut offset = 68;
    for _ in 0..clock_sources_count {
        require_len(DescriptorType::ClockDomain, bytes, offset + 2)?;
        clock_sources.push(DescriptorIndex(u16_at(bytes, offset)));
        offset += 2;
    }
    Ok((
        ClockDomainStaticModel { clock_sources },
        ClockDomainDynamicModel {
            object_name,
            clock_source_index,
            media_clock_chain: None,
        },
    ))
}

pub fn parse_locale(bytes: &[u8]) -> EnumerationResult<LocaleStaticModel> {
    require_len(DescriptorType::Locale, bytes, 64 + 2 + 2)?;
    Ok(LocaleStaticModel {
        locale_id: read_name(bytes, 0),
        number_of_strings: u16_at(bytes, 64),
        base_strings_index: DescriptorIndex(u16_at(bytes, 66)),
    })
}

pub fn parse_strings(bytes: &[u8]) -> EnumerationResult<StringsStaticModel> {
    require_len(DescriptorType::Strings, bytes, 64 * 7)?;
    let mut strings: [String; 7] = Default::default();
    for (i, s) in strings.iter_mut().enumerate() {
        *s = read_name(bytes, i * 64);
    }
    Ok(StringsStaticModel { strings })
}

pub fn parse_stream_port(
    bytes: &[u8],
) -> EnumerationResult<(StreamPortStaticModel, StreamPortDynamicModel)> {
    require_len(DescriptorType::StreamPortInput, bytes, 2 + 2 + 2 + 1)?;
    let number_of_clusters = u16_at(bytes, 0);
    let base_cluster = DescriptorIndex(u16_at(bytes, 2));
    let number_of_maps = u16_at(bytes, 4);
    let has_dynamic_audio_map = bytes[6] != 0;
    Ok((
        StreamPortStaticModel {
            number_of_clusters,
            base_cluster,
            number_of_maps,
            has_dynamic_audio_map,
        },
        StreamPortDynamicModel::default(),
    ))
}

pub fn parse_audio_cluster(
    bytes: &[u8],
) -> EnumerationResult<(AudioClusterStaticModel, AudioClusterDynamicModel)> {
    require_len(DescriptorType::AudioCluster, bytes, 64 + 2 + 2 + 4 + 2 + 1)?;
    let object_name = read_name(bytes, 0);
    let signal_type = DescriptorType::from_u16(u16_at(bytes, 64)).unwrap_or(DescriptorType::Entity);
    let signal_index = DescriptorIndex(u16_at(bytes, 66));
    let path_latency = u32_at(bytes, 68);
    let channel_count = u16_at(bytes, 72);
    let format = bytes[74];
    Ok((
        AudioClusterStaticModel {
            signal_type,
            signal_index,
            path_latency,
            channel_count,
            format,
        },
        AudioClusterDynamicModel { object_name },
    ))
}

pub fn parse_audio_map(bytes: &[u8]) -> EnumerationResult<AudioMapStaticModel> {
    require_len(DescriptorType::AudioMap, bytes, 2)?;
    let count = u16_at(bytes, 0) as usize;
    let mut mappings = Vec::with_capacity(count);
    let mut offset = 2;
    for _ in 0..count {
        require_len(DescriptorType::AudioMap, bytes, offset + 8)?;
        mappings.push(AudioMapping {
            stream_index: DescriptorIndex(u16_at(bytes, offset)),
            stream_channel: u16_at(bytes, offset + 2),
            cluster_offset: u16_at(bytes, offset + 4),
            cluster_channel: u16_at(bytes, offset + 6),
        });
        offset += 8;
    }
    Ok(AudioMapStaticModel { mappings })
}

pub fn parse_control(bytes: &[u8]) -> EnumerationResult<ControlStaticModel> {
    require_len(DescriptorType::Control, bytes, 64 + 8 + 2)?;
    Ok(ControlStaticModel {
        control_type: u64_at(bytes, 64),
        control_value_type: u16_at(bytes, 72),
    })
}

pub fn parse_memory_object(
    bytes: &[u8],
) -> EnumerationResult<(MemoryObjectStaticModel, MemoryObjectDynamicModel)> {
    require_len(DescriptorType::MemoryObject, bytes, 64 + 2 + 2 + 2 + 8 + 8 + 8)?;
    let object_name = read_name(bytes, 0);
    let memory_object_type = u16_at(bytes, 64);
    let target_descriptor_type =
        DescriptorType::from_u16(u16_at(bytes, 66)).unwrap_or(DescriptorType::Entity);
    let target_descriptor_index = DescriptorIndex(u16_at(bytes, 68));
    let start_address = u64_at(bytes, 70);
    let maximum_length = u64_at(bytes, 78);
    let length = u64_at(bytes, 86);
    Ok((
        MemoryObjectStaticModel {
            memory_object_type,
            target_descriptor_type,
            target_descriptor_index,
            start_address,
            maximum_length,
        },
        MemoryObjectDynamicModel {
            object_name,
            length,
        },
    ))
}

pub fn parse_timing(bytes: &[u8]) -> EnumerationResult<TimingStaticModel> {
    require_len(DescriptorType::Timing, bytes, 2 + 2)?;
    let algorithm = u16_at(bytes, 0);
    let count = u16_at(bytes, 2) as usize;
    let mut ptp_instances = Vec::with_capacity(count);
    let mut offset = 4;
    for _ in 0..count {
        require_len(DescriptorType::Timing, bytes, offset + 2)?;
        ptp_instances.push(DescriptorIndex(u16_at(bytes, offset)));
        offset += 2;
    }
    Ok(TimingStaticModel {
        algorithm,
        ptp_instances,
    })
}

pub fn parse_ptp_instance(bytes: &[u8]) -> EnumerationResult<PtpInstanceStaticModel> {
    require_len(DescriptorType::PtpInstance, bytes, 8 + 2)?;
    Ok(PtpInstanceStaticModel {
        clock_identity: u64_at(bytes, 0),
        number_of_ptp_ports: u16_at(bytes, 8),
    })
}

pub fn parse_ptp_port(bytes: &[u8]) -> EnumerationResult<PtpPortStaticModel> {
    require_len(DescriptorType::PtpPort, bytes, 2 + 1)?;
    Ok(PtpPortStaticModel {
        port_number: u16_at(bytes, 0),
        port_type: bytes[2],
    })
}
