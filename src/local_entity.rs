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

//! The Local Entity (spec §4.G): a typed controller-role facade over the
//! Protocol Interface. Every method here assembles one AEM command,
//! round-trips it through [`ProtocolInterfaceApi::send_aecp_command`], and
//! decodes the response's `commandSpecificData` into a typed result.

use crate::codec::aecp::{AecpMessageType, AecpPayload, AemCommandType, Aecpdu};
use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol_interface::ProtocolInterfaceApi;
use crate::state_machines::aecp::MAX_AUDIO_MAPPINGS_PER_COMMAND;
use avdecc_model::ids::{AudioMapping, DescriptorIndex, DescriptorType, EntityID, MacAddress};
use std::sync::atomic::{AtomicU16, Ordering};

/// The per-connection sequence counter AEM commands carry on the wire is
/// assigned by the AECP state machine; `LocalEntity` only needs its own
/// monotonically increasing `AcquireEntity`/`LockEntity` flags handled at
/// the call site, and a stable controller identity to stamp every command.
pub struct LocalEntity {
    protocol_interface: ProtocolInterfaceApi,
    controller_entity_id: EntityID,
    mac_address: MacAddress,
    /// A purely local id-recycling counter used only to give distinct Rust
    /// call sites distinguishable trace spans; it never appears on the wire.
    call_counter: AtomicU16,
}

/// `GetStreamInfo`'s decoded response (subset of the wire fields this
/// controller actually consumes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub stream_format: u64,
    pub flags: u32,
}

impl LocalEntity {
    pub fn new(
        protocol_interface: ProtocolInterfaceApi,
        controller_entity_id: EntityID,
    ) -> Self {
        let mac_address = protocol_interface.mac_address();
        Self {
            protocol_interface,
            controller_entity_id,
            mac_address,
            call_counter: AtomicU16::new(0),
        }
    }

    fn next_call_id(&self) -> u16 {
        self.call_counter.fetch_add(1, Ordering::Relaxed)
    }

    fn command_frame(
        &self,
        target_entity_id: EntityID,
        command_type: AemCommandType,
        command_specific_data: Vec<u8>,
    ) -> Aecpdu {
        Aecpdu {
            destination: MacAddress::AVDECC_MULTICAST,
            source: self.mac_address,
            message_type: AecpMessageType::AemCommand,
            status: crate::error::AemStatus::Success,
            target_entity_id,
            controller_entity_id: self.controller_entity_id,
            sequence_id: self.next_call_id(),
            payload: AecpPayload::Aem {
                unsolicited: false,
                command_type,
                command_specific_data,
            },
        }
    }

    async fn send(
        &self,
        target_entity_id: EntityID,
        command_type: AemCommandType,
        command_specific_data: Vec<u8>,
    ) -> ProtocolResult<Aecpdu> {
        let pdu = self.command_frame(target_entity_id, command_type, command_specific_data);
        let response = self.protocol_interface.send_aecp_command(pdu).await?;
        if response.status.is_error() {
            return Err(ProtocolError::AemStatus(response.status));
        }
        Ok(response)
    }

    fn command_specific_data(response: &Aecpdu) -> &[u8] {
        match &response.payload {
            AecpPayload::Aem { command_specific_data, .. } => command_specific_data,
            _ => &[],
        }
    }

    pub async fn acquire_entity(&self, entity_id: EntityID, flags: u32) -> ProtocolResult<()> {
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&flags.to_be_bytes());
        data.extend_from_slice(&entity_id.0.to_be_bytes());
        self.send(entity_id, AemCommandType::AcquireEntity, data).await?;
        Ok(())
    }

    pub async fn release_entity(&self, entity_id: EntityID, flags: u32) -> ProtocolResult<()> {
        let mut data = Vec::with_capacity(12);
        // Bit 0 (RELEASE) distinguishes a release from an acquire on the
        // same command type (spec §6.3).
        data.extend_from_slice(&(flags | 0x8000_0000).to_be_bytes());
        data.extend_from_slice(&entity_id.0.to_be_bytes());
        self.send(entity_id, AemCommandType::AcquireEntity, data).await?;
        Ok(())
    }

    /// Subscribes the controller to unsolicited AEM responses from
    /// `entity_id` (spec §4.E, §4.I step 4): the entity will push
    /// `GetName`/`GetStreamInfo`/etc. responses on state changes without a
    /// matching command.
    pub async fn register_unsolicited_notifications(&self, entity_id: EntityID) -> ProtocolResult<()> {
        self.send(entity_id, AemCommandType::RegisterUnsolicitedNotifications, Vec::new())
            .await?;
        Ok(())
    }

    pub async fn read_descriptor(
        &self,
        entity_id: EntityID,
        configuration_index: DescriptorIndex,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
    ) -> ProtocolResult<Vec<u8>> {
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&configuration_index.0.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&(descriptor_type as u16).to_be_bytes());
        data.extend_from_slice(&descriptor_index.0.to_be_bytes());
        let response = self.send(entity_id, AemCommandType::ReadDescriptor, data).await?;
        Ok(Self::command_specific_data(&response).to_vec())
    }

    pub async fn set_stream_format(
        &self,
        entity_id: EntityID,
        stream_index: DescriptorIndex,
        descriptor_type: DescriptorType,
        stream_format: u64,
    ) -> ProtocolResult<()> {
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&(descriptor_type as u16).to_be_bytes());
        data.extend_from_slice(&stream_index.0.to_be_bytes());
        data.extend_from_slice(&stream_format.to_be_bytes());
        self.send(entity_id, AemCommandType::SetStreamFormat, data).await?;
        Ok(())
    }

    pub async fn get_stream_info(
        &self,
        entity_id: EntityID,
        stream_index: DescriptorIndex,
        descriptor_type: DescriptorType,
    ) -> ProtocolResult<StreamInfo> {
        let mut data = Vec::with_capacity(4);
        data.extend_from_slice(&(descriptor_type as u16).to_be_bytes());
        data.extend_from_slice(&stream_index.0.to_be_bytes());
        let response = self.send(entity_id, AemCommandType::GetStreamInfo, data).await?;
        let body = Self::command_specific_data(&response);
        if body.len() < 16 {
            return Err(ProtocolError::BadArguments(
                "GetStreamInfo response shorter than expected".into(),
            ));
        }
        Ok(StreamInfo {
            flags: u32::from_be_bytes(body[4..8].try_into().expect("4-byte slice")),
            stream_format: u64::from_be_bytes(body[8..16].try_into().expect("8-byte slice")),
        })
    }

    pub async fn set_sampling_rate(
        &self,
        entity_id: EntityID,
        unit_index: DescriptorIndex,
        descriptor_type: DescriptorType,
        sampling_rate: u32,
    ) -> ProtocolResult<()> {
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&(descriptor_type as u16).to_be_bytes());
        data.extend_from_slice(&unit_index.0.to_be_bytes());
        data.extend_from_slice(&sampling_rate.to_be_bytes());
        self.send(entity_id, AemCommandType::SetSamplingRate, data).await?;
        Ok(())
    }

    pub async fn get_sampling_rate(
        &self,
        entity_id: EntityID,
        unit_index: DescriptorIndex,
        descriptor_type: DescriptorType,
    ) -> ProtocolResult<u32> {
        let mut data = Vec::with_capacity(4);
        data.extend_from_slice(&(descriptor_type as u16).to_be_bytes());
        data.extend_from_slice(&unit_index.0.to_be_bytes());
        let response = self.send(entity_id, AemCommandType::GetSamplingRate, data).await?;
        let body = Self::command_specific_data(&response);
        if body.len() < 8 {
            return Err(ProtocolError::BadArguments(
                "GetSamplingRate response shorter than expected".into(),
            ));
        }
        Ok(u32::from_be_bytes(body[4..8].try_into().expect("4-byte slice")))
    }

    pub async fn get_clock_source(
        &self,
        entity_id: EntityID,
        clock_domain_index: DescriptorIndex,
    ) -> ProtocolResult<DescriptorIndex> {
        let mut data = Vec::with_capacity(4);
        data.extend_from_slice(&(DescriptorType::ClockDomain as u16).to_be_bytes());
        data.extend_from_slice(&clock_domain_index.0.to_be_bytes());
        let response = self.send(entity_id, AemCommandType::GetClockSource, data).await?;
        let body = Self::command_specific_data(&response);
        if body.len() < 6 {
            return Err(ProtocolError::BadArguments(
                "GetClockSource response shorter than expected".into(),
            ));
        }
        Ok(DescriptorIndex(u16::from_be_bytes(
            body[4..6].try_into().expect("2-byte slice"),
        )))
    }

    pub async fn set_clock_source(
        &self,
        entity_id: EntityID,
        clock_domain_index: DescriptorIndex,
        clock_source_index: DescriptorIndex,
    ) -> ProtocolResult<()> {
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&(DescriptorType::ClockDomain as u16).to_be_bytes());
        data.extend_from_slice(&clock_domain_index.0.to_be_bytes());
        data.extend_from_slice(&clock_source_index.0.to_be_bytes());
        data.extend_from_slice(&[0, 0]);
        self.send(entity_id, AemCommandType::SetClockSource, data).await?;
        Ok(())
    }

    pub async fn get_counters(
        &self,
        entity_id: EntityID,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
    ) -> ProtocolResult<Vec<u8>> {
        let mut data = Vec::with_capacity(4);
        data.extend_from_slice(&(descriptor_type as u16).to_be_bytes());
        data.extend_from_slice(&descriptor_index.0.to_be_bytes());
        let response = self.send(entity_id, AemCommandType::GetCounters, data).await?;
        Ok(Self::command_specific_data(&response).to_vec())
    }

    pub async fn get_name(
        &self,
        entity_id: EntityID,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        name_index: u16,
        configuration_index: DescriptorIndex,
    ) -> ProtocolResult<String> {
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&(descriptor_type as u16).to_be_bytes());
        data.extend_from_slice(&descriptor_index.0.to_be_bytes());
        data.extend_from_slice(&name_index.to_be_bytes());
        data.extend_from_slice(&configuration_index.0.to_be_bytes());
        let response = self.send(entity_id, AemCommandType::GetName, data).await?;
        let body = Self::command_specific_data(&response);
        let name_bytes = body.get(8..8 + 64).unwrap_or(&[]);
        let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
        Ok(String::from_utf8_lossy(&name_bytes[..end]).into_owned())
    }

    pub async fn set_name(
        &self,
        entity_id: EntityID,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
        name_index: u16,
        configuration_index: DescriptorIndex,
        name: &str,
    ) -> ProtocolResult<()> {
        let mut data = Vec::with_capacity(72);
        data.extend_from_slice(&(descriptor_type as u16).to_be_bytes());
        data.extend_from_slice(&descriptor_index.0.to_be_bytes());
        data.extend_from_slice(&name_index.to_be_bytes());
        data.extend_from_slice(&configuration_index.0.to_be_bytes());
        let mut padded_name = [0u8; 64];
        let bytes = name.as_bytes();
        let len = bytes.len().min(63);
        padded_name[..len].copy_from_slice(&bytes[..len]);
        data.extend_from_slice(&padded_name);
        self.send(entity_id, AemCommandType::SetName, data).await?;
        Ok(())
    }

    pub async fn get_max_transit_time(
        &self,
        entity_id: EntityID,
        stream_index: DescriptorIndex,
    ) -> ProtocolResult<u32> {
        let mut data = Vec::with_capacity(4);
        data.extend_from_slice(&(DescriptorType::StreamOutput as u16).to_be_bytes());
        data.extend_from_slice(&stream_index.0.to_be_bytes());
        let response = self.send(entity_id, AemCommandType::GetMaxTransitTime, data).await?;
        let body = Self::command_specific_data(&response);
        if body.len() < 8 {
            return Err(ProtocolError::BadArguments(
                "GetMaxTransitTime response shorter than expected".into(),
            ));
        }
        Ok(u32::from_be_bytes(body[4..8].try_into().expect("4-byte slice")))
    }

    pub async fn set_max_transit_time(
        &self,
        entity_id: EntityID,
        stream_index: DescriptorIndex,
        max_transit_time_ns: u32,
    ) -> ProtocolResult<()> {
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&(DescriptorType::StreamOutput as u16).to_be_bytes());
        data.extend_from_slice(&stream_index.0.to_be_bytes());
        data.extend_from_slice(&max_transit_time_ns.to_be_bytes());
        self.send(entity_id, AemCommandType::SetMaxTransitTime, data).await?;
        Ok(())
    }

    async fn add_or_remove_audio_mappings(
        &self,
        entity_id: EntityID,
        descriptor_type: DescriptorType,
        stream_port_index: DescriptorIndex,
        mappings: &[AudioMapping],
        command_type: AemCommandType,
    ) -> ProtocolResult<()> {
        if mappings.len() > MAX_AUDIO_MAPPINGS_PER_COMMAND {
            return Err(ProtocolError::BadArguments(format!(
                "{} mappings exceeds the {} allowed per command",
                mappings.len(),
                MAX_AUDIO_MAPPINGS_PER_COMMAND
            )));
        }
        let mut data = Vec::with_capacity(8 + mappings.len() * 8);
        data.extend_from_slice(&(descriptor_type as u16).to_be_bytes());
        data.extend_from_slice(&stream_port_index.0.to_be_bytes());
        data.extend_from_slice(&(mappings.len() as u16).to_be_bytes());
        data.extend_from_slice(&[0, 0]);
        for mapping in mappings {
            data.extend_from_slice(&mapping.stream_index.0.to_be_bytes());
            data.extend_from_slice(&mapping.stream_channel.to_be_bytes());
            data.extend_from_slice(&mapping.cluster_offset.to_be_bytes());
            data.extend_from_slice(&mapping.cluster_channel.to_be_bytes());
        }
        self.send(entity_id, command_type, data).await?;
        Ok(())
    }

    pub async fn add_stream_port_input_audio_mappings(
        &self,
        entity_id: EntityID,
        stream_port_index: DescriptorIndex,
        mappings: &[AudioMapping],
    ) -> ProtocolResult<()> {
        self.add_or_remove_audio_mappings(
            entity_id,
            DescriptorType::StreamPortInput,
            stream_port_index,
            mappings,
            AemCommandType::AddAudioMappings,
        )
        .await
    }

    pub async fn add_stream_port_output_audio_mappings(
        &self,
        entity_id: EntityID,
        stream_port_index: DescriptorIndex,
        mappings: &[AudioMapping],
    ) -> ProtocolResult<()> {
        self.add_or_remove_audio_mappings(
            entity_id,
            DescriptorType::StreamPortOutput,
            stream_port_index,
            mappings,
            AemCommandType::AddAudioMappings,
        )
        .await
    }

    pub async fn remove_stream_port_input_audio_mappings(
        &self,
        entity_id: EntityID,
        stream_port_index: DescriptorIndex,
        mappings: &[AudioMapping],
    ) -> ProtocolResult<()> {
        self.add_or_remove_audio_mappings(
            entity_id,
            DescriptorType::StreamPortInput,
            stream_port_index,
            mappings,
            AemCommandType::RemoveAudioMappings,
        )
        .await
    }

    pub async fn remove_stream_port_output_audio_mappings(
        &self,
        entity_id: EntityID,
        stream_port_index: DescriptorIndex,
        mappings: &[AudioMapping],
    ) -> ProtocolResult<()> {
        self.add_or_remove_audio_mappings(
            entity_id,
            DescriptorType::StreamPortOutput,
            stream_port_index,
            mappings,
            AemCommandType::RemoveAudioMappings,
        )
        .await
    }

    /// Milan's `GET_DYNAMIC_INFO` batched query (spec §4.G, §4.I): folds
    /// several dynamic-state reads that would otherwise be separate AEM
    /// commands into one round trip. The command-specific payload is a
    /// sequence of sub-command TLVs; this stack forwards the caller's
    /// pre-built TLV block as-is rather than modeling every sub-command
    /// Milan defines.
    pub async fn get_dynamic_info(
        &self,
        entity_id: EntityID,
        query_block: Vec<u8>,
    ) -> ProtocolResult<Vec<u8>> {
        let response = self
            .send(entity_id, AemCommandType::GetDynamicInfo, query_block)
            .await?;
        Ok(Self::command_specific_data(&response).to_vec())
    }

    /// Milan's `GET_MILAN_INFO` is a Vendor-Unique (MVU) command, not an
    /// AEM one (spec §4.G); the caller supplies Milan's `0x001B92` prefix
    /// explicitly since this core crate carries no Milan-specific codec.
    pub async fn get_milan_info(
        &self,
        entity_id: EntityID,
        milan_protocol_id: u32,
    ) -> ProtocolResult<Vec<u8>> {
        let pdu = Aecpdu {
            destination: MacAddress::AVDECC_MULTICAST,
            source: self.mac_address,
            message_type: AecpMessageType::VendorUniqueCommand,
            status: crate::error::AemStatus::Success,
            target_entity_id: entity_id,
            controller_entity_id: self.controller_entity_id,
            sequence_id: self.next_call_id(),
            payload: AecpPayload::VendorUnique {
                protocol_id: milan_protocol_id,
                command_specific_data: Vec::new(),
            },
        };
        let response = self.protocol_interface.send_aecp_command(pdu).await?;
        if response.status.is_error() {
            return Err(ProtocolError::AemStatus(response.status));
        }
        match &response.payload {
            AecpPayload::VendorUnique { command_specific_data, .. } => {
                Ok(command_specific_data.clone())
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Running AECP health counters for `entity_id` (spec §5), surfaced
    /// through a controller's `ControlledEntityGuard`.
    pub async fn statistics(&self, entity_id: EntityID) -> crate::state_machines::aecp::EntityStatistics {
        self.protocol_interface.statistics(entity_id).await
    }
}
