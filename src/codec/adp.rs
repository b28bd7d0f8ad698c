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

//! ADPDU: the 56-byte AVDECC Discovery Protocol payload (spec §6.1).

use super::ethernet::{pad_to_minimum_frame, EthernetHeader, ADP_SUBTYPE};
use crate::error::{CodecError, CodecResult};
use avdecc_model::ids::{DescriptorIndex, EntityID, MacAddress};

/// The `controlDataLength` value an ADPDU carries on the wire (spec §6.1).
pub const ADP_CONTROL_DATA_LENGTH: u16 = 56;
/// Bytes from `entityID` (offset 18) through `associationID` (offset 76),
/// i.e. everything the common 4-byte subtype/messageType/controlDataLength
/// header doesn't already cover.
const ADP_FIELDS_LEN: usize = 58;
/// Total ADPDU bytes, subtype through associationID (offsets 14..76).
pub const ADPDU_PAYLOAD_LEN: usize = 4 + ADP_FIELDS_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdpMessageType {
    EntityAvailable,
    EntityDeparting,
    EntityDiscover,
}

impl AdpMessageType {
    fn from_nibble(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(Self::EntityAvailable),
            1 => Ok(Self::EntityDeparting),
            2 => Ok(Self::EntityDiscover),
            other => Err(CodecError::UnknownSubtype(other)),
        }
    }

    fn as_nibble(self) -> u8 {
        match self {
            Self::EntityAvailable => 0,
            Self::EntityDeparting => 1,
            Self::EntityDiscover => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adpdu {
    pub destination: MacAddress,
    pub source: MacAddress,
    pub message_type: AdpMessageType,
    pub valid_time: u8,
    pub entity_id: EntityID,
    pub entity_model_id: u64,
    pub entity_capabilities: u32,
    pub talker_stream_sources: u16,
    pub talker_capabilities: u16,
    pub listener_stream_sinks: u16,
    pub listener_capabilities: u16,
    pub controller_capabilities: u32,
    pub available_index: u32,
    pub gptp_grandmaster_id: u64,
    pub gptp_domain_number: u8,
    pub identify_control_index: DescriptorIndex,
    pub interface_index: u16,
    pub association_id: u64,
}

impl Adpdu {
    pub fn parse(bytes: &[u8]) -> CodecResult<Self> {
        let (header, _ethertype) = EthernetHeader::parse(bytes)?;
        let body = &bytes[14..];
        if body.len() < 2 {
            return Err(CodecError::IncompleteFrame { needed: 16, got: bytes.len() });
        }
        if body[0] != ADP_SUBTYPE {
            return Err(CodecError::UnknownSubtype(body[0]));
        }
        let message_type = AdpMessageType::from_nibble(body[1] >> 4)?;
        let valid_time = body[1] & 0x0f;
        let control_data_length = u16::from_be_bytes([body[2], body[3]]) as usize;
        if body.len() < ADPDU_PAYLOAD_LEN {
            return Err(CodecError::PayloadTooShort {
                declared: control_data_length,
                got: body.len().saturating_sub(4),
            });
        }
        let p = &body[4..];
        let u64_at = |off: usize| u64::from_be_bytes(p[off..off + 8].try_into().expect("8-byte slice"));
        let u32_at = |off: usize| u32::from_be_bytes(p[off..off + 4].try_into().expect("4-byte slice"));
        let u16_at = |off: usize| u16::from_be_bytes(p[off..off + 2].try_into().expect("2-byte slice"));

        Ok(Self {
            destination: header.destination,
            source: header.source,
            message_type,
            valid_time,
            entity_id: EntityID(u64_at(0)),
            entity_model_id: u64_at(8),
            entity_capabilities: u32_at(16),
            talker_stream_sources: u16_at(20),
            talker_capabilities: u16_at(22),
            listener_stream_sinks: u16_at(24),
            listener_capabilities: u16_at(26),
            controller_capabilities: u32_at(28),
            available_index: u32_at(32),
            gptp_grandmaster_id: u64_at(36),
            gptp_domain_number: p[44],
            identify_control_index: DescriptorIndex(u16_at(46)),
            interface_index: u16_at(48),
            association_id: u64_at(50),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_FRAME_RESERVE);
        let header = EthernetHeader {
            destination: self.destination,
            source: self.source,
        };
        header.write(&mut out);
        out.push(ADP_SUBTYPE);
        out.push((self.message_type.as_nibble() << 4) | (self.valid_time & 0x0f));
        out.extend_from_slice(&ADP_CONTROL_DATA_LENGTH.to_be_bytes());
        out.extend_from_slice(&self.entity_id.0.to_be_bytes());
        out.extend_from_slice(&self.entity_model_id.to_be_bytes());
        out.extend_from_slice(&self.entity_capabilities.to_be_bytes());
        out.extend_from_slice(&self.talker_stream_sources.to_be_bytes());
        out.extend_from_slice(&self.talker_capabilities.to_be_bytes());
        out.extend_from_slice(&self.listener_stream_sinks.to_be_bytes());
        out.extend_from_slice(&self.listener_capabilities.to_be_bytes());
        out.extend_from_slice(&self.controller_capabilities.to_be_bytes());
        out.extend_from_slice(&self.available_index.to_be_bytes());
        out.extend_from_slice(&self.gptp_grandmaster_id.to_be_bytes());
        out.push(self.gptp_domain_number);
        out.push(0); // reserved
        out.extend_from_slice(&self.identify_control_index.0.to_be_bytes());
        out.extend_from_slice(&self.interface_index.to_be_bytes());
        out.extend_from_slice(&self.association_id.to_be_bytes());
        pad_to_minimum_frame(&mut out);
        out
    }
}

const MIN_FRAME_RESERVE: usize = 14 + 4 + ADPDU_PAYLOAD_LEN;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Adpdu {
        Adpdu {
            destination: MacAddress::AVDECC_MULTICAST,
            source: MacAddress([0x00, 0x1b, 0x92, 0x11, 0x22, 0x33]),
            message_type: AdpMessageType::EntityAvailable,
            valid_time: 10,
            entity_id: EntityID(0x001b92ffff000001),
            entity_model_id: 0x001b9200_00000001,
            entity_capabilities: 0x0000_0008,
            talker_stream_sources: 2,
            talker_capabilities: 0x4001,
            listener_stream_sinks: 2,
            listener_capabilities: 0x4001,
            controller_capabilities: 0x0000_0001,
            available_index: 42,
            gptp_grandmaster_id: 0x001b92fffe000001,
            gptp_domain_number: 0,
            identify_control_index: DescriptorIndex(3),
            interface_index: 0,
            association_id: 0,
        }
    }

    #[test]
    fn round_trips_through_parse_and_serialize() -> CodecResult<()> {
        let pdu = sample();
        let bytes = pdu.serialize();
        let parsed = Adpdu::parse(&bytes)?;
        assert_eq!(parsed, pdu);
        Ok(())
    }

    #[test]
    fn serialized_frame_meets_minimum_ethernet_length() {
        let bytes = sample().serialize();
        assert!(bytes.len() >= super::super::ethernet::MIN_ETHERNET_FRAME_LEN);
    }

    #[test]
    fn truncated_frame_is_incomplete_not_panicking() {
        let bytes = sample().serialize();
        let truncated = &bytes[..20];
        assert!(matches!(Adpdu::parse(truncated), Err(CodecError::PayloadTooShort { .. })));
    }

    #[test]
    fn unknown_subtype_is_rejected() {
        let mut bytes = sample().serialize();
        bytes[14] = 0x99;
        assert!(matches!(Adpdu::parse(&bytes), Err(CodecError::UnknownSubtype(0x99))));
    }
}
