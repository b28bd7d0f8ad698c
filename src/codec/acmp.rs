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

//! ACMPDU: the 44-byte AVDECC Connection Management Protocol payload
//! (spec §6.2).

use super::ethernet::{pad_to_minimum_frame, EthernetHeader, ACMP_SUBTYPE};
use crate::error::{CodecError, CodecResult};
use avdecc_model::ids::{DescriptorIndex, EntityID, MacAddress};

const ACMP_CONTROL_DATA_LENGTH: u16 = 44;
const ACMPDU_PAYLOAD_LEN: usize = 4 + 44;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcmpMessageType {
    ConnectTxCommand,
    ConnectTxResponse,
    DisconnectTxCommand,
    DisconnectTxResponse,
    GetTxStateCommand,
    GetTxStateResponse,
    ConnectRxCommand,
    ConnectRxResponse,
    DisconnectRxCommand,
    DisconnectRxResponse,
    GetRxStateCommand,
    GetRxStateResponse,
    GetTxConnectionCommand,
    GetTxConnectionResponse,
}

impl AcmpMessageType {
    fn from_u8(value: u8) -> CodecResult<Self> {
        use AcmpMessageType::*;
        Ok(match value {
            0 => ConnectTxCommand,
            1 => ConnectTxResponse,
            2 => DisconnectTxCommand,
            3 => DisconnectTxResponse,
            4 => GetTxStateCommand,
            5 => GetTxStateResponse,
            6 => ConnectRxCommand,
            7 => ConnectRxResponse,
            8 => DisconnectRxCommand,
            9 => DisconnectRxResponse,
            10 => GetRxStateCommand,
            11 => GetRxStateResponse,
            12 => GetTxConnectionCommand,
            13 => GetTxConnectionResponse,
            other => return Err(CodecError::UnknownSubtype(other)),
        })
    }

    fn as_u8(self) -> u8 {
        use AcmpMessageType::*;
        match self {
            ConnectTxCommand => 0,
            ConnectTxResponse => 1,
            DisconnectTxCommand => 2,
            DisconnectTxResponse => 3,
            GetTxStateCommand => 4,
            GetTxStateResponse => 5,
            ConnectRxCommand => 6,
            ConnectRxResponse => 7,
            DisconnectRxCommand => 8,
            DisconnectRxResponse => 9,
            GetRxStateCommand => 10,
            GetRxStateResponse => 11,
            GetTxConnectionCommand => 12,
            GetTxConnectionResponse => 13,
        }
    }

    pub fn is_response(self) -> bool {
        self.as_u8() % 2 == 1
    }
}

/// ACMPDU flags bitfield (spec §6.2). Kept as a thin newtype over `u16`
/// rather than pulling in a flags crate, matching the wire's plain bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcmpFlags(u16);

impl AcmpFlags {
    pub const NONE: AcmpFlags = AcmpFlags(0);
    pub const CLASS_B: AcmpFlags = AcmpFlags(1 << 0);
    pub const FAST_CONNECT: AcmpFlags = AcmpFlags(1 << 1);
    pub const SAVED_STATE: AcmpFlags = AcmpFlags(1 << 2);
    pub const STREAMING_WAIT: AcmpFlags = AcmpFlags(1 << 3);
    pub const ENCRYPTED: AcmpFlags = AcmpFlags(1 << 4);
    pub const CLASS_A: AcmpFlags = AcmpFlags(1 << 5);

    pub fn from_bits_truncate(bits: u16) -> Self {
        AcmpFlags(bits)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: AcmpFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AcmpFlags {
    type Output = AcmpFlags;
    fn bitor(self, rhs: AcmpFlags) -> AcmpFlags {
        AcmpFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acmpdu {
    pub destination: MacAddress,
    pub source: MacAddress,
    pub message_type: AcmpMessageType,
    pub status: u8,
    pub stream_id: u64,
    pub controller_entity_id: EntityID,
    pub talker_entity_id: EntityID,
    pub listener_entity_id: EntityID,
    pub talker_unique_id: u16,
    pub listener_unique_id: u16,
    pub stream_dest_address: MacAddress,
    pub connection_count: u16,
    pub sequence_id: u16,
    pub flags: AcmpFlags,
    pub stream_vlan_id: u16,
}

impl Acmpdu {
    pub fn listener_stream_index(&self) -> DescriptorIndex {
        DescriptorIndex(self.listener_unique_id)
    }

    pub fn talker_stream_index(&self) -> DescriptorIndex {
        DescriptorIndex(self.talker_unique_id)
    }

    pub fn parse(bytes: &[u8]) -> CodecResult<Self> {
        let (header, _ethertype) = EthernetHeader::parse(bytes)?;
        let body = &bytes[14..];
        if body.len() < ACMPDU_PAYLOAD_LEN {
            return Err(CodecError::PayloadTooShort {
                declared: ACMP_CONTROL_DATA_LENGTH as usize,
                got: body.len(),
            });
        }
        if body[0] != ACMP_SUBTYPE {
            return Err(CodecError::UnknownSubtype(body[0]));
        }
        let message_type = AcmpMessageType::from_u8(body[1] >> 3)?;
        let status = body[1] & 0x07;
        let p = &body[4..];
        let u64_at = |off: usize| u64::from_be_bytes(p[off..off + 8].try_into().expect("8-byte slice"));
        let u16_at = |off: usize| u16::from_be_bytes(p[off..off + 2].try_into().expect("2-byte slice"));
        let mac_at = |off: usize| MacAddress([p[off], p[off + 1], p[off + 2], p[off + 3], p[off + 4], p[off + 5]]);

        Ok(Self {
            destination: header.destination,
            source: header.source,
            message_type,
            status,
            stream_id: u64_at(0),
            controller_entity_id: EntityID(u64_at(8)),
            talker_entity_id: EntityID(u64_at(16)),
            listener_entity_id: EntityID(u64_at(24)),
            talker_unique_id: u16_at(32),
            listener_unique_id: u16_at(34),
            stream_dest_address: mac_at(36),
            connection_count: u16_at(42),
            sequence_id: u16_at(44),
            flags: AcmpFlags::from_bits_truncate(u16_at(46)),
            stream_vlan_id: u16_at(48),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(14 + ACMPDU_PAYLOAD_LEN);
        let header = EthernetHeader {
            destination: self.destination,
            source: self.source,
        };
        header.write(&mut out);
        out.push(ACMP_SUBTYPE);
        out.push((self.message_type.as_u8() << 3) | (self.status & 0x07));
        out.extend_from_slice(&ACMP_CONTROL_DATA_LENGTH.to_be_bytes());
        out.extend_from_slice(&self.stream_id.to_be_bytes());
        out.extend_from_slice(&self.controller_entity_id.0.to_be_bytes());
        out.extend_from_slice(&self.talker_entity_id.0.to_be_bytes());
        out.extend_from_slice(&self.listener_entity_id.0.to_be_bytes());
        out.extend_from_slice(&self.talker_unique_id.to_be_bytes());
        out.extend_from_slice(&self.listener_unique_id.to_be_bytes());
        out.extend_from_slice(&self.stream_dest_address.0);
        out.extend_from_slice(&self.connection_count.to_be_bytes());
        out.extend_from_slice(&self.sequence_id.to_be_bytes());
        out.extend_from_slice(&self.flags.bits().to_be_bytes());
        out.extend_from_slice(&self.stream_vlan_id.to_be_bytes());
        pad_to_minimum_frame(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Acmpdu {
        Acmpdu {
            destination: MacAddress::AVDECC_MULTICAST,
            source: MacAddress([0x00, 0x1b, 0x92, 0x00, 0x00, 0x02]),
            message_type: AcmpMessageType::ConnectRxCommand,
            status: 0,
            stream_id: 0,
            controller_entity_id: EntityID(0x001b92ffff000099),
            talker_entity_id: EntityID(0x0000000000000002),
            listener_entity_id: EntityID(0x0000000000000001),
            talker_unique_id: 0,
            listener_unique_id: 0,
            stream_dest_address: MacAddress([0x91, 0xe0, 0xf0, 0x00, 0x00, 0x42]),
            connection_count: 0,
            sequence_id: 7,
            flags: AcmpFlags::FAST_CONNECT,
            stream_vlan_id: 0,
        }
    }

    #[test]
    fn round_trips_through_parse_and_serialize() -> CodecResult<()> {
        let pdu = sample();
        let bytes = pdu.serialize();
        assert_eq!(Acmpdu::parse(&bytes)?, pdu);
        Ok(())
    }

    #[test]
    fn response_message_types_are_odd() {
        assert!(AcmpMessageType::ConnectRxResponse.is_response());
        assert!(!AcmpMessageType::ConnectRxCommand.is_response());
    }
}
