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

//! AECPDU: AEM, Address-Access and Vendor-Unique variants (spec §6.3). The
//! common header is fixed; the payload is variable-length and interpreted
//! differently by message type, capped at 512 bytes of AEM command-specific
//! data.

use super::ethernet::{pad_to_minimum_frame, EthernetHeader, AECP_SUBTYPE};
use crate::error::{AemStatus, CodecError, CodecResult};
use avdecc_model::ids::EntityID;

const AECP_COMMON_HEADER_LEN: usize = 4 + 18; // subtype/status/cdl + target/controller/sequenceID
pub const AEM_MAX_COMMAND_SPECIFIC_DATA: usize = 512 - 2; // minus the commandType field

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AecpMessageType {
    AemCommand,
    AemResponse,
    AddressAccessCommand,
    AddressAccessResponse,
    VendorUniqueCommand,
    VendorUniqueResponse,
}

impl AecpMessageType {
    fn from_u8(value: u8) -> CodecResult<Self> {
        use AecpMessageType::*;
        Ok(match value {
            0 => AemCommand,
            1 => AemResponse,
            2 => AddressAccessCommand,
            3 => AddressAccessResponse,
            6 => VendorUniqueCommand,
            7 => VendorUniqueResponse,
            other => return Err(CodecError::UnknownSubtype(other)),
        })
    }

    fn as_u8(self) -> u8 {
        use AecpMessageType::*;
        match self {
            AemCommand => 0,
            AemResponse => 1,
            AddressAccessCommand => 2,
            AddressAccessResponse => 3,
            VendorUniqueCommand => 6,
            VendorUniqueResponse => 7,
        }
    }

    pub fn is_response(self) -> bool {
        use AecpMessageType::*;
        matches!(self, AemResponse | AddressAccessResponse | VendorUniqueResponse)
    }
}

/// The command vocabulary required by the core (spec §6.3, a subset of the
/// full AEM command set); `Other` preserves an unrecognized numeric command
/// type so the frame can still be routed/logged without being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AemCommandType {
    AcquireEntity,
    LockEntity,
    EntityAvailable,
    ControllerAvailable,
    ReadDescriptor,
    WriteDescriptor,
    SetConfiguration,
    GetConfiguration,
    SetStreamFormat,
    GetStreamFormat,
    SetStreamInfo,
    GetStreamInfo,
    SetName,
    GetName,
    SetSamplingRate,
    GetSamplingRate,
    SetClockSource,
    GetClockSource,
    StartStreaming,
    StopStreaming,
    RegisterUnsolicitedNotifications,
    DeregisterUnsolicitedNotifications,
    GetAvbInfo,
    GetCounters,
    AddAudioMappings,
    RemoveAudioMappings,
    GetAudioMap,
    GetMaxTransitTime,
    SetMaxTransitTime,
    GetDynamicInfo,
    Other(u16),
}

impl AemCommandType {
    pub fn from_u16(value: u16) -> Self {
        use AemCommandType::*;
        match value {
            0x0000 => AcquireEntity,
            0x0001 => LockEntity,
            0x0002 => EntityAvailable,
            0x0003 => ControllerAvailable,
            0x0004 => ReadDescriptor,
            0x0005 => WriteDescriptor,
            0x0006 => SetConfiguration,
            0x0007 => GetConfiguration,
            0x0008 => SetStreamFormat,
            0x0009 => GetStreamFormat,
            0x000a => SetStreamInfo,
            0x000b => GetStreamInfo,
            0x000c => SetName,
            0x000d => GetName,
            0x000e => SetSamplingRate,
            0x000f => GetSamplingRate,
            0x0010 => SetClockSource,
            0x0011 => GetClockSource,
            0x0012 => StartStreaming,
            0x0013 => StopStreaming,
            0x0014 => RegisterUnsolicitedNotifications,
            0x0015 => DeregisterUnsolicitedNotifications,
            0x0017 => GetAvbInfo,
            0x001b => GetCounters,
            0x001f => AddAudioMappings,
            0x0020 => RemoveAudioMappings,
            0x0021 => GetAudioMap,
            0x002e => GetMaxTransitTime,
            0x002d => SetMaxTransitTime,
            0x004b => GetDynamicInfo,
            other => Other(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        use AemCommandType::*;
        match self {
            AcquireEntity => 0x0000,
            LockEntity => 0x0001,
            EntityAvailable => 0x0002,
            ControllerAvailable => 0x0003,
            ReadDescriptor => 0x0004,
            WriteDescriptor => 0x0005,
            SetConfiguration => 0x0006,
            GetConfiguration => 0x0007,
            SetStreamFormat => 0x0008,
            GetStreamFormat => 0x0009,
            SetStreamInfo => 0x000a,
            GetStreamInfo => 0x000b,
            SetName => 0x000c,
            GetName => 0x000d,
            SetSamplingRate => 0x000e,
            GetSamplingRate => 0x000f,
            SetClockSource => 0x0010,
            GetClockSource => 0x0011,
            StartStreaming => 0x0012,
            StopStreaming => 0x0013,
            RegisterUnsolicitedNotifications => 0x0014,
            DeregisterUnsolicitedNotifications => 0x0015,
            GetAvbInfo => 0x0017,
            GetCounters => 0x001b,
            AddAudioMappings => 0x001f,
            RemoveAudioMappings => 0x0020,
            GetAudioMap => 0x0021,
            SetMaxTransitTime => 0x002d,
            GetMaxTransitTime => 0x002e,
            GetDynamicInfo => 0x004b,
            Other(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AecpPayload {
    /// `unsolicited` is the high bit of the `commandType` field; it marks
    /// an AEM response pushed without a matching command (spec §4.E).
    Aem {
        unsolicited: bool,
        command_type: AemCommandType,
        command_specific_data: Vec<u8>,
    },
    AddressAccess { command_specific_data: Vec<u8> },
    /// `protocol_id` is the 24-bit Vendor-Unique prefix (Milan MVU uses
    /// `0x001B92`, spec §6.3).
    VendorUnique { protocol_id: u32, command_specific_data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aecpdu {
    pub destination: avdecc_model::ids::MacAddress,
    pub source: avdecc_model::ids::MacAddress,
    pub message_type: AecpMessageType,
    pub status: AemStatus,
    pub target_entity_id: EntityID,
    pub controller_entity_id: EntityID,
    pub sequence_id: u16,
    pub payload: AecpPayload,
}

impl Aecpdu {
    pub fn parse(bytes: &[u8]) -> CodecResult<Self> {
        let (header, _ethertype) = EthernetHeader::parse(bytes)?;
        let body = &bytes[14..];
        if body.len() < AECP_COMMON_HEADER_LEN {
            return Err(CodecError::IncompleteFrame {
                needed: AECP_COMMON_HEADER_LEN,
                got: body.len(),
            });
        }
        if body[0] != AECP_SUBTYPE {
            return Err(CodecError::UnknownSubtype(body[0]));
        }
        let message_type = AecpMessageType::from_u8(body[1] >> 4)?;
        let status_code = body[1] & 0x1f;
        let status = AemStatus::from_u8(status_code)
            .ok_or(CodecError::UnknownStatus(status_code))?;
        let control_data_length = u16::from_be_bytes([body[2], body[3]]) as usize;
        if body.len() < 4 + control_data_length {
            return Err(CodecError::PayloadTooShort {
                declared: control_data_length,
                got: body.len().saturating_sub(4),
            });
        }
        let target_entity_id = EntityID(u64::from_be_bytes(body[4..12].try_into().expect("8 bytes")));
        let controller_entity_id = EntityID(u64::from_be_bytes(body[12..20].try_into().expect("8 bytes")));
        let sequence_id = u16::from_be_bytes([body[20], body[21]]);
        let rest = &body[22..4 + control_data_length];

        let payload = match message_type {
            AecpMessageType::AemCommand | AecpMessageType::AemResponse => {
                if rest.len() < 2 {
                    return Err(CodecError::PayloadTooShort { declared: 2, got: rest.len() });
                }
                let raw = u16::from_be_bytes([rest[0], rest[1]]);
                AecpPayload::Aem {
                    unsolicited: raw & 0x8000 != 0,
                    command_type: AemCommandType::from_u16(raw & 0x7fff),
                    command_specific_data: rest[2..].to_vec(),
                }
            }
            AecpMessageType::AddressAccessCommand | AecpMessageType::AddressAccessResponse => {
                AecpPayload::AddressAccess { command_specific_data: rest.to_vec() }
            }
            AecpMessageType::VendorUniqueCommand | AecpMessageType::VendorUniqueResponse => {
                if rest.len() < 3 {
                    return Err(CodecError::PayloadTooShort { declared: 3, got: rest.len() });
                }
                let protocol_id = u32::from_be_bytes([0, rest[0], rest[1], rest[2]]);
                AecpPayload::VendorUnique {
                    protocol_id,
                    command_specific_data: rest[3..].to_vec(),
                }
            }
        };

        Ok(Self {
            destination: header.destination,
            source: header.source,
            message_type,
            status,
            target_entity_id,
            controller_entity_id,
            sequence_id,
            payload,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut payload_bytes = Vec::new();
        match &self.payload {
            AecpPayload::Aem { unsolicited, command_type, command_specific_data } => {
                let mut raw = command_type.as_u16() & 0x7fff;
                if *unsolicited {
                    raw |= 0x8000;
                }
                payload_bytes.extend_from_slice(&raw.to_be_bytes());
                payload_bytes.extend_from_slice(command_specific_data);
            }
            AecpPayload::AddressAccess { command_specific_data } => {
                payload_bytes.extend_from_slice(command_specific_data);
            }
            AecpPayload::VendorUnique { protocol_id, command_specific_data } => {
                let b = protocol_id.to_be_bytes();
                payload_bytes.extend_from_slice(&b[1..]);
                payload_bytes.extend_from_slice(command_specific_data);
            }
        }

        let control_data_length = 18 + payload_bytes.len();
        let mut out = Vec::with_capacity(14 + 4 + control_data_length);
        let header = EthernetHeader {
            destination: self.destination,
            source: self.source,
        };
        header.write(&mut out);
        out.push(AECP_SUBTYPE);
        out.push((self.message_type.as_u8() << 4) | (self.status.as_u8() & 0x1f));
        out.extend_from_slice(&(control_data_length as u16).to_be_bytes());
        out.extend_from_slice(&self.target_entity_id.0.to_be_bytes());
        out.extend_from_slice(&self.controller_entity_id.0.to_be_bytes());
        out.extend_from_slice(&self.sequence_id.to_be_bytes());
        out.extend_from_slice(&payload_bytes);
        pad_to_minimum_frame(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avdecc_model::ids::MacAddress;

    fn sample_aem() -> Aecpdu {
        Aecpdu {
            destination: MacAddress([0x00, 0x1b, 0x92, 0x11, 0x22, 0x33]),
            source: MacAddress([0x00, 0x1b, 0x92, 0xff, 0xff, 0x01]),
            message_type: AecpMessageType::AemCommand,
            status: AemStatus::Success,
            target_entity_id: EntityID(0x001b92ffff000001),
            controller_entity_id: EntityID(0x001b92ffff000099),
            sequence_id: 5,
            payload: AecpPayload::Aem {
                unsolicited: false,
                command_type: AemCommandType::AcquireEntity,
                command_specific_data: vec![0xde, 0xad, 0xbe, 0xef],
            },
        }
    }

    fn sample_vendor_unique() -> Aecpdu {
        Aecpdu {
            destination: MacAddress([0x00, 0x1b, 0x92, 0x11, 0x22, 0x33]),
            source: MacAddress([0x00, 0x1b, 0x92, 0xff, 0xff, 0x01]),
            message_type: AecpMessageType::VendorUniqueCommand,
            status: AemStatus::Success,
            target_entity_id: EntityID(0x001b92ffff000001),
            controller_entity_id: EntityID(0x001b92ffff000099),
            sequence_id: 9,
            payload: AecpPayload::VendorUnique {
                protocol_id: 0x001b92,
                command_specific_data: vec![0x01],
            },
        }
    }

    #[test]
    fn aem_round_trips_through_parse_and_serialize() -> CodecResult<()> {
        let pdu = sample_aem();
        let bytes = pdu.serialize();
        assert_eq!(Aecpdu::parse(&bytes)?, pdu);
        Ok(())
    }

    #[test]
    fn vendor_unique_round_trips_through_parse_and_serialize() -> CodecResult<()> {
        let pdu = sample_vendor_unique();
        let bytes = pdu.serialize();
        assert_eq!(Aecpdu::parse(&bytes)?, pdu);
        Ok(())
    }

    #[test]
    fn unsolicited_bit_is_preserved() -> CodecResult<()> {
        let mut pdu = sample_aem();
        pdu.message_type = AecpMessageType::AemResponse;
        if let AecpPayload::Aem { unsolicited, .. } = &mut pdu.payload {
            *unsolicited = true;
        }
        let bytes = pdu.serialize();
        let parsed = Aecpdu::parse(&bytes)?;
        match parsed.payload {
            AecpPayload::Aem { unsolicited, .. } => assert!(unsolicited),
            _ => panic!("expected AEM payload"),
        }
        Ok(())
    }
}
