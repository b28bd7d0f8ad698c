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

//! The 14-byte Ethernet II header every AVTP frame carries, plus the
//! AVTPDU common subtype/sv/version byte (spec §4.A, §6.1).

use crate::error::{CodecError, CodecResult};
use avdecc_model::ids::MacAddress;

pub const ETHERTYPE_AVTP: u16 = 0x22f0;
pub const MIN_ETHERNET_FRAME_LEN: usize = 64;
pub const ETHERNET_HEADER_LEN: usize = 14;

pub const ADP_SUBTYPE: u8 = 0xfa;
pub const AECP_SUBTYPE: u8 = 0xfb;
pub const ACMP_SUBTYPE: u8 = 0xfc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddress,
    pub source: MacAddress,
}

impl EthernetHeader {
    pub fn parse(bytes: &[u8]) -> CodecResult<(Self, u16)> {
        if bytes.len() < ETHERNET_HEADER_LEN {
            return Err(CodecError::IncompleteFrame {
                needed: ETHERNET_HEADER_LEN,
                got: bytes.len(),
            });
        }
        let destination = MacAddress([bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]]);
        let source = MacAddress([bytes[6], bytes[7], bytes[8], bytes[9], bytes[10], bytes[11]]);
        let ethertype = u16::from_be_bytes([bytes[12], bytes[13]]);
        Ok((Self { destination, source }, ethertype))
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.destination.0);
        out.extend_from_slice(&self.source.0);
        out.extend_from_slice(&ETHERTYPE_AVTP.to_be_bytes());
    }
}

/// Pads `frame` with trailing zero bytes up to the minimum Ethernet frame
/// length, as required by serialization (spec §4.A).
pub fn pad_to_minimum_frame(frame: &mut Vec<u8>) {
    if frame.len() < MIN_ETHERNET_FRAME_LEN {
        frame.resize(MIN_ETHERNET_FRAME_LEN, 0);
    }
}

/// Reads the AVTP subtype byte at offset 14, without consuming the rest of
/// the frame; used by the Protocol Interface to route a received frame to
/// the right sub-protocol decoder.
pub fn peek_subtype(bytes: &[u8]) -> CodecResult<u8> {
    if bytes.len() <= ETHERNET_HEADER_LEN {
        return Err(CodecError::IncompleteFrame {
            needed: ETHERNET_HEADER_LEN + 1,
            got: bytes.len(),
        });
    }
    Ok(bytes[ETHERNET_HEADER_LEN])
}
