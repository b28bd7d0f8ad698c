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

//! Frame codec (spec §4.A): converts byte sequences to and from the three
//! AVDECC PDU families. Every parse function takes a full Ethernet frame
//! (starting at the destination MAC) and every serialize function returns
//! one, padded to the Ethernet minimum.

pub mod acmp;
pub mod adp;
pub mod aecp;
pub mod ethernet;

pub use acmp::Acmpdu;
pub use adp::Adpdu;
pub use aecp::Aecpdu;
pub use ethernet::{peek_subtype, ACMP_SUBTYPE, ADP_SUBTYPE, AECP_SUBTYPE};

/// A decoded AVTP frame, tagged by sub-protocol, as routed by the Protocol
/// Interface's receive path (spec §4.C: "Sub-protocols are selected on
/// receive by AVTP subtype").
#[derive(Debug, Clone, PartialEq)]
pub enum AvdeccFrame {
    Adp(Adpdu),
    Acmp(Acmpdu),
    Aecp(Aecpdu),
}

impl AvdeccFrame {
    pub fn parse(bytes: &[u8]) -> crate::error::CodecResult<Self> {
        let subtype = peek_subtype(bytes)?;
        match subtype {
            ADP_SUBTYPE => Adpdu::parse(bytes).map(AvdeccFrame::Adp),
            ACMP_SUBTYPE => Acmpdu::parse(bytes).map(AvdeccFrame::Acmp),
            AECP_SUBTYPE => Aecpdu::parse(bytes).map(AvdeccFrame::Aecp),
            other => Err(crate::error::CodecError::UnknownSubtype(other)),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            AvdeccFrame::Adp(pdu) => pdu.serialize(),
            AvdeccFrame::Acmp(pdu) => pdu.serialize(),
            AvdeccFrame::Aecp(pdu) => pdu.serialize(),
        }
    }
}
