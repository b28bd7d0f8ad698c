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

//! Protocol stack for an IEEE 1722.1 (AVDECC) controller: the frame codec,
//! the raw-Ethernet transport, the ADP/AECP/ACMP state machines, the
//! Protocol Interface that ties them to a network interface, and the Local
//! Entity facade a controller application talks to.
//!
//! Entity-model enumeration and the controlled-entity registry live one
//! layer up, in the `avdecc-enumeration` and `avdecc-controller` crates.

pub mod codec;
pub mod config;
pub mod error;
pub mod local_entity;
pub mod protocol_interface;
pub mod state_machines;
pub mod transport;

pub use local_entity::LocalEntity;
pub use protocol_interface::{start_protocol_interface, ProtocolInterfaceApi};
