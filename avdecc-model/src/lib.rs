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

//! The IEEE 1722.1 (AVDECC) entity model: identifiers, the descriptor tree,
//! connection and media-clock state, and the visitor/checksum/persistence
//! machinery built on top of it. Nothing in this crate touches the network;
//! it is the shared vocabulary `avdecc-core`, `avdecc-enumeration` and
//! `avdecc-controller` all build on.

pub mod channel;
pub mod checksum;
pub mod clock;
pub mod connection;
pub mod control_values;
pub mod descriptor;
pub mod error;
pub mod ids;
pub mod persistence;
pub mod visitor;

pub use error::{ModelError, ModelResult};
