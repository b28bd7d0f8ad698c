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

//! L2 Ethernet transport (spec §4.B). A `Transport` sends raw frames and
//! pushes every received frame to a single receive task; the Protocol
//! Interface is the only consumer. Two implementations are in scope: the
//! real `PacketTransport` (raw Ethernet via `pnet`) and an in-memory
//! `LoopbackTransport` used by tests and virtual entities.

pub mod loopback;
pub mod pnet_transport;

pub use loopback::LoopbackTransport;
pub use pnet_transport::PacketTransport;

use crate::error::TransportResult;
use avdecc_model::ids::MacAddress;
use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

/// `pnet`'s datalink channel is a blocking, synchronous API, so `send_frame`
/// is synchronous too; the Protocol Interface offloads the call onto a
/// blocking thread rather than pulling in an async-trait crate for a single
/// method.
///
/// Receiving is push-based: `spawn_receiver` starts a subsystem that reads
/// frames for as long as the transport lives and forwards each one on
/// `sink`, stopping when the subsystem's shutdown is requested.
pub trait Transport: Send + Sync {
    fn mac_address(&self) -> MacAddress;
    fn send_frame(&self, bytes: &[u8]) -> TransportResult<()>;
    fn spawn_receiver(self: std::sync::Arc<Self>, subsys: &SubsystemHandle, sink: mpsc::Sender<Vec<u8>>);
}
