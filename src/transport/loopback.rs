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

//! In-memory `Transport` for tests and virtual entities: every frame sent on
//! one end of a `LoopbackTransport` pair is delivered to the other end's
//! receiver, with no real network involved (spec §4, test harness).

use super::Transport;
use crate::error::{TransportError, TransportResult};
use avdecc_model::ids::MacAddress;
use tokio::sync::{broadcast, mpsc};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};

/// A shared virtual segment. Every `LoopbackTransport` built from the same
/// `LoopbackSegment` behaves as though plugged into the same Ethernet
/// collision domain.
#[derive(Clone)]
pub struct LoopbackSegment {
    bus: broadcast::Sender<(MacAddress, Vec<u8>)>,
}

impl LoopbackSegment {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(1024);
        Self { bus }
    }

    pub fn attach(&self, mac_address: MacAddress) -> LoopbackTransport {
        LoopbackTransport {
            mac_address,
            bus: self.bus.clone(),
        }
    }
}

impl Default for LoopbackSegment {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LoopbackTransport {
    mac_address: MacAddress,
    bus: broadcast::Sender<(MacAddress, Vec<u8>)>,
}

impl Transport for LoopbackTransport {
    fn mac_address(&self) -> MacAddress {
        self.mac_address
    }

    fn send_frame(&self, bytes: &[u8]) -> TransportResult<()> {
        // No receivers is not an error: a transport with nobody listening
        // yet behaves like a real NIC transmitting onto an empty segment.
        self.bus.send((self.mac_address, bytes.to_vec())).ok();
        Ok(())
    }

    fn spawn_receiver(
        self: std::sync::Arc<Self>,
        subsys: &SubsystemHandle,
        sink: mpsc::Sender<Vec<u8>>,
    ) {
        let mut rx = self.bus.subscribe();
        let own_mac = self.mac_address;
        let receive = move |s: SubsystemHandle| async move {
            loop {
                tokio::select! {
                    frame = rx.recv() => {
                        match frame {
                            Ok((sender, bytes)) if sender != own_mac => {
                                if sink.send(bytes).await.is_err() {
                                    break;
                                }
                            }
                            Ok(_) => {}
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    _ = s.on_shutdown_requested() => break,
                }
            }
            Ok::<(), TransportError>(())
        };
        subsys.start(SubsystemBuilder::new("loopback-receiver", receive));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_sent_on_one_end_is_received_on_the_other() {
        let segment = LoopbackSegment::new();
        let a = std::sync::Arc::new(segment.attach(MacAddress([0; 6])));
        let b = std::sync::Arc::new(segment.attach(MacAddress([1; 6])));

        let toplevel = tokio_graceful_shutdown::Toplevel::new(|s| async move {
            let (tx, mut rx) = mpsc::channel(16);
            b.clone().spawn_receiver(&s, tx);
            a.send_frame(&[1, 2, 3]).expect("loopback send never fails");
            let received = rx.recv().await.expect("frame was broadcast");
            assert_eq!(received, vec![1, 2, 3]);
            s.request_shutdown();
            Ok::<(), TransportError>(())
        });
        toplevel
            .handle_shutdown_requests(std::time::Duration::from_millis(500))
            .await
            .expect("subsystem tree shuts down cleanly");
    }

    #[test]
    fn a_transport_never_receives_its_own_frame() {
        let segment = LoopbackSegment::new();
        let transport = segment.attach(MacAddress([2; 6]));
        let mut rx = transport.bus.subscribe();
        transport.send_frame(&[9]).expect("loopback send never fails");
        assert!(rx.try_recv().is_err());
    }
}
