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

//! Real raw-Ethernet `Transport`, built on `pnet`'s datalink layer (spec
//! §4.B). AVDECC runs directly on EtherType `0x22f0`, with no IP layer
//! underneath, so unlike the AES67 sockets this stack's sibling code opens,
//! there's no `socket2`/`UdpSocket` to hand off to: the frame has to be
//! written and read at the link layer.

use super::Transport;
use crate::error::{TransportError, TransportResult};
use avdecc_model::ids::MacAddress;
use pnet::datalink::{self, Channel, Config, NetworkInterface};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};

pub fn find_interface_with_name(name: &str) -> TransportResult<NetworkInterface> {
    datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| TransportError::NoSuchInterface(name.to_owned()))
}

pub struct PacketTransport {
    mac_address: MacAddress,
    sender: Mutex<Box<dyn datalink::DataLinkSender>>,
    receiver: Mutex<Option<Box<dyn datalink::DataLinkReceiver>>>,
}

impl PacketTransport {
    pub fn open(iface: &NetworkInterface) -> TransportResult<Self> {
        let mac_address = iface
            .mac
            .map(|m| MacAddress(m.octets()))
            .ok_or_else(|| TransportError::NoSuchInterface(iface.name.clone()))?;

        let (tx, rx) = match datalink::channel(iface, Config::default()) {
            Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
            Ok(_) => {
                return Err(TransportError::NoSuchInterface(format!(
                    "{}: unsupported channel type",
                    iface.name
                )));
            }
            Err(e) => return Err(TransportError::Io(e)),
        };

        Ok(Self {
            mac_address,
            sender: Mutex::new(tx),
            receiver: Mutex::new(Some(rx)),
        })
    }
}

impl Transport for PacketTransport {
    fn mac_address(&self) -> MacAddress {
        self.mac_address
    }

    fn send_frame(&self, bytes: &[u8]) -> TransportResult<()> {
        let mut sender = self.sender.lock().expect("sender mutex never poisoned");
        match sender.send_to(bytes, None) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(TransportError::Io(e)),
            None => Err(TransportError::Io(std::io::Error::other(
                "datalink sender buffer exhausted",
            ))),
        }
    }

    fn spawn_receiver(self: Arc<Self>, subsys: &SubsystemHandle, sink: mpsc::Sender<Vec<u8>>) {
        let receiver = self
            .receiver
            .lock()
            .expect("receiver mutex never poisoned")
            .take();
        let Some(mut receiver) = receiver else {
            return;
        };

        // pnet's DataLinkReceiver blocks the calling thread on every read,
        // so it can't live on the async executor: a dedicated OS thread
        // bridges it into the subsystem tree via a bounded channel, the
        // same way the rest of this stack hands blocking I/O to tokio.
        let (raw_tx, mut raw_rx) = mpsc::channel::<Vec<u8>>(256);
        std::thread::Builder::new()
            .name("avdecc-pnet-rx".to_owned())
            .spawn(move || {
                loop {
                    match receiver.next() {
                        Ok(frame) => {
                            if raw_tx.blocking_send(frame.to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            })
            .ok();

        let forward = move |s: SubsystemHandle| async move {
            loop {
                tokio::select! {
                    frame = raw_rx.recv() => {
                        match frame {
                            Some(bytes) => {
                                if sink.send(bytes).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    _ = s.on_shutdown_requested() => break,
                }
            }
            Ok::<(), TransportError>(())
        };
        subsys.start(SubsystemBuilder::new("pnet-receiver", forward));
    }
}
