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

//! The Protocol Interface (spec §4.C): one executor per network interface,
//! owning the raw `Transport` and fanning received frames out to the three
//! sub-protocol state machines by AVTP subtype. Callers talk to it through
//! the cloneable [`ProtocolInterfaceApi`] handle; the actor behind it is
//! `ProtocolInterfaceActor`, mirroring this stack's usual
//! api-handle/mpsc/actor split.

use crate::codec::{AvdeccFrame, ACMP_SUBTYPE, ADP_SUBTYPE, AECP_SUBTYPE};
use crate::codec::{Acmpdu, Adpdu, Aecpdu};
use crate::error::{ProtocolError, ProtocolResult};
use crate::state_machines::acmp::{AcmpHandle, AcmpSightingObserver};
use crate::state_machines::adp::{AdpHandle, AdpObserver};
use crate::state_machines::aecp::{AecpHandle, EntityStatistics, VendorUniqueDelegate};
use crate::transport::Transport;
use avdecc_model::ids::{EntityID, MacAddress};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};
use tracing::{debug, warn};

enum ProtocolInterfaceMessage {
    SendAdp {
        pdu: Adpdu,
        tx: oneshot::Sender<ProtocolResult<()>>,
    },
    SendAcmp {
        pdu: Acmpdu,
        tx: oneshot::Sender<ProtocolResult<()>>,
    },
    SendAecp {
        pdu: Aecpdu,
        tx: oneshot::Sender<ProtocolResult<()>>,
    },
    SendAecpCommand {
        pdu: Aecpdu,
        tx: oneshot::Sender<ProtocolResult<Aecpdu>>,
    },
    SendAcmpCommand {
        pdu: Acmpdu,
        tx: oneshot::Sender<ProtocolResult<Acmpdu>>,
    },
    DiscoverRemoteEntities {
        entity_id: Option<EntityID>,
    },
    RegisterVendorUniqueDelegate {
        protocol_id: u32,
        delegate: Arc<dyn VendorUniqueDelegate>,
    },
    GetStatistics {
        entity_id: EntityID,
        tx: oneshot::Sender<EntityStatistics>,
    },
}

/// Cloneable, cheaply-shareable handle to a running Protocol Interface.
#[derive(Clone)]
pub struct ProtocolInterfaceApi {
    tx: mpsc::Sender<ProtocolInterfaceMessage>,
    mac_address: MacAddress,
}

impl ProtocolInterfaceApi {
    pub fn mac_address(&self) -> MacAddress {
        self.mac_address
    }

    pub async fn send_adp_message(&self, pdu: Adpdu) -> ProtocolResult<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ProtocolInterfaceMessage::SendAdp { pdu, tx })
            .await
            .map_err(|_| ProtocolError::Aborted)?;
        rx.await.map_err(|_| ProtocolError::Aborted)?
    }

    pub async fn send_acmp_message(&self, pdu: Acmpdu) -> ProtocolResult<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ProtocolInterfaceMessage::SendAcmp { pdu, tx })
            .await
            .map_err(|_| ProtocolError::Aborted)?;
        rx.await.map_err(|_| ProtocolError::Aborted)?
    }

    pub async fn send_aecp_message(&self, pdu: Aecpdu) -> ProtocolResult<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ProtocolInterfaceMessage::SendAecp { pdu, tx })
            .await
            .map_err(|_| ProtocolError::Aborted)?;
        rx.await.map_err(|_| ProtocolError::Aborted)?
    }

    /// Sends an AECP command and waits for the correlated response,
    /// including the state machine's own retry/timeout handling
    /// (spec §4.E).
    pub async fn send_aecp_command(&self, pdu: Aecpdu) -> ProtocolResult<Aecpdu> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ProtocolInterfaceMessage::SendAecpCommand { pdu, tx })
            .await
            .map_err(|_| ProtocolError::Aborted)?;
        rx.await.map_err(|_| ProtocolError::Aborted)?
    }

    /// Sends an ACMP command and waits for the correlated response
    /// (spec §4.F).
    pub async fn send_acmp_command(&self, pdu: Acmpdu) -> ProtocolResult<Acmpdu> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ProtocolInterfaceMessage::SendAcmpCommand { pdu, tx })
            .await
            .map_err(|_| ProtocolError::Aborted)?;
        rx.await.map_err(|_| ProtocolError::Aborted)?
    }

    pub async fn discover_remote_entities(&self, entity_id: Option<EntityID>) {
        self.tx
            .send(ProtocolInterfaceMessage::DiscoverRemoteEntities { entity_id })
            .await
            .ok();
    }

    /// Running AECP health counters for `entity_id` (spec §5).
    pub async fn statistics(&self, entity_id: EntityID) -> EntityStatistics {
        let (tx, rx) = oneshot::channel();
        if self
            .tx
            .send(ProtocolInterfaceMessage::GetStatistics { entity_id, tx })
            .await
            .is_err()
        {
            return EntityStatistics::default();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn register_vendor_unique_delegate(
        &self,
        protocol_id: u32,
        delegate: Arc<dyn VendorUniqueDelegate>,
    ) {
        self.tx
            .send(ProtocolInterfaceMessage::RegisterVendorUniqueDelegate {
                protocol_id,
                delegate,
            })
            .await
            .ok();
    }
}

struct ProtocolInterfaceActor {
    subsys: SubsystemHandle,
    api_rx: mpsc::Receiver<ProtocolInterfaceMessage>,
    transport: Arc<dyn Transport>,
    adp: AdpHandle,
    acmp: AcmpHandle,
    aecp: AecpHandle,
}

/// Starts a Protocol Interface on `transport`, running as a named subsystem
/// under `subsys`. `discovery_interval` is forwarded to the ADP state
/// machine for its periodic `EntityDiscover` sweep.
pub fn start_protocol_interface(
    subsys: &SubsystemHandle,
    executor_name: String,
    transport: Arc<dyn Transport>,
    discovery_interval: std::time::Duration,
    adp_observer: Arc<dyn AdpObserver>,
    acmp_observer: Arc<dyn AcmpSightingObserver>,
) -> ProtocolInterfaceApi {
    let mac_address = transport.mac_address();
    let (api_tx, api_rx) = mpsc::channel(1024);

    let (raw_tx, raw_rx) = mpsc::channel(1024);
    transport.clone().spawn_receiver(subsys, raw_tx);

    let adp = crate::state_machines::adp::start(
        subsys,
        transport.clone(),
        mac_address,
        discovery_interval,
        adp_observer,
    );
    let acmp = crate::state_machines::acmp::start(subsys, transport.clone(), acmp_observer);
    let aecp = crate::state_machines::aecp::start(subsys, transport.clone());

    let name = executor_name.clone();
    let actor = move |s: SubsystemHandle| {
        let transport = transport.clone();
        let adp = adp.clone();
        let acmp = acmp.clone();
        let aecp = aecp.clone();
        async move {
            ProtocolInterfaceActor {
                subsys: s,
                api_rx,
                transport,
                adp,
                acmp,
                aecp,
            }
            .run(raw_rx)
            .await
        }
    };
    subsys.start(SubsystemBuilder::new(name, actor));

    ProtocolInterfaceApi {
        tx: api_tx,
        mac_address,
    }
}

impl ProtocolInterfaceActor {
    async fn run(mut self, mut raw_rx: mpsc::Receiver<Vec<u8>>) -> ProtocolResult<()> {
        loop {
            tokio::select! {
                Some(msg) = self.api_rx.recv() => self.handle_api_message(msg).await,
                Some(frame) = raw_rx.recv() => self.dispatch_received_frame(&frame).await,
                _ = self.subsys.on_shutdown_requested() => break,
                else => break,
            }
        }
        Ok(())
    }

    async fn handle_api_message(&mut self, msg: ProtocolInterfaceMessage) {
        match msg {
            ProtocolInterfaceMessage::SendAdp { pdu, tx } => {
                tx.send(self.send_raw(&AvdeccFrame::Adp(pdu))).ok();
            }
            ProtocolInterfaceMessage::SendAcmp { pdu, tx } => {
                tx.send(self.send_raw(&AvdeccFrame::Acmp(pdu))).ok();
            }
            ProtocolInterfaceMessage::SendAecp { pdu, tx } => {
                tx.send(self.send_raw(&AvdeccFrame::Aecp(pdu))).ok();
            }
            ProtocolInterfaceMessage::SendAecpCommand { pdu, tx } => {
                self.aecp.send_command(pdu, tx).await;
            }
            ProtocolInterfaceMessage::SendAcmpCommand { pdu, tx } => {
                self.acmp.send_command(pdu, tx).await;
            }
            ProtocolInterfaceMessage::DiscoverRemoteEntities { entity_id } => {
                self.adp.discover(entity_id).await;
            }
            ProtocolInterfaceMessage::RegisterVendorUniqueDelegate {
                protocol_id,
                delegate,
            } => {
                self.aecp
                    .register_vendor_unique_delegate(protocol_id, delegate)
                    .await;
            }
            ProtocolInterfaceMessage::GetStatistics { entity_id, tx } => {
                tx.send(self.aecp.statistics(entity_id).await).ok();
            }
        }
    }

    fn send_raw(&self, frame: &AvdeccFrame) -> ProtocolResult<()> {
        self.transport.send_frame(&frame.serialize())?;
        Ok(())
    }

    async fn dispatch_received_frame(&mut self, bytes: &[u8]) {
        let subtype = match crate::codec::peek_subtype(bytes) {
            Ok(s) => s,
            Err(e) => {
                debug!("dropping unparsable frame: {e}");
                return;
            }
        };
        match subtype {
            ADP_SUBTYPE => match Adpdu::parse(bytes) {
                Ok(pdu) => self.adp.frame_received(pdu).await,
                Err(e) => debug!("dropping malformed ADPDU: {e}"),
            },
            ACMP_SUBTYPE => match Acmpdu::parse(bytes) {
                Ok(pdu) => self.acmp.frame_received(pdu).await,
                Err(e) => debug!("dropping malformed ACMPDU: {e}"),
            },
            AECP_SUBTYPE => match Aecpdu::parse(bytes) {
                Ok(pdu) => self.aecp.frame_received(pdu).await,
                Err(e) => debug!("dropping malformed AECPDU: {e}"),
            },
            other => warn!("dropping frame with unhandled AVTP subtype {other:#04x}"),
        }
    }
}
