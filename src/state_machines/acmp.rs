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

//! ACMP state machine (spec §4.F): correlates commands this controller
//! issued with their response, and separately sniffs every multicast ACMP
//! frame on the segment regardless of who sent it, since ACMP connections
//! are established by the talker/listener pair directly and a controller
//! only learns about them by listening in.

use crate::codec::acmp::Acmpdu;
use crate::error::ProtocolError;
use crate::transport::Transport;
use avdecc_model::ids::EntityID;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};
use tracing::debug;

/// Observer for ACMP traffic sniffed off the wire, independent of whether
/// this controller issued the command (spec §4.F).
pub trait AcmpSightingObserver: Send + Sync {
    fn on_connect_response_sniffed(&self, pdu: &Acmpdu);
    fn on_disconnect_response_sniffed(&self, pdu: &Acmpdu);
    fn on_listener_state_response_sniffed(&self, pdu: &Acmpdu);
}

const COMMAND_TIMEOUT: Duration = Duration::from_millis(250);
const RETRY_BUDGET: u8 = 1;
const SWEEP_INTERVAL: Duration = Duration::from_millis(20);

enum AcmpMessage {
    SendCommand {
        pdu: Acmpdu,
        reply: oneshot::Sender<Result<Acmpdu, ProtocolError>>,
    },
    FrameReceived {
        pdu: Acmpdu,
    },
}

#[derive(Clone)]
pub struct AcmpHandle {
    tx: mpsc::Sender<AcmpMessage>,
}

impl AcmpHandle {
    pub async fn send_command(
        &self,
        pdu: Acmpdu,
        reply: oneshot::Sender<Result<Acmpdu, ProtocolError>>,
    ) {
        if let Err(e) = self.tx.send(AcmpMessage::SendCommand { pdu, reply }).await {
            if let AcmpMessage::SendCommand { reply, .. } = e.0 {
                reply.send(Err(ProtocolError::Aborted)).ok();
            }
        }
    }

    pub async fn frame_received(&self, pdu: Acmpdu) {
        self.tx.send(AcmpMessage::FrameReceived { pdu }).await.ok();
    }
}

struct PendingCommand {
    serialized: Vec<u8>,
    reply: Option<oneshot::Sender<Result<Acmpdu, ProtocolError>>>,
    sent_at: Instant,
    retries_remaining: u8,
}

pub fn start(
    subsys: &SubsystemHandle,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn AcmpSightingObserver>,
) -> AcmpHandle {
    let (tx, rx) = mpsc::channel(256);
    let actor = move |s: SubsystemHandle| async move {
        AcmpActor {
            subsys: s,
            rx,
            transport,
            observer,
            pending: HashMap::new(),
        }
        .run()
        .await
    };
    subsys.start(SubsystemBuilder::new("acmp", actor));
    AcmpHandle { tx }
}

struct AcmpActor {
    subsys: SubsystemHandle,
    rx: mpsc::Receiver<AcmpMessage>,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn AcmpSightingObserver>,
    pending: HashMap<(EntityID, u16), PendingCommand>,
}

impl AcmpActor {
    async fn run(mut self) -> Result<(), crate::error::TransportError> {
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                Some(msg) = self.rx.recv() => self.handle_message(msg),
                _ = sweep.tick() => self.sweep_pending(),
                _ = self.subsys.on_shutdown_requested() => {
                    self.abort_all_pending();
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_message(&mut self, msg: AcmpMessage) {
        match msg {
            AcmpMessage::SendCommand { pdu, reply } => self.send_command(pdu, reply),
            AcmpMessage::FrameReceived { pdu } => self.handle_received_frame(pdu),
        }
    }

    fn send_command(&mut self, pdu: Acmpdu, reply: oneshot::Sender<Result<Acmpdu, ProtocolError>>) {
        // The command targets whichever entity the correlating response
        // will come from: Rx commands correlate on the listener, Tx
        // commands on the talker.
        let correlating_entity = correlating_entity_id(&pdu);
        let serialized = crate::codec::AvdeccFrame::Acmp(pdu).serialize();

        if let Err(e) = self.transport.send_frame(&serialized) {
            reply.send(Err(e.into())).ok();
            return;
        }

        self.pending.insert(
            (correlating_entity, pdu.sequence_id),
            PendingCommand {
                serialized,
                reply: Some(reply),
                sent_at: Instant::now(),
                retries_remaining: RETRY_BUDGET,
            },
        );
    }

    fn handle_received_frame(&mut self, pdu: Acmpdu) {
        self.dispatch_sniffed(&pdu);

        if !pdu.message_type.is_response() {
            return;
        }
        let correlating_entity = correlating_entity_id(&pdu);
        if let Some(command) = self.pending.remove(&(correlating_entity, pdu.sequence_id)) {
            if let Some(reply) = command.reply {
                reply.send(Ok(pdu)).ok();
            }
        }
    }

    fn dispatch_sniffed(&self, pdu: &Acmpdu) {
        use crate::codec::acmp::AcmpMessageType::*;
        match pdu.message_type {
            ConnectRxResponse | ConnectTxResponse => self.observer.on_connect_response_sniffed(pdu),
            DisconnectRxResponse | DisconnectTxResponse => {
                self.observer.on_disconnect_response_sniffed(pdu)
            }
            GetRxStateResponse | GetTxStateResponse | GetTxConnectionResponse => {
                self.observer.on_listener_state_response_sniffed(pdu)
            }
            _ => {}
        }
    }

    fn sweep_pending(&mut self) {
        let now = Instant::now();
        let expired: Vec<(EntityID, u16)> = self
            .pending
            .iter()
            .filter(|(_, cmd)| now.duration_since(cmd.sent_at) >= COMMAND_TIMEOUT)
            .map(|(key, _)| *key)
            .collect();

        for key in expired {
            let Some(mut command) = self.pending.remove(&key) else {
                continue;
            };
            if command.retries_remaining > 0 {
                command.retries_remaining -= 1;
                command.sent_at = now;
                if let Err(e) = self.transport.send_frame(&command.serialized) {
                    debug!("ACMP retry send failed: {e}");
                }
                self.pending.insert(key, command);
            } else if let Some(reply) = command.reply {
                reply.send(Err(ProtocolError::Timeout)).ok();
            }
        }
    }

    fn abort_all_pending(&mut self) {
        for (_, mut command) in self.pending.drain() {
            if let Some(reply) = command.reply.take() {
                reply.send(Err(ProtocolError::Aborted)).ok();
            }
        }
    }
}

fn correlating_entity_id(pdu: &Acmpdu) -> EntityID {
    use crate::codec::acmp::AcmpMessageType::*;
    match pdu.message_type {
        ConnectRxCommand | ConnectRxResponse | DisconnectRxCommand | DisconnectRxResponse
        | GetRxStateCommand | GetRxStateResponse => pdu.listener_entity_id,
        ConnectTxCommand | ConnectTxResponse | DisconnectTxCommand | DisconnectTxResponse
        | GetTxStateCommand | GetTxStateResponse | GetTxConnectionCommand
        | GetTxConnectionResponse => pdu.talker_entity_id,
    }
}
