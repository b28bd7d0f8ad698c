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

//! AECP state machine (spec §4.E): per-entity sequence IDs, one retry on
//! timeout, transmit-order response delivery and running response-time
//! statistics. This is the state machine with the most bookkeeping in the
//! stack, so unlike ADP/ACMP its pending commands are swept on a fixed
//! tick rather than one timer task per command.

use crate::codec::aecp::{AecpMessageType, AecpPayload, Aecpdu, AemCommandType};
use crate::error::{AemStatus, ProtocolError, ProtocolResult};
use crate::transport::Transport;
use avdecc_model::ids::EntityID;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};
use tracing::{debug, warn};

/// Up to 63 mappings per `AddAudioMappings`/`RemoveAudioMappings` command
/// (spec §4.E): anything larger is rejected before it's ever transmitted.
pub const MAX_AUDIO_MAPPINGS_PER_COMMAND: usize = 63;

/// True iff `command_type` is a mapping command whose 8-byte header plus
/// 8 bytes per mapping exceeds `MAX_AUDIO_MAPPINGS_PER_COMMAND` entries.
/// Every other AEM command is exempt: its `command_specific_data` isn't a
/// mapping list, so its length has no mapping count to check.
fn exceeds_max_mappings(command_type: &AemCommandType, command_specific_data_len: usize) -> bool {
    let is_mapping_command = matches!(command_type, AemCommandType::AddAudioMappings | AemCommandType::RemoveAudioMappings);
    is_mapping_command
        && command_specific_data_len >= 8
        && (command_specific_data_len - 8) / 8 > MAX_AUDIO_MAPPINGS_PER_COMMAND
}

/// Handles a Vendor-Unique protocol the core codec doesn't interpret
/// (spec §4.E); Milan's `0x001B92` prefix is the common case.
pub trait VendorUniqueDelegate: Send + Sync {
    fn command_timeout(&self) -> Duration;
    fn on_unsolicited(&self, pdu: &Aecpdu);
}

/// Running per-entity AECP health counters (SPEC_FULL.md §5).
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityStatistics {
    pub retry_count: u64,
    pub timeout_count: u64,
    pub unexpected_response_count: u64,
    pub unsolicited_loss_count: u64,
    pub average_response_time: Duration,
    samples: u64,
}

impl EntityStatistics {
    fn record_response_time(&mut self, elapsed: Duration) {
        let total = self.average_response_time.as_nanos() as u64 * self.samples;
        self.samples += 1;
        self.average_response_time =
            Duration::from_nanos((total + elapsed.as_nanos() as u64) / self.samples);
    }
}

enum AecpMessage {
    SendCommand {
        pdu: Aecpdu,
        reply: oneshot::Sender<ProtocolResult<Aecpdu>>,
    },
    FrameReceived {
        pdu: Aecpdu,
    },
    RegisterVendorUniqueDelegate {
        protocol_id: u32,
        delegate: Arc<dyn VendorUniqueDelegate>,
    },
    GetStatistics {
        entity_id: EntityID,
        reply: oneshot::Sender<EntityStatistics>,
    },
}

#[derive(Clone)]
pub struct AecpHandle {
    tx: mpsc::Sender<AecpMessage>,
}

impl AecpHandle {
    pub async fn send_command(&self, pdu: Aecpdu, reply: oneshot::Sender<ProtocolResult<Aecpdu>>) {
        if let Err(e) = self.tx.send(AecpMessage::SendCommand { pdu, reply }).await {
            if let AecpMessage::SendCommand { reply, .. } = e.0 {
                reply.send(Err(ProtocolError::Aborted)).ok();
            }
        }
    }

    pub async fn frame_received(&self, pdu: Aecpdu) {
        self.tx.send(AecpMessage::FrameReceived { pdu }).await.ok();
    }

    pub async fn register_vendor_unique_delegate(
        &self,
        protocol_id: u32,
        delegate: Arc<dyn VendorUniqueDelegate>,
    ) {
        self.tx
            .send(AecpMessage::RegisterVendorUniqueDelegate {
                protocol_id,
                delegate,
            })
            .await
            .ok();
    }

    pub async fn statistics(&self, entity_id: EntityID) -> EntityStatistics {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(AecpMessage::GetStatistics { entity_id, reply })
            .await
            .is_err()
        {
            return EntityStatistics::default();
        }
        rx.await.unwrap_or_default()
    }
}

struct PendingCommand {
    serialized: Vec<u8>,
    reply: Option<oneshot::Sender<ProtocolResult<Aecpdu>>>,
    sent_at: Instant,
    retries_remaining: u8,
    timeout: Duration,
}

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(250);
const DEFAULT_RETRY_BUDGET: u8 = 1;
const SWEEP_INTERVAL: Duration = Duration::from_millis(20);

pub fn start(subsys: &SubsystemHandle, transport: Arc<dyn Transport>) -> AecpHandle {
    let (tx, rx) = mpsc::channel(256);
    let actor = move |s: SubsystemHandle| async move {
        AecpActor {
            subsys: s,
            rx,
            transport,
            next_sequence_id: HashMap::new(),
            expected_unsolicited_seq: HashMap::new(),
            pending: HashMap::new(),
            vendor_unique_delegates: HashMap::new(),
            statistics: HashMap::new(),
        }
        .run()
        .await
    };
    subsys.start(SubsystemBuilder::new("aecp", actor));
    AecpHandle { tx }
}

struct AecpActor {
    subsys: SubsystemHandle,
    rx: mpsc::Receiver<AecpMessage>,
    transport: Arc<dyn Transport>,
    next_sequence_id: HashMap<EntityID, u16>,
    expected_unsolicited_seq: HashMap<EntityID, u16>,
    pending: HashMap<(EntityID, u16), PendingCommand>,
    vendor_unique_delegates: HashMap<u32, Arc<dyn VendorUniqueDelegate>>,
    statistics: HashMap<EntityID, EntityStatistics>,
}

impl AecpActor {
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

    fn handle_message(&mut self, msg: AecpMessage) {
        match msg {
            AecpMessage::SendCommand { pdu, reply } => self.send_command(pdu, reply),
            AecpMessage::FrameReceived { pdu } => self.handle_received_frame(pdu),
            AecpMessage::RegisterVendorUniqueDelegate {
                protocol_id,
                delegate,
            } => {
                self.vendor_unique_delegates.insert(protocol_id, delegate);
            }
            AecpMessage::GetStatistics { entity_id, reply } => {
                reply
                    .send(self.statistics.get(&entity_id).copied().unwrap_or_default())
                    .ok();
            }
        }
    }

    fn send_command(&mut self, mut pdu: Aecpdu, reply: oneshot::Sender<ProtocolResult<Aecpdu>>) {
        if let AecpPayload::Aem {
            command_type,
            command_specific_data,
            ..
        } = &pdu.payload
        {
            if exceeds_max_mappings(command_type, command_specific_data.len()) {
                reply
                    .send(Err(ProtocolError::BadArguments(
                        "more than 63 mappings in a single command".into(),
                    )))
                    .ok();
                return;
            }
        }

        let entity_id = pdu.target_entity_id;
        let sequence_id = self.allocate_sequence_id(entity_id);
        pdu.sequence_id = sequence_id;

        let timeout = self.command_timeout(&pdu);
        let serialized = crate::codec::AvdeccFrame::Aecp(pdu).serialize();

        if let Err(e) = self.transport.send_frame(&serialized) {
            reply.send(Err(e.into())).ok();
            return;
        }

        self.pending.insert(
            (entity_id, sequence_id),
            PendingCommand {
                serialized,
                reply: Some(reply),
                sent_at: Instant::now(),
                retries_remaining: DEFAULT_RETRY_BUDGET,
                timeout,
            },
        );
    }

    fn command_timeout(&self, pdu: &Aecpdu) -> Duration {
        match &pdu.payload {
            AecpPayload::VendorUnique { protocol_id, .. } => self
                .vendor_unique_delegates
                .get(protocol_id)
                .map(|d| d.command_timeout())
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT),
            _ => DEFAULT_COMMAND_TIMEOUT,
        }
    }

    fn allocate_sequence_id(&mut self, entity_id: EntityID) -> u16 {
        let counter = self.next_sequence_id.entry(entity_id).or_insert(0);
        let id = *counter;
        *counter = counter.wrapping_add(1);
        id
    }

    fn handle_received_frame(&mut self, pdu: Aecpdu) {
        if !pdu.message_type.is_response() {
            // We never act as an AEM-command target; fire-and-forget
            // unsolicited delegate dispatch is the only inbound-command
            // path this controller-only stack needs.
            return;
        }

        let key = (pdu.target_entity_id, pdu.sequence_id);
        match self.pending.remove(&key) {
            Some(mut command) => {
                if pdu.status == AemStatus::InProgress {
                    // Reset the timer without consuming the retry budget.
                    command.sent_at = Instant::now();
                    self.pending.insert(key, command);
                    return;
                }
                let elapsed = command.sent_at.elapsed();
                let stats = self.statistics.entry(pdu.target_entity_id).or_default();
                stats.record_response_time(elapsed);
                if let Some(reply) = command.reply {
                    reply.send(Ok(pdu)).ok();
                }
            }
            None => self.handle_unsolicited_or_unexpected(pdu),
        }
    }

    fn handle_unsolicited_or_unexpected(&mut self, pdu: Aecpdu) {
        if let AecpPayload::Aem { unsolicited, .. } = &pdu.payload {
            if *unsolicited {
                self.handle_unsolicited_notification(pdu);
                return;
            }
        }
        let stats = self.statistics.entry(pdu.target_entity_id).or_default();
        stats.unexpected_response_count += 1;
        warn!(
            "unexpected AECP response from {} with sequenceID {}",
            pdu.target_entity_id, pdu.sequence_id
        );
    }

    fn handle_unsolicited_notification(&mut self, pdu: Aecpdu) {
        let expected = self
            .expected_unsolicited_seq
            .entry(pdu.target_entity_id)
            .or_insert(pdu.sequence_id);
        if *expected != pdu.sequence_id {
            let stats = self.statistics.entry(pdu.target_entity_id).or_default();
            stats.unsolicited_loss_count += pdu.sequence_id.wrapping_sub(*expected) as u64;
        }
        *expected = pdu.sequence_id.wrapping_add(1);

        if let AecpPayload::VendorUnique { protocol_id, .. } = &pdu.payload {
            if let Some(delegate) = self.vendor_unique_delegates.get(protocol_id) {
                delegate.on_unsolicited(&pdu);
            }
        }
    }

    fn sweep_pending(&mut self) {
        let now = Instant::now();
        let expired: Vec<(EntityID, u16)> = self
            .pending
            .iter()
            .filter(|(_, cmd)| now.duration_since(cmd.sent_at) >= cmd.timeout)
            .map(|(key, _)| *key)
            .collect();

        for key in expired {
            let Some(mut command) = self.pending.remove(&key) else {
                continue;
            };
            let stats = self.statistics.entry(key.0).or_default();
            if command.retries_remaining > 0 {
                command.retries_remaining -= 1;
                stats.retry_count += 1;
                command.sent_at = now;
                if let Err(e) = self.transport.send_frame(&command.serialized) {
                    debug!("AECP retry send failed: {e}");
                }
                self.pending.insert(key, command);
            } else {
                stats.timeout_count += 1;
                if let Some(reply) = command.reply {
                    reply.send(Err(ProtocolError::Timeout)).ok();
                }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixty_three_mappings_is_the_documented_maximum() {
        let len = 8 + 63 * 8;
        assert!(!exceeds_max_mappings(&AemCommandType::AddAudioMappings, len));
    }

    #[test]
    fn sixty_four_mappings_is_rejected() {
        let len = 8 + 64 * 8;
        assert!(exceeds_max_mappings(&AemCommandType::AddAudioMappings, len));
        assert!(exceeds_max_mappings(&AemCommandType::RemoveAudioMappings, len));
    }

    #[test]
    fn non_mapping_command_is_never_rejected_regardless_of_size() {
        let len = 8 + 64 * 8;
        assert!(!exceeds_max_mappings(&AemCommandType::WriteDescriptor, len));
        assert!(!exceeds_max_mappings(&AemCommandType::SetStreamInfo, len));
    }
}
