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

//! Dispatch pipeline feeding ADP sightings into enumeration and ACMP
//! sightings into the registry's live connection state (spec §4.J), and
//! fanning both out to client-registered `ControllerEventObserver`s.
//!
//! `AdpObserver`/`AcmpSightingObserver` are synchronous callbacks invoked
//! from inside the protocol state machines, so the enumeration walk (which
//! issues AECP commands and awaits replies) is handed off to its own task
//! rather than run inline. Client notifications for that walk's outcome are
//! dispatched from the same task, once enumeration completes.
//!
//! Every ADP/ACMP sighting that can change a channel-connection or
//! media-clock-chain resolution (entity online/offline/enumerated, stream
//! connect/disconnect) triggers a recomputation sweep over the affected
//! entity; `ReactiveCache` remembers the last resolved value per
//! `(entity, descriptor)` so client observers only see a change notification
//! when the resolved value actually differs (spec §4.J.1, §4.J.2).

use crate::channel_resolver;
use crate::clock_resolver;
use crate::compatibility::{CompatibilityFlag, CompatibilityFlags};
use crate::events::ControllerEventObserver;
use crate::identify;
use crate::registry::ControllerRegistry;
use avdecc_core::codec::acmp::{Acmpdu, AcmpMessageType};
use avdecc_core::codec::adp::Adpdu;
use avdecc_core::local_entity::LocalEntity;
use avdecc_core::state_machines::acmp::AcmpSightingObserver;
use avdecc_core::state_machines::adp::AdpObserver;
use avdecc_enumeration::EnumerationScheduler;
use avdecc_model::channel::ChannelConnections;
use avdecc_model::clock::MediaClockChain;
use avdecc_model::connection::{ConnectionState, StreamInputConnectionInfo};
use avdecc_model::ids::{DescriptorIndex, EntityID, StreamIdentification};
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Last resolved value per `(entity, descriptor)`, so a recomputation sweep
/// can tell whether a resolver's output actually changed before notifying.
#[derive(Default)]
struct ReactiveCache {
    channels: DashMap<(EntityID, DescriptorIndex), ChannelConnections>,
    clocks: DashMap<(EntityID, DescriptorIndex), MediaClockChain>,
}

impl ReactiveCache {
    fn channel_changed(&self, entity_id: EntityID, stream_index: DescriptorIndex, connections: &ChannelConnections) -> bool {
        let key = (entity_id, stream_index);
        let changed = self.channels.get(&key).map_or(true, |cached| &*cached != connections);
        if changed {
            self.channels.insert(key, connections.clone());
        }
        changed
    }

    fn clock_chain_changed(&self, entity_id: EntityID, domain_index: DescriptorIndex, chain: &MediaClockChain) -> bool {
        let key = (entity_id, domain_index);
        let changed = self.clocks.get(&key).map_or(true, |cached| &*cached != chain);
        if changed {
            self.clocks.insert(key, chain.clone());
        }
        changed
    }

    fn forget_entity(&self, entity_id: EntityID) {
        self.channels.retain(|(id, _), _| *id != entity_id);
        self.clocks.retain(|(id, _), _| *id != entity_id);
    }
}

/// IEEE 1722.1 status code 0: `SUCCESS`, shared by every status field across
/// ADP/AECP/ACMP.
const STATUS_SUCCESS: u8 = 0;

type ObserverList = RwLock<Vec<Arc<dyn ControllerEventObserver>>>;

fn notify(observers: &ObserverList, f: impl Fn(&dyn ControllerEventObserver)) {
    let observers = observers.read().expect("observer list lock never poisoned");
    for observer in observers.iter() {
        f(observer.as_ref());
    }
}

/// Re-resolves every channel connection and media clock chain on every
/// currently-loaded entity, notifying only the ones whose resolved value
/// changed. Used when an event (an entity going offline, an entity finishing
/// enumeration) could have changed what other entities resolve to, not just
/// the entity the event is about.
fn recompute_all(registry: &ControllerRegistry, reactive: &ReactiveCache, observers: &ObserverList) {
    for entity_id in registry.loaded_entity_ids() {
        recompute_entity(registry, reactive, observers, entity_id);
    }
}

fn recompute_entity(registry: &ControllerRegistry, reactive: &ReactiveCache, observers: &ObserverList, entity_id: EntityID) {
    let (stream_indices, domain_indices) = {
        let Some(guard) = registry.get(entity_id) else { return };
        if !guard.is_loaded() {
            return;
        }
        let Some(entity) = guard.entity.as_ref() else { return };
        let Some(configuration) = entity.active_configuration() else { return };
        (
            channel_resolver::canonical_listener_streams(configuration),
            configuration.clock_domains.keys().copied().collect::<Vec<_>>(),
        )
    };

    for stream_index in stream_indices {
        recompute_channel(registry, reactive, observers, entity_id, stream_index);
    }
    for domain_index in domain_indices {
        let chain = clock_resolver::resolve(registry, entity_id, domain_index);
        if reactive.clock_chain_changed(entity_id, domain_index, &chain) {
            notify(observers, |observer| observer.on_media_clock_chain_changed(entity_id, domain_index, &chain));
        }
    }
}

fn recompute_channel(
    registry: &ControllerRegistry,
    reactive: &ReactiveCache,
    observers: &ObserverList,
    entity_id: EntityID,
    stream_index: DescriptorIndex,
) {
    let Some(guard) = registry.get(entity_id) else { return };
    if !guard.is_loaded() {
        return;
    }
    let Some(entity) = guard.entity.as_ref() else { return };
    let Some(configuration) = entity.active_configuration() else { return };

    let connections = channel_resolver::resolve(registry, configuration, stream_index);
    if !reactive.channel_changed(entity_id, stream_index, &connections) {
        return;
    }
    let port_index = channel_resolver::listener_port_index_for(configuration, stream_index);
    let talker_port = channel_resolver::talker_port_index(registry, configuration, stream_index);
    drop(guard);

    notify(observers, |observer| observer.on_channel_input_connection_changed(entity_id, stream_index, &connections));
    if let Some(port_index) = port_index {
        notify(observers, |observer| observer.on_stream_port_input_audio_mappings_changed(entity_id, port_index));
    }
    if let Some((talker_entity_id, talker_port_index)) = talker_port {
        notify(observers, |observer| observer.on_stream_port_output_audio_mappings_changed(talker_entity_id, talker_port_index));
    }
}

/// The observer is constructed before the `LocalEntity` it drives exists
/// (the protocol interface needs an observer to start, and `LocalEntity`
/// wraps the `ProtocolInterfaceApi` that starting it returns), so the
/// handle arrives a moment later via `local_entity_cell`.
pub struct ControllerObserver {
    local_entity: Arc<OnceCell<LocalEntity>>,
    scheduler: Arc<EnumerationScheduler>,
    registry: Arc<ControllerRegistry>,
    observers: Arc<ObserverList>,
    reactive: Arc<ReactiveCache>,
}

impl ControllerObserver {
    pub fn new(
        local_entity: Arc<OnceCell<LocalEntity>>,
        scheduler: Arc<EnumerationScheduler>,
        registry: Arc<ControllerRegistry>,
        observers: Arc<ObserverList>,
    ) -> Self {
        Self { local_entity, scheduler, registry, observers, reactive: Arc::new(ReactiveCache::default()) }
    }

    fn spawn_enumeration(&self, entity_id: avdecc_model::ids::EntityID) {
        let local_entity = Arc::clone(&self.local_entity);
        let scheduler = Arc::clone(&self.scheduler);
        let registry = Arc::clone(&self.registry);
        let observers = Arc::clone(&self.observers);
        let reactive = Arc::clone(&self.reactive);
        tokio::spawn(async move {
            let Some(local_entity) = local_entity.get() else {
                warn!(entity = %entity_id, "sighted before local entity handle was ready, dropping");
                return;
            };
            match scheduler.enumerate(local_entity, entity_id).await {
                Ok(outcome) => {
                    let mut compatibility = CompatibilityFlags::baseline();
                    if outcome.misbehaving {
                        compatibility.insert(CompatibilityFlag::Misbehaving);
                    }
                    if let Some(configuration) = outcome.entity.active_configuration() {
                        let resolution = identify::resolve(
                            configuration,
                            outcome
                                .entity
                                .static_model
                                .identify_control_index
                                .unwrap_or(avdecc_model::ids::DescriptorIndex::INVALID),
                        );
                        if resolution.is_non_17221() {
                            compatibility.downgrade_ieee17221();
                        }
                        registry.set_identify(entity_id, resolution);
                    }
                    registry.mark_loaded(entity_id, outcome.entity, compatibility);
                    debug!(entity = %entity_id, used_cache = outcome.used_cache, "enumeration complete");
                    notify(&observers, |observer| observer.on_entity_enumerated(entity_id, None));
                    // This entity loading can also be what a different
                    // entity's stream connection or clock source was waiting
                    // on, so the sweep isn't limited to `entity_id` itself.
                    recompute_all(&registry, &reactive, &observers);
                }
                Err(err) => {
                    warn!(entity = %entity_id, error = %err, "enumeration failed");
                    registry.mark_incomplete(entity_id);
                    let message = err.to_string();
                    notify(&observers, |observer| observer.on_entity_enumerated(entity_id, Some(&message)));
                }
            }
        });
    }
}

impl AdpObserver for ControllerObserver {
    fn on_entity_available(&self, adpdu: &Adpdu) {
        let is_new = self.registry.entity_online(adpdu.entity_id, adpdu.interface_index);
        if is_new {
            notify(&self.observers, |observer| observer.on_entity_online(adpdu.entity_id));
            self.spawn_enumeration(adpdu.entity_id);
        }
    }

    fn on_entity_departing(&self, entity_id: avdecc_model::ids::EntityID) {
        if self.registry.entity_departing(entity_id).is_some() {
            debug!(entity = %entity_id, "entity departed");
            self.reactive.forget_entity(entity_id);
            notify(&self.observers, |observer| observer.on_entity_offline(entity_id));
            recompute_all(&self.registry, &self.reactive, &self.observers);
        }
    }

    fn on_entity_updated(&self, adpdu: &Adpdu) {
        debug!(entity = %adpdu.entity_id, available_index = adpdu.available_index, "entity re-advertised, re-enumerating");
        notify(&self.observers, |observer| observer.on_entity_updated(adpdu.entity_id));
        self.spawn_enumeration(adpdu.entity_id);
    }
}

impl AcmpSightingObserver for ControllerObserver {
    fn on_connect_response_sniffed(&self, pdu: &Acmpdu) {
        if pdu.status != STATUS_SUCCESS {
            return;
        }
        self.registry.set_stream_connection(
            pdu.listener_entity_id,
            pdu.listener_stream_index(),
            Some(StreamInputConnectionInfo {
                talker_stream: StreamIdentification::new(pdu.talker_entity_id, pdu.talker_stream_index()),
                state: ConnectionState::Connected,
            }),
        );
        notify(&self.observers, |observer| {
            observer.on_controller_connect_response_sniffed(pdu.talker_entity_id, pdu.listener_entity_id)
        });
        recompute_entity(&self.registry, &self.reactive, &self.observers, pdu.listener_entity_id);
    }

    fn on_disconnect_response_sniffed(&self, pdu: &Acmpdu) {
        if pdu.status != STATUS_SUCCESS {
            return;
        }
        self.registry
            .set_stream_connection(pdu.listener_entity_id, pdu.listener_stream_index(), None);
        notify(&self.observers, |observer| {
            observer.on_controller_disconnect_response_sniffed(pdu.talker_entity_id, pdu.listener_entity_id)
        });
        recompute_entity(&self.registry, &self.reactive, &self.observers, pdu.listener_entity_id);
    }

    fn on_listener_state_response_sniffed(&self, pdu: &Acmpdu) {
        // GetTxState/GetTxConnection responses describe the talker side and
        // carry no listener identification worth recording here; only
        // GET_RX_STATE reports the listener's own connection state.
        if pdu.status != STATUS_SUCCESS || pdu.message_type != AcmpMessageType::GetRxStateResponse {
            return;
        }
        let info = if pdu.connection_count > 0 {
            Some(StreamInputConnectionInfo {
                talker_stream: StreamIdentification::new(pdu.talker_entity_id, pdu.talker_stream_index()),
                state: ConnectionState::Connected,
            })
        } else {
            None
        };
        self.registry
            .set_stream_connection(pdu.listener_entity_id, pdu.listener_stream_index(), info);
        notify(&self.observers, |observer| {
            observer.on_controller_get_listener_stream_state_response_sniffed(pdu.talker_entity_id, pdu.listener_entity_id)
        });
        recompute_entity(&self.registry, &self.reactive, &self.observers, pdu.listener_entity_id);
    }
}
