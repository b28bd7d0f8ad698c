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

//! Controller-side state layer (spec §4.J): owns the `ControlledEntity`
//! registry, wires ADP/ACMP sightings into it through `ControllerObserver`,
//! and exposes the media-clock and channel-connection resolvers over it.
//! Client code subscribes to entity-lifecycle and resolver-change
//! notifications through `events::ControllerEventObserver`.

pub mod channel_resolver;
pub mod clock_resolver;
pub mod compatibility;
pub mod error;
pub mod events;
pub mod identify;
pub mod logging;
pub mod observer;
pub mod registry;

pub use compatibility::{CompatibilityFlag, CompatibilityFlags};
pub use error::{ControllerError, ControllerResult};
pub use events::ControllerEventObserver;
pub use identify::IdentifyResolution;
pub use observer::ControllerObserver;
pub use registry::{ControlledEntity, ControlledEntityGuard, ControlledEntityState, ControllerRegistry};

use avdecc_core::local_entity::LocalEntity;
use avdecc_core::state_machines::aecp::EntityStatistics;
use avdecc_core::transport::Transport;
use avdecc_enumeration::EnumerationConfig;
use avdecc_enumeration::EnumerationScheduler;
use avdecc_model::channel::ChannelConnections;
use avdecc_model::clock::MediaClockChain;
use avdecc_model::ids::{DescriptorIndex, EntityID};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_graceful_shutdown::SubsystemHandle;

/// Entry point tying the registry, the observer dispatch pipeline and the
/// protocol interface together into one running controller.
pub struct Controller {
    registry: Arc<ControllerRegistry>,
    local_entity: Arc<OnceCell<LocalEntity>>,
    observers: Arc<RwLock<Vec<Arc<dyn ControllerEventObserver>>>>,
}

impl Controller {
    /// Starts ADP/ACMP/AECP under `subsys` and begins enumerating every
    /// entity sighted from that point on.
    pub fn start(
        subsys: &SubsystemHandle,
        executor_name: String,
        transport: Arc<dyn Transport>,
        discovery_interval: Duration,
        controller_entity_id: EntityID,
        enumeration_config: EnumerationConfig,
    ) -> Self {
        let registry = Arc::new(ControllerRegistry::new());
        let scheduler = Arc::new(EnumerationScheduler::new(enumeration_config));
        let local_entity_cell: Arc<OnceCell<LocalEntity>> = Arc::new(OnceCell::new());
        let observers: Arc<RwLock<Vec<Arc<dyn ControllerEventObserver>>>> = Arc::new(RwLock::new(Vec::new()));

        let observer = Arc::new(ControllerObserver::new(
            Arc::clone(&local_entity_cell),
            Arc::clone(&scheduler),
            Arc::clone(&registry),
            Arc::clone(&observers),
        ));

        let protocol_interface = avdecc_core::protocol_interface::start_protocol_interface(
            subsys,
            executor_name,
            transport,
            discovery_interval,
            observer.clone(),
            observer,
        );
        let local_entity = LocalEntity::new(protocol_interface, controller_entity_id);
        // Nothing can have observed a sighting yet: the protocol interface's
        // subsystems are spawned but haven't run a single poll.
        local_entity_cell
            .set(local_entity)
            .unwrap_or_else(|_| unreachable!("local entity cell set exactly once, here"));

        Self { registry, local_entity: local_entity_cell, observers }
    }

    /// Registers a client observer for entity-lifecycle and resolver-change
    /// notifications (spec §3.6, §4.D, §4.F, §4.J.1, §4.J.2). Dispatched on
    /// the same executor that runs ADP/ACMP/AECP, so observers must not
    /// block.
    pub fn subscribe(&self, observer: Arc<dyn ControllerEventObserver>) {
        self.observers.write().expect("observer list lock never poisoned").push(observer);
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    pub fn local_entity(&self) -> &LocalEntity {
        self.local_entity
            .get()
            .expect("local entity handle set before Controller::start returns")
    }

    pub fn entity(&self, entity_id: EntityID) -> Option<ControlledEntityGuard<'_>> {
        self.registry.get(entity_id)
    }

    pub async fn statistics(&self, entity_id: EntityID) -> EntityStatistics {
        self.local_entity().statistics(entity_id).await
    }

    /// Resolves the media-clock chain for `entity_id`'s clock domain
    /// `domain_index` (spec §4.J.2).
    pub fn media_clock_chain(&self, entity_id: EntityID, domain_index: DescriptorIndex) -> MediaClockChain {
        clock_resolver::resolve(&self.registry, entity_id, domain_index)
    }

    /// Resolves the channel connections for one listener stream — both legs
    /// independently if it's part of a redundant pair (spec §4.J.1, §3.5).
    /// Returns `None` if the entity isn't currently in the loaded model.
    pub fn channel_connections(
        &self,
        listener_entity_id: EntityID,
        listener_stream_index: DescriptorIndex,
    ) -> Option<ChannelConnections> {
        let listener_guard = self.registry.get(listener_entity_id)?;
        let listener_entity = listener_guard.entity.as_ref()?;
        let configuration = listener_entity.active_configuration()?;
        Some(channel_resolver::resolve(&self.registry, configuration, listener_stream_index))
    }
}
