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

//! The `EntityID -> ControlledEntity` registry (spec §4.J, §3.6). `DashMap`
//! gives the reader-writer access pattern spec §5 asks for without a
//! single global lock: a `ControlledEntityGuard` is a live shard read-guard,
//! cheap to re-acquire from inside an observer callback.

use crate::compatibility::CompatibilityFlags;
use crate::identify::IdentifyResolution;
use avdecc_core::state_machines::aecp::EntityStatistics;
use avdecc_model::descriptor::EntityNode;
use avdecc_model::ids::EntityID;
use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlledEntityState {
    /// Online per ADP, enumeration not yet finished.
    Enumerating,
    /// Enumeration finished successfully.
    Loaded,
    /// Enumeration hit a catastrophic failure (spec §4.I); the entity stays
    /// registered so ADP departure still reaches it, but carries no model.
    Incomplete,
}

pub struct ControlledEntity {
    pub entity_id: EntityID,
    pub state: ControlledEntityState,
    pub entity: Option<EntityNode>,
    pub compatibility: CompatibilityFlags,
    pub identify: IdentifyResolution,
    pub statistics: EntityStatistics,
    /// `interfaceIndex` values ADP advertisements have arrived on for this
    /// entity (spec §8 scenario 7: multi-interface redundant advertising).
    pub interfaces: BTreeSet<u16>,
}

impl ControlledEntity {
    fn new(entity_id: EntityID, interface_index: u16) -> Self {
        let mut interfaces = BTreeSet::new();
        interfaces.insert(interface_index);
        Self {
            entity_id,
            state: ControlledEntityState::Enumerating,
            entity: None,
            compatibility: CompatibilityFlags::default(),
            identify: IdentifyResolution::None,
            statistics: EntityStatistics::default(),
            interfaces,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ControlledEntityState::Loaded
    }
}

pub type ControlledEntityGuard<'a> = Ref<'a, EntityID, ControlledEntity>;

#[derive(Default)]
pub struct ControllerRegistry {
    entities: DashMap<EntityID, ControlledEntity>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_id: EntityID) -> Option<ControlledEntityGuard<'_>> {
        self.entities.get(&entity_id)
    }

    pub fn contains(&self, entity_id: EntityID) -> bool {
        self.entities.contains_key(&entity_id)
    }

    /// Registers a newly-seen entity, or records a second interface an
    /// already-known entity advertised on (spec §8 scenario 7). Returns
    /// `true` the first time this `entity_id` is seen.
    pub fn entity_online(&self, entity_id: EntityID, interface_index: u16) -> bool {
        if let Some(mut existing) = self.entities.get_mut(&entity_id) {
            existing.interfaces.insert(interface_index);
            return false;
        }
        self.entities
            .insert(entity_id, ControlledEntity::new(entity_id, interface_index));
        true
    }

    pub fn entity_departing(&self, entity_id: EntityID) -> Option<ControlledEntity> {
        self.entities.remove(&entity_id).map(|(_, entity)| entity)
    }

    pub fn mark_loaded(&self, entity_id: EntityID, entity: EntityNode, compatibility: CompatibilityFlags) {
        if let Some(mut slot) = self.entities.get_mut(&entity_id) {
            slot.entity = Some(entity);
            slot.compatibility = compatibility;
            slot.state = ControlledEntityState::Loaded;
        }
    }

    pub fn mark_incomplete(&self, entity_id: EntityID) {
        if let Some(mut slot) = self.entities.get_mut(&entity_id) {
            slot.state = ControlledEntityState::Incomplete;
        }
    }

    pub fn set_statistics(&self, entity_id: EntityID, statistics: EntityStatistics) {
        if let Some(mut slot) = self.entities.get_mut(&entity_id) {
            slot.statistics = statistics;
        }
    }

    pub fn set_identify(&self, entity_id: EntityID, identify: IdentifyResolution) {
        if let Some(mut slot) = self.entities.get_mut(&entity_id) {
            slot.identify = identify;
        }
    }

    /// Updates a listener stream's connection info in place, for ACMP
    /// sightings the observer snoops off the wire (spec §4.J). A no-op if
    /// the entity or stream isn't in the loaded model.
    pub fn set_stream_connection(
        &self,
        entity_id: EntityID,
        stream_index: avdecc_model::ids::DescriptorIndex,
        info: Option<avdecc_model::connection::StreamInputConnectionInfo>,
    ) {
        if let Some(mut slot) = self.entities.get_mut(&entity_id) {
            if let Some(entity) = slot.entity.as_mut() {
                if let Some(configuration) = entity.active_configuration_mut() {
                    if let Some(stream) = configuration.stream_inputs.get_mut(&stream_index) {
                        stream.dynamic_model.connection_info = info;
                    }
                }
            }
        }
    }

    /// Every currently-loaded entity, for a caller that needs to sweep the
    /// whole registry rather than one entity (spec §4.J.1, §4.J.2: an event
    /// on one entity can change what a different entity resolves to).
    pub fn loaded_entity_ids(&self) -> Vec<EntityID> {
        self.entities.iter().filter(|entry| entry.is_loaded()).map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_advertisement_registers_new_entity() {
        let registry = ControllerRegistry::new();
        assert!(registry.entity_online(EntityID(1), 0));
        assert!(!registry.entity_online(EntityID(1), 1));
        let guard = registry.get(EntityID(1)).expect("registered");
        assert_eq!(guard.interfaces.len(), 2);
    }

    #[test]
    fn departing_entity_is_removed() {
        let registry = ControllerRegistry::new();
        registry.entity_online(EntityID(1), 0);
        assert!(registry.entity_departing(EntityID(1)).is_some());
        assert!(registry.get(EntityID(1)).is_none());
    }
}
