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

//! Static-tree checksum for the entity-model cache (spec §4.I). Entities are
//! keyed for caching purposes by `(entityModelID, checksum)`; the checksum
//! covers only the static model so a dynamic-only change (a renamed stream,
//! say) doesn't invalidate a cached static tree. The algorithm is versioned
//! so a future revision of the canonical byte layout doesn't silently
//! collide with checksums computed by an older build.
//!
//! Only the static portions of the tree feed the hash: descriptor types,
//! counts and static model fields, walked in the same deterministic
//! (`BTreeMap`-ordered) sequence the entity model itself uses.

use crate::descriptor::*;
use sha2::{Digest, Sha256};

pub const CURRENT_ALGORITHM_VERSION: u8 = 5;
const MIN_SUPPORTED_VERSION: u8 = 1;
const MAX_SUPPORTED_VERSION: u8 = 5;

pub fn is_supported_version(version: u8) -> bool {
    (MIN_SUPPORTED_VERSION..=MAX_SUPPORTED_VERSION).contains(&version)
}

/// Computes the static-model checksum of `entity` under `version`.
///
/// Versions below the current one are supported for verifying
/// previously-persisted caches; they are not expected to produce the same
/// digest as the current version (spec §4.I allows a checksum mismatch on a
/// version bump to simply mean "re-enumerate", not "corrupted").
pub fn compute(entity: &EntityNode, version: u8) -> crate::error::ModelResult<[u8; 32]> {
    if !is_supported_version(version) {
        return Err(crate::error::ModelError::UnsupportedChecksumVersion(version));
    }
    let mut hasher = Sha256::new();
    hasher.update([version]);
    hash_entity(&mut hasher, entity, version);
    Ok(hasher.finalize().into())
}

fn hash_entity(hasher: &mut Sha256, entity: &EntityNode, version: u8) {
    hasher.update(entity.static_model.entity_model_id.to_be_bytes());
    hasher.update(entity.static_model.entity_capabilities.to_be_bytes());
    hasher.update(entity.static_model.talker_stream_sources.to_be_bytes());
    hasher.update(entity.static_model.talker_capabilities.to_be_bytes());
    hasher.update(entity.static_model.listener_stream_sinks.to_be_bytes());
    hasher.update(entity.static_model.listener_capabilities.to_be_bytes());
    hasher.update(entity.static_model.controller_capabilities.to_be_bytes());
    for (index, configuration) in &entity.configurations {
        hasher.update(index.0.to_be_bytes());
        hash_configuration(hasher, configuration, version);
    }
}

fn hash_configuration(hasher: &mut Sha256, configuration: &ConfigurationNode, _version: u8) {
    if let Some(static_model) = &configuration.static_model {
        for (ty, count) in &static_model.descriptor_counts {
            hasher.update((*ty as u16).to_be_bytes());
            hasher.update(count.to_be_bytes());
        }
    }
    for (index, au) in &configuration.audio_units {
        hasher.update(b"AU");
        hasher.update(index.0.to_be_bytes());
        hasher.update(au.static_model.number_of_stream_input_ports.to_be_bytes());
        hasher.update(au.static_model.number_of_stream_output_ports.to_be_bytes());
        for rate in &au.static_model.sampling_rates {
            hasher.update(rate.to_be_bytes());
        }
    }
    for (index, stream) in configuration
        .stream_inputs
        .iter()
        .chain(configuration.stream_outputs.iter())
    {
        hasher.update(b"ST");
        hasher.update(index.0.to_be_bytes());
        for format in &stream.static_model.formats {
            hasher.update(format.to_be_bytes());
        }
        if let Some(partner) = stream.static_model.redundant_partner {
            hasher.update(partner.0.to_be_bytes());
        }
    }
    for (index, clock_domain) in &configuration.clock_domains {
        hasher.update(b"CD");
        hasher.update(index.0.to_be_bytes());
        for source in &clock_domain.static_model.clock_sources {
            hasher.update(source.0.to_be_bytes());
        }
    }
    for (index, control) in &configuration.controls {
        hasher.update(b"CO");
        hasher.update(index.0.to_be_bytes());
        hasher.update(control.static_model.control_type.to_be_bytes());
        hasher.update(control.static_model.control_value_type.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{DescriptorIndex, EntityID};
    use std::collections::BTreeMap;

    fn entity_with_model_id(entity_model_id: u64) -> EntityNode {
        EntityNode {
            entity_id: EntityID(1),
            static_model: EntityStaticModel {
                entity_model_id,
                entity_capabilities: 0,
                talker_stream_sources: 0,
                talker_capabilities: 0,
                listener_stream_sinks: 0,
                listener_capabilities: 0,
                controller_capabilities: 0,
                identify_control_index: None,
                configurations_count: 0,
            },
            dynamic_model: EntityDynamicModel {
                entity_name: "ignored for checksum".into(),
                group_name: String::new(),
                firmware_version: String::new(),
                serial_number: String::new(),
                current_configuration: DescriptorIndex(0),
            },
            configurations: BTreeMap::new(),
        }
    }

    #[test]
    fn identical_static_models_checksum_equal() -> crate::error::ModelResult<()> {
        let a = entity_with_model_id(42);
        let b = entity_with_model_id(42);
        assert_eq!(
            compute(&a, CURRENT_ALGORITHM_VERSION)?,
            compute(&b, CURRENT_ALGORITHM_VERSION)?
        );
        Ok(())
    }

    #[test]
    fn dynamic_only_change_does_not_affect_checksum() -> crate::error::ModelResult<()> {
        let mut a = entity_with_model_id(42);
        let mut b = entity_with_model_id(42);
        a.dynamic_model.entity_name = "Alpha".into();
        b.dynamic_model.entity_name = "Beta".into();
        assert_eq!(
            compute(&a, CURRENT_ALGORITHM_VERSION)?,
            compute(&b, CURRENT_ALGORITHM_VERSION)?
        );
        Ok(())
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let a = entity_with_model_id(42);
        assert!(compute(&a, 0).is_err());
        assert!(compute(&a, 6).is_err());
    }
}
