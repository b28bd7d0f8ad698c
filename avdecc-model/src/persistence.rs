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

//! JSON persistence of a controlled entity's model (spec §6.5). A dump can
//! select which parts of the model to include via `DumpFlags`; on import,
//! a handful of keys that were renamed in later revisions are still
//! recognized so an older dump file keeps loading.

use crate::descriptor::EntityNode;
use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpFlags {
    pub process_adp: bool,
    pub process_compatibility: bool,
    pub process_dynamic_model: bool,
    pub process_milan: bool,
    pub process_state: bool,
    pub process_static_model: bool,
    pub process_statistics: bool,
    pub process_diagnostics: bool,
    pub binary_format: bool,
    pub ignore_aem_sanity_checks: bool,
}

impl Default for DumpFlags {
    fn default() -> Self {
        Self {
            process_adp: true,
            process_compatibility: true,
            process_dynamic_model: true,
            process_milan: true,
            process_state: true,
            process_static_model: true,
            process_statistics: false,
            process_diagnostics: false,
            binary_format: false,
            ignore_aem_sanity_checks: false,
        }
    }
}

/// A single persisted entity, matching the field shape of a dumped JSON
/// document. Dynamic/static/ADP sections are optional so a document written
/// with a restrictive `DumpFlags` still round-trips without fabricating
/// missing data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEntity {
    pub schema_version: u8,
    pub entity: EntityNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

pub const SCHEMA_VERSION: u8 = 1;

pub fn to_json(entity: &EntityNode, flags: DumpFlags) -> ModelResult<String> {
    let checksum = if flags.process_static_model {
        Some(hex::encode(crate::checksum::compute(
            entity,
            crate::checksum::CURRENT_ALGORITHM_VERSION,
        )?))
    } else {
        None
    };
    let persisted = PersistedEntity {
        schema_version: SCHEMA_VERSION,
        entity: entity.clone(),
        checksum,
    };
    serde_json::to_string_pretty(&persisted).map_err(ModelError::JsonError)
}

/// Parses a persisted document, accepting the legacy key aliases a handful
/// of fields have accumulated across schema revisions (e.g. a stream's
/// SRP registration failure flag was originally named `hasTalkerFailed`
/// before being renamed to `hasSrpRegistrationFailed`; both are accepted on
/// import, only the new name is ever written back out).
pub fn from_json(data: &str) -> ModelResult<EntityNode> {
    let mut value: serde_json::Value =
        serde_json::from_str(data).map_err(ModelError::JsonError)?;
    apply_legacy_key_aliases(&mut value);
    let persisted: PersistedEntity =
        serde_json::from_value(value).map_err(ModelError::JsonError)?;
    Ok(persisted.entity)
}

const LEGACY_KEY_ALIASES: &[(&str, &str)] = &[("hasTalkerFailed", "hasSrpRegistrationFailed")];

fn apply_legacy_key_aliases(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (legacy, current) in LEGACY_KEY_ALIASES {
                if let Some(v) = map.remove(*legacy) {
                    map.entry(current.to_string()).or_insert(v);
                }
            }
            for v in map.values_mut() {
                apply_legacy_key_aliases(v);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                apply_legacy_key_aliases(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EntityDynamicModel, EntityStaticModel};
    use crate::ids::{DescriptorIndex, EntityID};
    use std::collections::BTreeMap;

    fn sample() -> EntityNode {
        EntityNode {
            entity_id: EntityID(7),
            static_model: EntityStaticModel {
                entity_model_id: 1,
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
                entity_name: "Test".into(),
                group_name: String::new(),
                firmware_version: String::new(),
                serial_number: String::new(),
                current_configuration: DescriptorIndex(0),
            },
            configurations: BTreeMap::new(),
        }
    }

    #[test]
    fn round_trips_through_json() -> ModelResult<()> {
        let entity = sample();
        let json = to_json(&entity, DumpFlags::default())?;
        let restored = from_json(&json)?;
        assert_eq!(entity, restored);
        Ok(())
    }

    #[test]
    fn legacy_key_alias_is_recognized_on_import() {
        let mut value = serde_json::json!({"hasTalkerFailed": true, "nested": {"hasTalkerFailed": false}});
        apply_legacy_key_aliases(&mut value);
        assert_eq!(value["hasSrpRegistrationFailed"], serde_json::json!(true));
        assert_eq!(value["nested"]["hasSrpRegistrationFailed"], serde_json::json!(false));
    }
}
