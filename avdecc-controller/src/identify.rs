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

//! Identify-control discovery (spec §4.J.3): resolves the ADP-advertised
//! `identifyControlIndex` against the enumerated entity model.

use avdecc_model::descriptor::ConfigurationNode;
use avdecc_model::ids::DescriptorIndex;

/// The IEEE 1722.1 `IDENTIFY` control type value (`CONTROL_IDENTIFY`).
const CONTROL_TYPE_IDENTIFY: u64 = 0x90e0_f000_0000_0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifyResolution {
    /// Resolved against a Configuration-level Control descriptor at the
    /// advertised index, exactly as the frame claims.
    Configuration(DescriptorIndex),
    /// Resolved against a Jack-level Control descriptor; the wire index is
    /// only unique within its own descriptor type, so this also carries
    /// which jack it lives under.
    Jack(DescriptorIndex),
    /// The advertised index was invalid, but exactly one Configuration-level
    /// `Identify` Control exists; adopted as a fallback, flagged non-17221.
    AdoptedFallback(DescriptorIndex),
    /// No usable Identify control could be resolved.
    None,
}

impl IdentifyResolution {
    /// Per spec §4.J.3/§9 Open Question (a): only the Jack/Configuration
    /// fallback paths are non-17221-but-usable; an index that resolves
    /// inside an AudioUnit is *never* surfaced, with no substitute adopted.
    /// This is preserved verbatim even though it reads as an inconsistency
    /// next to the Jack/Configuration fallback rules.
    pub fn is_non_17221(self) -> bool {
        matches!(self, IdentifyResolution::Jack(_) | IdentifyResolution::AdoptedFallback(_))
    }
}

fn is_identify_control(configuration: &ConfigurationNode, index: DescriptorIndex) -> bool {
    configuration
        .controls
        .get(&index)
        .is_some_and(|control| control.static_model.control_type == CONTROL_TYPE_IDENTIFY)
}

fn jack_identify_control(configuration: &ConfigurationNode, index: DescriptorIndex) -> bool {
    configuration
        .jack_inputs
        .values()
        .chain(configuration.jack_outputs.values())
        .any(|jack| {
            jack.controls
                .get(&index)
                .is_some_and(|control| control.static_model.control_type == CONTROL_TYPE_IDENTIFY)
        })
}

/// Resolves `advertised_index` against `configuration`'s enumerated model.
///
/// Resolution order: Configuration-level Control at that index, then
/// Jack-level Controls at that index. AudioUnit-level Controls are never
/// checked: the original implementation's indexing there is considered a
/// defect in the advertising entity, not an alternative resolution path.
/// If neither matches and the index itself is invalid, but exactly one
/// Configuration-level `Identify` Control exists in the whole configuration,
/// that single control is adopted as a fallback.
pub fn resolve(configuration: &ConfigurationNode, advertised_index: DescriptorIndex) -> IdentifyResolution {
    if advertised_index.is_valid() {
        if is_identify_control(configuration, advertised_index) {
            return IdentifyResolution::Configuration(advertised_index);
        }
        if jack_identify_control(configuration, advertised_index) {
            return IdentifyResolution::Jack(advertised_index);
        }
        return IdentifyResolution::None;
    }

    let mut candidates = configuration
        .controls
        .iter()
        .filter(|(_, control)| control.static_model.control_type == CONTROL_TYPE_IDENTIFY)
        .map(|(index, _)| *index);
    match (candidates.next(), candidates.next()) {
        (Some(only), None) => IdentifyResolution::AdoptedFallback(only),
        _ => IdentifyResolution::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avdecc_model::descriptor::{ControlDynamicModel, ControlNode, ControlStaticModel};

    fn identify_control(index: DescriptorIndex) -> ControlNode {
        ControlNode {
            index,
            static_model: ControlStaticModel {
                control_type: CONTROL_TYPE_IDENTIFY,
                control_value_type: 0,
            },
            dynamic_model: ControlDynamicModel {
                object_name: String::new(),
                values: avdecc_model::control_values::ControlValues::Linear(
                    avdecc_model::control_values::LinearValues {
                        minimum: 0,
                        maximum: 0,
                        step: 0,
                        default: 0,
                        current: 0,
                    },
                ),
            },
        }
    }

    #[test]
    fn resolves_configuration_level_index() {
        let mut configuration = ConfigurationNode::default();
        let index = DescriptorIndex(3);
        configuration.controls.insert(index, identify_control(index));
        assert_eq!(resolve(&configuration, index), IdentifyResolution::Configuration(index));
    }

    #[test]
    fn invalid_index_adopts_sole_configuration_candidate() {
        let mut configuration = ConfigurationNode::default();
        let index = DescriptorIndex(7);
        configuration.controls.insert(index, identify_control(index));
        let resolution = resolve(&configuration, DescriptorIndex::INVALID);
        assert_eq!(resolution, IdentifyResolution::AdoptedFallback(index));
        assert!(resolution.is_non_17221());
    }

    #[test]
    fn invalid_index_with_multiple_candidates_resolves_to_none() {
        let mut configuration = ConfigurationNode::default();
        configuration.controls.insert(DescriptorIndex(1), identify_control(DescriptorIndex(1)));
        configuration.controls.insert(DescriptorIndex(2), identify_control(DescriptorIndex(2)));
        assert_eq!(resolve(&configuration, DescriptorIndex::INVALID), IdentifyResolution::None);
    }
}
