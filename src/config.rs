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

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolInterfaceConfig {
    /// Name of the cooperative dispatch queue this Protocol Interface runs
    /// on; distinct interfaces may share a name to run on the same queue.
    pub executor_name: String,
    pub network_interface: String,
    #[serde(with = "duration_millis")]
    pub discovery_interval: Duration,
}

impl Default for ProtocolInterfaceConfig {
    fn default() -> Self {
        Self {
            executor_name: "avdecc".into(),
            network_interface: String::new(),
            discovery_interval: Duration::from_secs(10),
        }
    }
}

/// Per-sub-protocol command timeout overrides and retry budget (spec §4.E,
/// §4.F: 250 ms default per hop, one retry).
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutConfig {
    #[serde(with = "duration_millis")]
    pub aem_command: Duration,
    #[serde(with = "duration_millis")]
    pub address_access_command: Duration,
    #[serde(with = "duration_millis")]
    pub acmp_command: Duration,
    pub retry_budget: u8,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            aem_command: Duration::from_millis(250),
            address_access_command: Duration::from_millis(250),
            acmp_command: Duration::from_millis(250),
            retry_budget: 1,
        }
    }
}

/// The identity and capability set a locally-advertised entity presents on
/// ADP (spec §4.D).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEntityConfig {
    pub entity_id: u64,
    pub entity_model_id: u64,
    pub entity_capabilities: u32,
    pub controller_capabilities: u32,
    pub valid_time_seconds: u8,
}

impl Default for LocalEntityConfig {
    fn default() -> Self {
        Self {
            entity_id: 0,
            entity_model_id: 0,
            entity_capabilities: 0,
            // AemSupported only, by far the common controller-only case.
            controller_capabilities: 0x0000_0001,
            valid_time_seconds: 10,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_config_round_trips_through_yaml() {
        let config = TimeoutConfig::default();
        let yaml = serde_yaml::to_string(&config).expect("serialize default config");
        let restored: TimeoutConfig = serde_yaml::from_str(&yaml).expect("parse serialized config");
        assert_eq!(restored.aem_command, config.aem_command);
        assert_eq!(restored.retry_budget, config.retry_budget);
    }
}
