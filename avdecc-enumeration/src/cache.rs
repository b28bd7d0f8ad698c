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

//! On-disk cache of an entity's static model tree (spec §4.I), keyed by
//! `entityModelID` and the static tree's checksum so a cache hit is only
//! ever used for a model that is byte-for-byte what the checksum attests.
//! A miss or mismatch means the full recursive descriptor walk runs again.

use crate::error::{EnumerationError, EnumerationResult};
use avdecc_model::descriptor::EntityNode;
use avdecc_model::persistence::DumpFlags;
use std::path::{Path, PathBuf};

pub struct ModelCache {
    directory: PathBuf,
}

impl ModelCache {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, entity_model_id: u64, checksum: &[u8; 32]) -> PathBuf {
        let mut name = format!("{entity_model_id:016x}-");
        for byte in checksum {
            name.push_str(&format!("{byte:02x}"));
        }
        name.push_str(".json");
        self.directory.join(name)
    }

    /// Loads the cached tree only if its recomputed checksum still matches
    /// the one the cache file was written under; a stale or tampered file
    /// is treated the same as a miss.
    pub async fn load(
        &self,
        entity_model_id: u64,
        checksum: &[u8; 32],
    ) -> EnumerationResult<Option<EntityNode>> {
        let path = self.path_for(entity_model_id, checksum);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(EnumerationError::CacheIo(err)),
        };
        let entity = avdecc_model::persistence::from_json(&data)?;
        let recomputed =
            avdecc_model::checksum::compute(&entity, avdecc_model::checksum::CURRENT_ALGORITHM_VERSION)?;
        if &recomputed != checksum {
            tracing::warn!(path = %path.display(), "cached model checksum mismatch, discarding");
            return Ok(None);
        }
        Ok(Some(entity))
    }

    /// Looks for any cached tree for `entity_model_id`, regardless of which
    /// checksum it was stored under. Same `entityModelID` implies the same
    /// static tree by construction (spec §4.I), so the first
    /// self-consistent file found is the cache hit; the checksum encoded in
    /// its filename only guards against a truncated or corrupted write.
    pub async fn load_by_entity_model_id(
        &self,
        entity_model_id: u64,
    ) -> EnumerationResult<Option<EntityNode>> {
        let prefix = format!("{entity_model_id:016x}-");
        let mut dir = match tokio::fs::read_dir(&self.directory).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(EnumerationError::CacheIo(err)),
        };
        while let Some(entry) = dir.next_entry().await.map_err(EnumerationError::CacheIo)? {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some(suffix) = file_name.strip_prefix(&prefix) else {
                continue;
            };
            let Some(expected_checksum) = suffix.strip_suffix(".json") else {
                continue;
            };
            let data = match tokio::fs::read_to_string(entry.path()).await {
                Ok(data) => data,
                Err(_) => continue,
            };
            let entity = match avdecc_model::persistence::from_json(&data) {
                Ok(entity) => entity,
                Err(_) => continue,
            };
            let recomputed = avdecc_model::checksum::compute(
                &entity,
                avdecc_model::checksum::CURRENT_ALGORITHM_VERSION,
            )?;
            let recomputed_hex: String = recomputed.iter().map(|b| format!("{b:02x}")).collect();
            if recomputed_hex == expected_checksum {
                return Ok(Some(entity));
            }
            tracing::warn!(
                file = %file_name,
                "discarding cache file whose contents no longer match its own checksum"
            );
        }
        Ok(None)
    }

    pub async fn store(&self, entity: &EntityNode) -> EnumerationResult<()> {
        let checksum = avdecc_model::checksum::compute(
            entity,
            avdecc_model::checksum::CURRENT_ALGORITHM_VERSION,
        )?;
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.path_for(entity.static_model.entity_model_id, &checksum);
        let mut flags = DumpFlags::default();
        flags.process_dynamic_model = false;
        flags.process_statistics = false;
        flags.process_state = false;
        let json = avdecc_model::persistence::to_json(entity, flags)?;
        tokio::fs::write(&path, json).await?;
        Ok(())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avdecc_model::descriptor::{EntityDynamicModel, EntityStaticModel};
    use avdecc_model::ids::{DescriptorIndex, EntityID};
    use std::collections::BTreeMap;

    fn sample() -> EntityNode {
        EntityNode {
            entity_id: EntityID(42),
            static_model: EntityStaticModel {
                entity_model_id: 0x001b9211_00000001,
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
                entity_name: "Test Entity".into(),
                group_name: String::new(),
                firmware_version: String::new(),
                serial_number: String::new(),
                current_configuration: DescriptorIndex(0),
            },
            configurations: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn store_then_load_round_trips() -> EnumerationResult<()> {
        let dir = std::env::temp_dir().join(format!("avdecc-cache-test-{:x}", rand_seed()));
        let cache = ModelCache::new(dir.clone());
        let entity = sample();
        cache.store(&entity).await?;
        let checksum = avdecc_model::checksum::compute(
            &entity,
            avdecc_model::checksum::CURRENT_ALGORITHM_VERSION,
        )?;
        let loaded = cache.load(entity.static_model.entity_model_id, &checksum).await?;
        assert_eq!(loaded.as_ref().map(|e| e.entity_id), Some(entity.entity_id));
        tokio::fs::remove_dir_all(&dir).await.ok();
        Ok(())
    }

    #[tokio::test]
    async fn load_by_model_id_finds_entry_regardless_of_checksum_suffix() -> EnumerationResult<()> {
        let dir = std::env::temp_dir().join(format!("avdecc-cache-test-{:x}", rand_seed() + 2));
        let cache = ModelCache::new(dir.clone());
        let entity = sample();
        cache.store(&entity).await?;
        let loaded = cache
            .load_by_entity_model_id(entity.static_model.entity_model_id)
            .await?;
        assert_eq!(loaded.as_ref().map(|e| e.entity_id), Some(entity.entity_id));
        tokio::fs::remove_dir_all(&dir).await.ok();
        Ok(())
    }

    #[tokio::test]
    async fn missing_cache_entry_is_a_clean_miss() -> EnumerationResult<()> {
        let dir = std::env::temp_dir().join(format!("avdecc-cache-test-{:x}", rand_seed() + 1));
        let cache = ModelCache::new(dir);
        let loaded = cache.load(0, &[0u8; 32]).await?;
        assert!(loaded.is_none());
        Ok(())
    }

    fn rand_seed() -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        hasher.finish()
    }
}
