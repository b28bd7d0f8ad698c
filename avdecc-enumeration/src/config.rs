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
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumerationConfig {
    /// Where cached static entity-model trees are persisted, keyed by
    /// `entityModelID`. Defaults to the platform cache directory the same
    /// way the teacher resolves its own on-disk state.
    pub cache_directory: PathBuf,
    /// Attempt Milan's batched `GET_DYNAMIC_INFO` before falling back to
    /// serial per-descriptor dynamic reads.
    pub fast_enumeration: bool,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            cache_directory: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("avdecc-core")
                .join("entity-models"),
            fast_enumeration: true,
        }
    }
}
