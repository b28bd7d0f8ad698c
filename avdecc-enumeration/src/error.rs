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

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum EnumerationError {
    #[error("entity {0} failed to answer ReadEntityDescriptor: {1}")]
    CatastrophicFailure(avdecc_model::ids::EntityID, avdecc_core::error::ProtocolError),
    #[error("descriptor bytes too short for type {descriptor_type:?}: needed {needed}, got {got}")]
    MalformedDescriptor {
        descriptor_type: avdecc_model::ids::DescriptorType,
        needed: usize,
        got: usize,
    },
    #[error("cache I/O error: {0}")]
    CacheIo(#[from] std::io::Error),
    #[error("cache entry is corrupt: {0}")]
    CacheCorrupt(#[from] serde_json::Error),
    #[error(transparent)]
    Protocol(#[from] avdecc_core::error::ProtocolError),
    #[error(transparent)]
    Model(#[from] avdecc_model::error::ModelError),
}

pub type EnumerationResult<T> = Result<T, EnumerationError>;
