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
pub enum ModelError {
    #[error("descriptor index {0:?} out of range for type {1:?}")]
    InvalidDescriptorIndex(crate::ids::DescriptorIndex, crate::ids::DescriptorType),
    #[error("no configuration is marked active on this entity")]
    NoActiveConfiguration,
    #[error("unsupported checksum algorithm version: {0}")]
    UnsupportedChecksumVersion(u8),
    #[error("JSON (de)serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("malformed persisted entity: {0}")]
    MalformedPersistence(String),
    #[error("control value validation failed: {0}")]
    InvalidControlValue(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
