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

//! Entity-model enumeration (spec §4.I): walks a newly-discovered entity's
//! descriptor tree into a typed `avdecc_model::descriptor::EntityNode`,
//! backed by an on-disk cache of static models keyed by `entityModelID`.

pub mod cache;
pub mod config;
pub mod descriptor_codec;
pub mod error;
pub mod scheduler;

pub use config::EnumerationConfig;
pub use error::{EnumerationError, EnumerationResult};
pub use scheduler::{EnumerationOutcome, EnumerationScheduler};
