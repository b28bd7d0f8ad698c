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

use avdecc_model::ids::EntityID;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum ControllerError {
    #[error("{0} is not in the controlled entity registry")]
    UnknownEntity(EntityID),
    #[error(transparent)]
    Enumeration(#[from] avdecc_enumeration::EnumerationError),
    #[error(transparent)]
    Protocol(#[from] avdecc_core::error::ProtocolError),
    #[error(transparent)]
    Model(#[from] avdecc_model::error::ModelError),
    #[error("tracing init error: {0}")]
    TryInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("tracing filter error: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("persisted state error: {0}")]
    JsonSerde(#[from] serde_json::Error),
}

pub type ControllerResult<T> = Result<T, ControllerError>;
