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
pub enum CodecError {
    #[error("frame is incomplete: needed at least {needed} bytes, got {got}")]
    IncompleteFrame { needed: usize, got: usize },
    #[error("unknown AVTP subtype {0:#04x}")]
    UnknownSubtype(u8),
    #[error("payload too short for declared controlDataLength {declared}, got {got}")]
    PayloadTooShort { declared: usize, got: usize },
    #[error("unknown AECP status code {0:#04x}")]
    UnknownStatus(u8),
}

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Error, Debug, Diagnostic)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no such network interface: {0}")]
    NoSuchInterface(String),
    #[error("transport is shut down")]
    ShutDown,
}

pub type TransportResult<T> = Result<T, TransportError>;

/// The wire status vocabulary of an AEM response (spec §7). `InProgress` is
/// not an error: it resets the command's retry timer without consuming the
/// retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AemStatus {
    Success,
    NotImplemented,
    NoSuchDescriptor,
    EntityLocked,
    EntityAcquired,
    NotAuthenticated,
    AuthenticationDisabled,
    BadArguments,
    NoResources,
    InProgress,
    EntityMisbehaving,
    NotSupported,
    StreamIsRunning,
}

impl AemStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        use AemStatus::*;
        Some(match value {
            0 => Success,
            1 => NotImplemented,
            2 => NoSuchDescriptor,
            3 => EntityLocked,
            4 => EntityAcquired,
            5 => NotAuthenticated,
            6 => AuthenticationDisabled,
            7 => BadArguments,
            8 => NoResources,
            9 => InProgress,
            10 => EntityMisbehaving,
            11 => NotSupported,
            12 => StreamIsRunning,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        use AemStatus::*;
        match self {
            Success => 0,
            NotImplemented => 1,
            NoSuchDescriptor => 2,
            EntityLocked => 3,
            EntityAcquired => 4,
            NotAuthenticated => 5,
            AuthenticationDisabled => 6,
            BadArguments => 7,
            NoResources => 8,
            InProgress => 9,
            EntityMisbehaving => 10,
            NotSupported => 11,
            StreamIsRunning => 12,
        }
    }

    pub fn is_error(self) -> bool {
        !matches!(self, AemStatus::Success | AemStatus::InProgress)
    }
}

/// The per-command error taxonomy a Local Entity command callback or an
/// AECP/ACMP state machine can surface (spec §7).
#[derive(Error, Debug, Diagnostic)]
pub enum ProtocolError {
    #[error("command timed out")]
    Timeout,
    #[error("unknown entity")]
    UnknownEntity,
    #[error("bad arguments: {0}")]
    BadArguments(String),
    #[error("message type unsupported by this protocol interface")]
    NotSupported,
    #[error("protocol interface shut down")]
    Aborted,
    #[error("remote entity returned {0:?}")]
    AemStatus(AemStatus),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
