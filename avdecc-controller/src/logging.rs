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

//! Process-wide tracing init (spec §5's "singleton logger, init-once").

use crate::error::ControllerResult;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

/// Installs a `tracing-subscriber` fmt layer filtered by `directives`
/// (`RUST_LOG` syntax, e.g. `"avdecc_controller=debug,avdecc_core=info"`).
/// Safe to call once per process; a second call returns `TryInit`.
pub fn init_tracing(directives: &str) -> ControllerResult<()> {
    let filter = EnvFilter::try_new(directives)?;
    tracing_subscriber::fmt().with_env_filter(filter).finish().try_init()?;
    Ok(())
}
