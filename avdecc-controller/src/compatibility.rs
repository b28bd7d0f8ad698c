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

//! Per-entity observer-visible compatibility attributes (spec §4.J).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompatibilityFlag {
    Ieee17221,
    Ieee17221Warning,
    Milan,
    MilanWarning,
    Misbehaving,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityFlags(BTreeSet<CompatibilityFlag>);

impl CompatibilityFlags {
    pub fn insert(&mut self, flag: CompatibilityFlag) {
        self.0.insert(flag);
    }

    pub fn remove(&mut self, flag: CompatibilityFlag) {
        self.0.remove(&flag);
    }

    pub fn contains(&self, flag: CompatibilityFlag) -> bool {
        self.0.contains(&flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompatibilityFlag> {
        self.0.iter()
    }

    /// The set a newly-enumerated, non-Milan, well-behaved entity starts
    /// with (spec §4.J): plain 17221 compliance, nothing more, nothing less.
    pub fn baseline() -> Self {
        let mut flags = Self::default();
        flags.insert(CompatibilityFlag::Ieee17221);
        flags
    }

    /// Downgrades `Ieee17221` to `Ieee17221Warning` without clearing Milan
    /// flags, per the identify-control resolver's fallback-adoption case
    /// (spec §4.J.3).
    pub fn downgrade_ieee17221(&mut self) {
        if self.0.remove(&CompatibilityFlag::Ieee17221) {
            self.insert(CompatibilityFlag::Ieee17221Warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_is_plain_17221() {
        let flags = CompatibilityFlags::baseline();
        assert!(flags.contains(CompatibilityFlag::Ieee17221));
        assert!(!flags.contains(CompatibilityFlag::Ieee17221Warning));
    }

    #[test]
    fn downgrade_moves_17221_to_warning() {
        let mut flags = CompatibilityFlags::baseline();
        flags.downgrade_ieee17221();
        assert!(!flags.contains(CompatibilityFlag::Ieee17221));
        assert!(flags.contains(CompatibilityFlag::Ieee17221Warning));
    }
}
