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

//! Type-erased control value variants (spec §9 "Dynamic control value
//! polymorphism"), modeled as a sealed sum rather than the source's
//! inheritance hierarchy. Each variant carries both its static-model bounds
//! and its current dynamic value, and knows how to validate a candidate
//! value against those bounds.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationResult {
    Valid,
    InvalidValues,
}

/// A control's current value together with the static bounds it must
/// satisfy, matching the AEM `ControlDescriptor` static/dynamic value split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlValues {
    Linear(LinearValues),
    Array(ArrayValues),
    Utf8(Utf8Value),
    Selector(SelectorValue),
}

impl ControlValues {
    pub fn validate(&self) -> ValidationResult {
        match self {
            ControlValues::Linear(v) => v.validate(),
            ControlValues::Array(v) => v.validate(),
            ControlValues::Utf8(v) => v.validate(),
            ControlValues::Selector(v) => v.validate(),
        }
    }
}

/// One linear (bounded, stepped) value, e.g. `ControlLinearUInt8`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearValues {
    pub minimum: i64,
    pub maximum: i64,
    pub step: i64,
    pub default: i64,
    pub current: i64,
}

impl LinearValues {
    pub fn validate(&self) -> ValidationResult {
        if self.current < self.minimum || self.current > self.maximum {
            return ValidationResult::InvalidValues;
        }
        if self.step > 0 {
            let offset = self.current - self.minimum;
            if offset % self.step != 0 {
                return ValidationResult::InvalidValues;
            }
        }
        ValidationResult::Valid
    }

    pub fn with_current(mut self, value: i64) -> ModelResult<Self> {
        self.current = value;
        match self.validate() {
            ValidationResult::Valid => Ok(self),
            ValidationResult::InvalidValues => Err(ModelError::InvalidControlValue(format!(
                "value {value} is out of bounds [{}, {}] or not a multiple of step {}",
                self.minimum, self.maximum, self.step
            ))),
        }
    }
}

/// A fixed-length array of linear values (e.g. a multi-element UInt8 array
/// control), validated element-wise against shared bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValues {
    pub minimum: i64,
    pub maximum: i64,
    pub step: i64,
    pub current: Vec<i64>,
}

impl ArrayValues {
    pub fn validate(&self) -> ValidationResult {
        for &v in &self.current {
            if v < self.minimum || v > self.maximum {
                return ValidationResult::InvalidValues;
            }
            if self.step > 0 && (v - self.minimum) % self.step != 0 {
                return ValidationResult::InvalidValues;
            }
        }
        ValidationResult::Valid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utf8Value {
    pub max_length: usize,
    pub current: String,
}

impl Utf8Value {
    pub fn validate(&self) -> ValidationResult {
        if self.current.len() > self.max_length {
            ValidationResult::InvalidValues
        } else {
            ValidationResult::Valid
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorValue {
    pub options: Vec<String>,
    pub current_index: u16,
}

impl SelectorValue {
    pub fn validate(&self) -> ValidationResult {
        if (self.current_index as usize) < self.options.len() {
            ValidationResult::Valid
        } else {
            ValidationResult::InvalidValues
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_boundary_values_are_valid() {
        let bounds = LinearValues {
            minimum: 0,
            maximum: 255,
            step: 1,
            default: 0,
            current: 0,
        };
        assert_eq!(bounds.validate(), ValidationResult::Valid);
        let at_max = LinearValues {
            current: 255,
            ..bounds
        };
        assert_eq!(at_max.validate(), ValidationResult::Valid);
    }

    #[test]
    fn linear_value_not_a_multiple_of_step_is_invalid() {
        let v = LinearValues {
            minimum: 0,
            maximum: 10,
            step: 2,
            default: 0,
            current: 1,
        };
        assert_eq!(v.validate(), ValidationResult::InvalidValues);
    }

    #[test]
    fn selector_index_out_of_range_is_invalid() {
        let v = SelectorValue {
            options: vec!["a".into(), "b".into()],
            current_index: 2,
        };
        assert_eq!(v.validate(), ValidationResult::InvalidValues);
    }
}
