// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Quantity values
//!
//! Units are compared as written, except that calendar duration keywords are
//! folded to their singular form (`days` and `day` are the same unit). Converting
//! between UCUM units is outside this engine: quantities with different units are
//! incomparable, and operators turn that into an empty result.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::core::CalendarDuration;

const CALENDAR_UNITS: &[&str] = &[
    "year",
    "years",
    "month",
    "months",
    "week",
    "weeks",
    "day",
    "days",
    "hour",
    "hours",
    "minute",
    "minutes",
    "second",
    "seconds",
    "millisecond",
    "milliseconds",
];

/// Check whether `unit` is a calendar duration keyword (`day`, `weeks`, ...)
pub fn is_calendar_unit(unit: &str) -> bool {
    CALENDAR_UNITS.contains(&unit)
}

/// UCUM code that a calendar keyword is equivalent to under `~`
fn calendar_ucum_equivalent(unit: &str) -> Option<&'static str> {
    match canonical_unit(unit) {
        "year" => Some("a"),
        "month" => Some("mo"),
        "week" => Some("wk"),
        "day" => Some("d"),
        "hour" => Some("h"),
        "minute" => Some("min"),
        "second" => Some("s"),
        "millisecond" => Some("ms"),
        _ => None,
    }
}

/// Decimal equivalence: both sides rounded to the scale of the less precise one
pub fn decimals_equivalent(a: Decimal, b: Decimal) -> bool {
    let scale = a.scale().min(b.scale());
    a.round_dp(scale) == b.round_dp(scale)
}

fn canonical_unit(unit: &str) -> &str {
    if is_calendar_unit(unit) {
        unit.strip_suffix('s').unwrap_or(unit)
    } else {
        unit
    }
}

/// Quantity value with a unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quantity {
    /// Numeric value
    pub value: Decimal,
    /// UCUM code or calendar keyword; `1` for unitless quantities
    pub unit: String,
}

impl Quantity {
    /// Create a new quantity
    pub fn new(value: Decimal, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    /// Create a unitless quantity
    pub fn unitless(value: Decimal) -> Self {
        Self::new(value, "1")
    }

    fn same_unit(&self, other: &Self) -> bool {
        canonical_unit(&self.unit) == canonical_unit(&other.unit)
    }

    /// Ordering when both quantities share a unit, `None` otherwise
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        self.same_unit(other).then(|| self.value.cmp(&other.value))
    }

    /// Strict equality; `None` when the units are incomparable
    pub fn equals(&self, other: &Self) -> Option<bool> {
        self.compare(other).map(|ordering| ordering == Ordering::Equal)
    }

    /// Equivalence also treats a calendar keyword and its UCUM code as one unit
    pub fn equivalent(&self, other: &Self) -> bool {
        let unit_matches = self.same_unit(other)
            || calendar_ucum_equivalent(&self.unit) == Some(other.unit.as_str())
            || calendar_ucum_equivalent(&other.unit) == Some(self.unit.as_str());
        unit_matches && decimals_equivalent(self.value, other.value)
    }

    /// Duration for date arithmetic. Calendar keywords qualify, as do the UCUM
    /// codes of fixed length (`wk`, `d`, `h`, `min`, `s`, `ms`).
    pub fn calendar_duration(&self) -> Option<CalendarDuration> {
        let millis_per_unit: i64 = match self.unit.as_str() {
            "year" | "years" => {
                let years = self.value.trunc().to_i64()?;
                return years.checked_mul(12).map(CalendarDuration::Months);
            }
            "month" | "months" => {
                return self.value.trunc().to_i64().map(CalendarDuration::Months);
            }
            "week" | "weeks" | "wk" => 604_800_000,
            "day" | "days" | "d" => 86_400_000,
            "hour" | "hours" | "h" => 3_600_000,
            "minute" | "minutes" | "min" => 60_000,
            "second" | "seconds" | "s" => 1_000,
            "millisecond" | "milliseconds" | "ms" => 1,
            _ => return None,
        };
        let millis = self.value.checked_mul(Decimal::from(millis_per_unit))?;
        millis.trunc().to_i64().map(CalendarDuration::Milliseconds)
    }

    /// Sum of two quantities in the same unit
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        if !self.same_unit(other) {
            return None;
        }
        Some(Self::new(self.value.checked_add(other.value)?, self.unit.clone()))
    }

    /// Difference of two quantities in the same unit
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        if !self.same_unit(other) {
            return None;
        }
        Some(Self::new(self.value.checked_sub(other.value)?, self.unit.clone()))
    }

    /// Scale by a plain number
    pub fn checked_scale(&self, factor: Decimal) -> Option<Self> {
        Some(Self::new(self.value.checked_mul(factor)?, self.unit.clone()))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if is_calendar_unit(&self.unit) {
            write!(f, "{} {}", self.value, self.unit)
        } else {
            write!(f, "{} '{}'", self.value, self.unit)
        }
    }
}
