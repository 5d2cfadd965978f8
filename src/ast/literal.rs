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

//! Literal values that can appear directly in FHIRPath expressions

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};

/// Literal values that can appear directly in FHIRPath expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// String literal (e.g., 'hello'), escapes already resolved
    String(String),

    /// Integer literal (e.g., 42)
    Integer(i64),

    /// Decimal literal (e.g., 3.14)
    Decimal(Decimal),

    /// Boolean literal (true, false)
    Boolean(bool),

    /// Date literal (e.g., @2023-12-25)
    Date(PrecisionDate),

    /// DateTime literal (e.g., @2023-12-25T10:30:00Z)
    DateTime(PrecisionDateTime),

    /// Time literal (e.g., @T10:30:00)
    Time(PrecisionTime),

    /// Quantity literal (e.g., 5 'mg', 4 days)
    Quantity {
        /// Numeric value
        value: Decimal,
        /// Unit as written: a UCUM code or a calendar duration keyword
        unit: String,
    },

    /// The empty collection literal `{}`
    Empty,
}

impl LiteralValue {
    /// FHIRPath type name of the literal (System namespace)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "String",
            Self::Integer(_) => "Integer",
            Self::Decimal(_) => "Decimal",
            Self::Boolean(_) => "Boolean",
            Self::Date(_) => "Date",
            Self::DateTime(_) => "DateTime",
            Self::Time(_) => "Time",
            Self::Quantity { .. } => "Quantity",
            Self::Empty => "Empty",
        }
    }
}

/// Quote a string the way it must be written inside a FHIRPath expression
pub(crate) fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => quoted.push_str("\\'"),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", quote_string(s)),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "@{d}"),
            Self::DateTime(dt) => {
                if dt.precision <= crate::core::TemporalPrecision::Day {
                    write!(f, "@{dt}T")
                } else {
                    write!(f, "@{dt}")
                }
            }
            Self::Time(t) => write!(f, "@T{t}"),
            Self::Quantity { value, unit } => {
                if crate::model::quantity::is_calendar_unit(unit) {
                    write!(f, "{value} {unit}")
                } else {
                    write!(f, "{value} {}", quote_string(unit))
                }
            }
            Self::Empty => write!(f, "{{}}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_display_round_trips_source_form() {
        assert_eq!(LiteralValue::String("it's".into()).to_string(), "'it\\'s'");
        assert_eq!(
            LiteralValue::Date(PrecisionDate::parse("2012-04-15").unwrap()).to_string(),
            "@2012-04-15"
        );
        assert_eq!(
            LiteralValue::DateTime(PrecisionDateTime::parse("2012-04-15").unwrap()).to_string(),
            "@2012-04-15T"
        );
        assert_eq!(
            LiteralValue::Quantity {
                value: Decimal::new(5, 0),
                unit: "mg".into()
            }
            .to_string(),
            "5 'mg'"
        );
        assert_eq!(LiteralValue::Empty.to_string(), "{}");
    }
}
