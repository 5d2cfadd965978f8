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

//! Error types for FHIRPath parsing and evaluation
//!
//! Structural problems (malformed text, unknown symbols, type mismatches) abort the
//! evaluation call. Missing data never shows up here: it flows through the engine as
//! an empty collection.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for FHIRPath operations
pub type Result<T> = std::result::Result<T, FhirPathError>;

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    /// Byte offset in the source (0-based)
    pub position: usize,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(line: usize, column: usize, position: usize) -> Self {
        Self {
            line,
            column,
            position,
        }
    }

    /// Compute line/column for a byte offset into `source`
    pub fn from_offset(source: &str, position: usize) -> Self {
        let position = position.min(source.len());
        let mut line = 1;
        let mut column = 1;
        for (offset, ch) in source.char_indices() {
            if offset >= position {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self::new(line, column, position)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Error type for FHIRPath operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FhirPathError {
    /// Malformed expression text
    #[error("Parse error at position {position}: {message}")]
    ParseError {
        /// Byte offset in the input where the parse error occurred
        position: usize,
        /// Human-readable error message, including the offending token
        message: String,
    },

    /// Unknown function
    #[error("Unknown function: {function_name}{}", location.as_ref().map(|l| format!(" at {l}")).unwrap_or_default())]
    UnknownFunction {
        /// Name of the unknown function
        function_name: String,
        /// Where the call appears in the expression text
        location: Option<SourceLocation>,
    },

    /// Unknown type name in a type specifier
    #[error("Unknown type: {type_name}")]
    UnknownType {
        /// The type name as written
        type_name: String,
    },

    /// Unknown environment variable
    #[error("Unknown variable: %{name}")]
    UnknownVariable {
        /// Variable name without the `%` prefix
        name: String,
    },

    /// Invalid argument count
    #[error("Function '{function_name}' expects {expected} arguments, got {actual}")]
    InvalidArgumentCount {
        /// Name of the function with invalid argument count
        function_name: String,
        /// Accepted argument counts, e.g. `1` or `1 to 2`
        expected: String,
        /// Actual number of arguments received
        actual: usize,
    },

    /// Type mismatch error with context
    #[error("Type mismatch: expected {expected}, got {actual}{}", context.as_ref().map(|c| format!(" in {c}")).unwrap_or_default())]
    TypeMismatch {
        /// Expected type
        expected: String,
        /// Actual type received
        actual: String,
        /// Additional context about where the mismatch occurred
        context: Option<String>,
    },

    /// Invalid operand types for operator
    #[error("Invalid operand types for operator '{operator}': {left_type} and {right_type}")]
    InvalidOperandTypes {
        /// The operator with invalid operand types
        operator: String,
        /// Type of the left operand
        left_type: String,
        /// Type of the right operand
        right_type: String,
    },

    /// A single value was required but the collection held more
    #[error("Expected a single value in {context}, got {actual} items")]
    SingletonExpected {
        /// Operator or function that required the singleton
        context: String,
        /// Number of items actually present
        actual: usize,
    },

    /// Recursion limit exceeded
    #[error("Recursion limit of {limit} exceeded")]
    RecursionLimitExceeded {
        /// The recursion limit that was exceeded
        limit: usize,
    },

    /// Runtime evaluation errors
    #[error("Evaluation error: {message}")]
    EvaluationError {
        /// Human-readable evaluation error message
        message: String,
    },
}

impl FhirPathError {
    /// Create a parse error
    pub fn parse_error(position: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            position,
            message: message.into(),
        }
    }

    /// Create an evaluation error
    pub fn evaluation_error(message: impl Into<String>) -> Self {
        Self::EvaluationError {
            message: message.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(
        expected: impl Into<String>,
        actual: impl Into<String>,
        context: Option<String>,
    ) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
            context,
        }
    }

    /// Create a singleton violation error
    pub fn singleton_expected(context: impl Into<String>, actual: usize) -> Self {
        Self::SingletonExpected {
            context: context.into(),
            actual,
        }
    }

    /// Check if this error comes from malformed expression text
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::ParseError { .. })
    }

    /// Check if this error names a function, type or variable the engine doesn't know
    pub fn is_unknown_symbol(&self) -> bool {
        matches!(
            self,
            Self::UnknownFunction { .. } | Self::UnknownType { .. } | Self::UnknownVariable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_offset() {
        let source = "Patient.name\n  .given";
        let loc = SourceLocation::from_offset(source, 15);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 3);
        assert_eq!(loc.position, 15);
    }

    #[test]
    fn test_error_display() {
        let err = FhirPathError::UnknownFunction {
            function_name: "frobnicate".to_string(),
            location: Some(SourceLocation::new(1, 9, 8)),
        };
        assert_eq!(
            err.to_string(),
            "Unknown function: frobnicate at line 1, column 9"
        );
        assert!(err.is_unknown_symbol());
        assert!(!err.is_parse_error());

        let err = FhirPathError::parse_error(4, "unexpected token ')'");
        assert_eq!(
            err.to_string(),
            "Parse error at position 4: unexpected token ')'"
        );
        assert!(err.is_parse_error());
    }
}
