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

//! Function signatures used for registration and arity checks

use serde::{Deserialize, Serialize};

use crate::core::{FhirPathError, Result};

/// Function category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionCategory {
    /// Functions that work on whole collections (count, first, distinct, ...)
    Collection,
    /// Functions that work on a single scalar (startsWith, length, ...)
    Scalar,
    /// Functions that take an expression evaluated per item (where, all, ...)
    Lambda,
    /// Type tests and casts (is, as, ofType)
    Type,
    /// Functions that navigate the tree (resolve, children, ...)
    Navigation,
    /// Functions with side effects outside the result (trace)
    Utility,
}

/// Cardinality requirement for function inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardinalityRequirement {
    /// Any number of input items
    AcceptsBoth,
    /// At most one input item; more is an error
    RequiresScalar,
}

/// Parameter type specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    /// String parameter
    String,
    /// Integer parameter
    Integer,
    /// Boolean parameter
    Boolean,
    /// Any value
    Any,
    /// A collection, evaluated eagerly
    Collection,
    /// An expression evaluated per input item
    Lambda,
    /// A type name, not evaluated
    TypeSpecifier,
}

/// Return value type specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// String return value
    String,
    /// Integer return value
    Integer,
    /// Decimal return value
    Decimal,
    /// Boolean return value
    Boolean,
    /// Any type return value
    Any,
    /// Collection return value
    Collection,
}

/// Signature of a registered function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// Function name (e.g., "startsWith")
    pub name: &'static str,
    /// Required parameter types in order
    pub parameters: Vec<ParameterType>,
    /// Trailing parameters that may be omitted
    pub optional_parameters: Vec<ParameterType>,
    /// Return type of the function
    pub return_type: ValueType,
    /// Whether this function accepts any number of trailing arguments
    pub variadic: bool,
    /// Function category
    pub category: FunctionCategory,
    /// Cardinality requirement for the input collection
    pub cardinality_requirement: CardinalityRequirement,
}

impl FunctionSignature {
    /// Signature of a function without arguments
    pub fn no_args(name: &'static str, return_type: ValueType, category: FunctionCategory) -> Self {
        Self {
            name,
            parameters: vec![],
            optional_parameters: vec![],
            return_type,
            variadic: false,
            category,
            cardinality_requirement: CardinalityRequirement::AcceptsBoth,
        }
    }

    /// Signature with the given required parameters
    pub fn new(
        name: &'static str,
        parameters: Vec<ParameterType>,
        return_type: ValueType,
        category: FunctionCategory,
    ) -> Self {
        Self {
            parameters,
            ..Self::no_args(name, return_type, category)
        }
    }

    /// Add trailing optional parameters
    pub fn with_optional(mut self, optional_parameters: Vec<ParameterType>) -> Self {
        self.optional_parameters = optional_parameters;
        self
    }

    /// Require a singleton (or empty) input
    pub fn scalar_input(mut self) -> Self {
        self.cardinality_requirement = CardinalityRequirement::RequiresScalar;
        self
    }

    /// Get the minimum number of required arguments
    pub fn min_args(&self) -> usize {
        self.parameters.len()
    }

    /// Get the maximum number of arguments (None if variadic)
    pub fn max_args(&self) -> Option<usize> {
        if self.variadic {
            None
        } else {
            Some(self.parameters.len() + self.optional_parameters.len())
        }
    }

    /// Check if the given argument count is valid for this signature
    pub fn is_valid_arg_count(&self, arg_count: usize) -> bool {
        arg_count >= self.min_args() && self.max_args().is_none_or(|max| arg_count <= max)
    }

    /// Fail with `InvalidArgumentCount` unless `arg_count` fits
    pub fn check_arg_count(&self, arg_count: usize) -> Result<()> {
        if self.is_valid_arg_count(arg_count) {
            return Ok(());
        }
        let expected = match self.max_args() {
            Some(max) if max == self.min_args() => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args(), max),
            None => format!("at least {}", self.min_args()),
        };
        Err(FhirPathError::InvalidArgumentCount {
            function_name: self.name.to_string(),
            expected,
            actual: arg_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_count_with_optional_parameters() {
        let signature = FunctionSignature::new(
            "substring",
            vec![ParameterType::Integer],
            ValueType::String,
            FunctionCategory::Scalar,
        )
        .with_optional(vec![ParameterType::Integer]);

        assert!(signature.check_arg_count(1).is_ok());
        assert!(signature.check_arg_count(2).is_ok());
        assert_eq!(
            signature.check_arg_count(3).unwrap_err(),
            FhirPathError::InvalidArgumentCount {
                function_name: "substring".to_string(),
                expected: "1 to 2".to_string(),
                actual: 3,
            }
        );
    }

    #[test]
    fn test_no_args_message() {
        let signature =
            FunctionSignature::no_args("first", ValueType::Collection, FunctionCategory::Collection);
        let err = signature.check_arg_count(1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Function 'first' expects 0 arguments, got 1"
        );
    }
}
