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

//! The standard function catalog, grouped by category

pub mod collection;
pub mod conversion;
pub mod filtering;
pub mod fhir;
pub mod logic;
pub mod string;
pub mod types;
pub mod utility;

pub use collection::{
    SimpleCombineFunction, SimpleCountFunction, SimpleDistinctFunction, SimpleEmptyFunction,
    SimpleFirstFunction, SimpleIsDistinctFunction, SimpleLastFunction, SimpleSingleFunction,
    SimpleSkipFunction, SimpleTailFunction, SimpleTakeFunction, SimpleUnionFunction,
};
pub use conversion::{SimpleToDecimalFunction, SimpleToIntegerFunction, SimpleToStringFunction};
pub use fhir::{SimpleChildrenFunction, SimpleDescendantsFunction, SimpleResolveFunction};
pub use filtering::{AllFunction, ExistsFunction, SelectFunction, WhereFunction};
pub use logic::{
    IifFunction, SimpleAllTrueFunction, SimpleAnyTrueFunction, SimpleHasValueFunction,
    SimpleNotFunction,
};
pub use string::{
    SimpleContainsFunction, SimpleEndsWithFunction, SimpleIndexOfFunction, SimpleLengthFunction,
    SimpleLowerFunction, SimpleMatchesFunction, SimpleReplaceFunction,
    SimpleReplaceMatchesFunction, SimpleStartsWithFunction, SimpleSubstringFunction,
    SimpleUpperFunction,
};
pub use types::{AsFunction, IsFunction, OfTypeFunction};
pub use utility::TraceFunction;

use crate::core::{FhirPathError, Result};
use crate::model::{Collection, FhirPathValue};

/// Interpret the result of a criteria expression: `[true]` and any single non-boolean
/// value count as true, `[false]` as false, and empty as no answer.
pub(crate) fn criteria_result(result: &Collection, function: &str) -> Result<Option<bool>> {
    match result.singleton(function)? {
        None => Ok(None),
        Some(value) => Ok(Some(value.as_boolean().unwrap_or(true))),
    }
}

/// Singleton string input of a string function
pub(crate) fn string_input<'a>(input: &'a Collection, function: &str) -> Result<Option<&'a str>> {
    match input.singleton(function)? {
        None => Ok(None),
        Some(value) => expect_string(value, function).map(Some),
    }
}

/// Singleton string argument at `index`
pub(crate) fn string_arg<'a>(
    args: &'a [Collection],
    index: usize,
    function: &str,
) -> Result<Option<&'a str>> {
    match args.get(index) {
        Some(arg) => string_input(arg, function),
        None => Ok(None),
    }
}

/// Singleton integer argument at `index`
pub(crate) fn integer_arg(args: &[Collection], index: usize, function: &str) -> Result<Option<i64>> {
    let Some(arg) = args.get(index) else {
        return Ok(None);
    };
    match arg.singleton(function)? {
        None => Ok(None),
        Some(value) => value.as_integer().map(Some).ok_or_else(|| {
            FhirPathError::type_mismatch(
                "Integer",
                value.qualified_type_name(),
                Some(format!("{function}()")),
            )
        }),
    }
}

fn expect_string<'a>(value: &'a FhirPathValue, function: &str) -> Result<&'a str> {
    value.as_string().ok_or_else(|| {
        FhirPathError::type_mismatch(
            "String",
            value.qualified_type_name(),
            Some(format!("{function}()")),
        )
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::ast::ExpressionNode;
    use crate::core::{FhirPathError, Result};
    use crate::model::{Collection, FhirPathValue, InMemoryModelProvider, TypeRegistry};
    use crate::registry::traits::{ExpressionEvaluator, OperationContext, SyncOperation};

    /// Evaluator for unit tests of eager operations
    pub(crate) struct StaticEvaluator {
        types: TypeRegistry,
    }

    impl StaticEvaluator {
        pub(crate) fn new() -> Self {
            Self {
                types: TypeRegistry::new(Arc::new(
                    InMemoryModelProvider::new().with_resources(["Patient", "Observation"]),
                )),
            }
        }
    }

    impl ExpressionEvaluator for StaticEvaluator {
        fn evaluate_for_item(
            &self,
            _expression: &ExpressionNode,
            _item: &FhirPathValue,
            _index: usize,
        ) -> Result<Collection> {
            Err(FhirPathError::evaluation_error("no expressions in unit tests"))
        }

        fn evaluate_in_scope(&self, _expression: &ExpressionNode) -> Result<Collection> {
            Err(FhirPathError::evaluation_error("no expressions in unit tests"))
        }

        fn types(&self) -> &TypeRegistry {
            &self.types
        }

        fn resolve_reference(&self, _reference: &str) -> Option<FhirPathValue> {
            None
        }
    }

    /// Run an eager operation over `input`
    pub(crate) fn run(
        operation: &dyn SyncOperation,
        input: Vec<FhirPathValue>,
        args: Vec<Collection>,
    ) -> Result<Collection> {
        let evaluator = StaticEvaluator::new();
        let input = Collection::from_vec(input);
        let context = OperationContext::new(&input, &evaluator);
        operation.execute(&args, &context)
    }
}
