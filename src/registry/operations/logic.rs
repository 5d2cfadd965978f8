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

//! Boolean functions and `iif`

use std::sync::LazyLock;

use crate::ast::ExpressionNode;
use crate::core::Result;
use crate::evaluator::operators::to_logic;
use crate::model::Collection;
use crate::registry::signature::{FunctionCategory, FunctionSignature, ParameterType, ValueType};
use crate::registry::traits::{LambdaOperation, OperationContext, SyncOperation};

use super::criteria_result;

/// not(): boolean negation, empty stays empty
pub struct SimpleNotFunction;

impl SyncOperation for SimpleNotFunction {
    fn name(&self) -> &'static str {
        "not"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("not", ValueType::Boolean, FunctionCategory::Scalar)
                .scalar_input()
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let value = to_logic(context.input, self.name())?;
        Ok(Collection::from_option_bool(value.map(|b| !b)))
    }
}

/// allTrue(): every item is boolean `true`
pub struct SimpleAllTrueFunction;

impl SyncOperation for SimpleAllTrueFunction {
    fn name(&self) -> &'static str {
        "allTrue"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("allTrue", ValueType::Boolean, FunctionCategory::Collection)
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let all = context.input.iter().all(|item| item.as_boolean() == Some(true));
        Ok(Collection::boolean(all))
    }
}

/// anyTrue(): at least one item is boolean `true`
pub struct SimpleAnyTrueFunction;

impl SyncOperation for SimpleAnyTrueFunction {
    fn name(&self) -> &'static str {
        "anyTrue"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("anyTrue", ValueType::Boolean, FunctionCategory::Collection)
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let any = context.input.iter().any(|item| item.as_boolean() == Some(true));
        Ok(Collection::boolean(any))
    }
}

/// hasValue(): the input is a single primitive carrying a value
pub struct SimpleHasValueFunction;

impl SyncOperation for SimpleHasValueFunction {
    fn name(&self) -> &'static str {
        "hasValue"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("hasValue", ValueType::Boolean, FunctionCategory::Scalar)
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let has_value = context.input.len() == 1
            && context
                .input
                .first()
                .is_some_and(|item| item.as_primitive().is_some());
        Ok(Collection::boolean(has_value))
    }
}

/// iif(criterion, true-result [, otherwise-result]): only the chosen branch is evaluated
pub struct IifFunction;

impl IifFunction {
    fn evaluate(
        &self,
        expression: &ExpressionNode,
        context: &OperationContext<'_>,
    ) -> Result<Collection> {
        match context.input.singleton(self.name())? {
            Some(item) => context.evaluator.evaluate_for_item(expression, item, 0),
            None => context.evaluator.evaluate_in_scope(expression),
        }
    }
}

impl LambdaOperation for IifFunction {
    fn name(&self) -> &'static str {
        "iif"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "iif",
                vec![ParameterType::Lambda, ParameterType::Lambda],
                ValueType::Any,
                FunctionCategory::Lambda,
            )
            .with_optional(vec![ParameterType::Lambda])
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[ExpressionNode], context: &OperationContext<'_>) -> Result<Collection> {
        let criterion = self.evaluate(&args[0], context)?;
        if criteria_result(&criterion, self.name())? == Some(true) {
            self.evaluate(&args[1], context)
        } else {
            match args.get(2) {
                Some(otherwise) => self.evaluate(otherwise, context),
                None => Ok(Collection::empty()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FhirPathValue, PrimitiveNode};
    use crate::registry::operations::test_support::run;

    fn boolean_of(collection: &Collection) -> Option<bool> {
        collection.first().and_then(FhirPathValue::as_boolean)
    }

    #[test]
    fn test_not() {
        let result = run(&SimpleNotFunction, vec![FhirPathValue::boolean(true)], vec![]).unwrap();
        assert_eq!(boolean_of(&result), Some(false));
        assert!(run(&SimpleNotFunction, vec![], vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_all_true_any_true() {
        let values = vec![FhirPathValue::boolean(true), FhirPathValue::boolean(false)];
        let all = run(&SimpleAllTrueFunction, values.clone(), vec![]).unwrap();
        let any = run(&SimpleAnyTrueFunction, values, vec![]).unwrap();
        assert_eq!(boolean_of(&all), Some(false));
        assert_eq!(boolean_of(&any), Some(true));

        let vacuous = run(&SimpleAllTrueFunction, vec![], vec![]).unwrap();
        assert_eq!(boolean_of(&vacuous), Some(true));
    }

    #[test]
    fn test_has_value() {
        let empty = FhirPathValue::from(PrimitiveNode::empty_fhir("boolean"));
        let result = run(&SimpleHasValueFunction, vec![empty], vec![]).unwrap();
        assert_eq!(boolean_of(&result), Some(false));

        let result = run(&SimpleHasValueFunction, vec![FhirPathValue::boolean(false)], vec![]).unwrap();
        assert_eq!(boolean_of(&result), Some(true));
    }
}
