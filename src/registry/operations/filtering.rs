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

//! Functions that evaluate a criteria or projection expression per input item

use std::sync::LazyLock;

use log::trace;

use crate::ast::ExpressionNode;
use crate::core::Result;
use crate::model::Collection;
use crate::registry::signature::{FunctionCategory, FunctionSignature, ParameterType, ValueType};
use crate::registry::traits::{LambdaOperation, OperationContext};

use super::criteria_result;

/// exists([criteria]): true if the input (filtered by `criteria`) has any item
pub struct ExistsFunction;

impl LambdaOperation for ExistsFunction {
    fn name(&self) -> &'static str {
        "exists"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("exists", ValueType::Boolean, FunctionCategory::Lambda)
                .with_optional(vec![ParameterType::Lambda])
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[ExpressionNode], context: &OperationContext<'_>) -> Result<Collection> {
        let Some(criteria) = args.first() else {
            let exists = context.input.iter().any(|item| item.has_value());
            return Ok(Collection::boolean(exists));
        };

        for (index, item) in context.input.iter().enumerate() {
            let result = context.evaluator.evaluate_for_item(criteria, item, index)?;
            if criteria_result(&result, self.name())? == Some(true) {
                return Ok(Collection::boolean(true));
            }
        }
        Ok(Collection::boolean(false))
    }
}

/// where(criteria): the items for which `criteria` is true
#[derive(Debug, Clone, Default)]
pub struct WhereFunction;

impl LambdaOperation for WhereFunction {
    fn name(&self) -> &'static str {
        "where"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "where",
                vec![ParameterType::Lambda],
                ValueType::Collection,
                FunctionCategory::Lambda,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[ExpressionNode], context: &OperationContext<'_>) -> Result<Collection> {
        let criteria = &args[0];
        let mut result = Collection::empty();
        for (index, item) in context.input.iter().enumerate() {
            let matched = context.evaluator.evaluate_for_item(criteria, item, index)?;
            if criteria_result(&matched, self.name())? == Some(true) {
                result.push(item.clone());
            }
        }
        trace!("where kept {} of {} items", result.len(), context.input.len());
        Ok(result)
    }
}

/// select(projection): the flattened projection of every item
pub struct SelectFunction;

impl LambdaOperation for SelectFunction {
    fn name(&self) -> &'static str {
        "select"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "select",
                vec![ParameterType::Lambda],
                ValueType::Collection,
                FunctionCategory::Lambda,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[ExpressionNode], context: &OperationContext<'_>) -> Result<Collection> {
        let projection = &args[0];
        let mut result = Collection::empty();
        for (index, item) in context.input.iter().enumerate() {
            result.extend(context.evaluator.evaluate_for_item(projection, item, index)?);
        }
        Ok(result)
    }
}

/// all(criteria): true if `criteria` is true for every item; vacuously true
pub struct AllFunction;

impl LambdaOperation for AllFunction {
    fn name(&self) -> &'static str {
        "all"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "all",
                vec![ParameterType::Lambda],
                ValueType::Boolean,
                FunctionCategory::Lambda,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[ExpressionNode], context: &OperationContext<'_>) -> Result<Collection> {
        let criteria = &args[0];
        for (index, item) in context.input.iter().enumerate() {
            let result = context.evaluator.evaluate_for_item(criteria, item, index)?;
            if criteria_result(&result, self.name())? != Some(true) {
                return Ok(Collection::boolean(false));
            }
        }
        Ok(Collection::boolean(true))
    }
}
