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

//! Type functions: `is(T)`, `as(T)` and `ofType(T)`
//!
//! The argument is a type name, never evaluated. It is resolved through the
//! engine's [`TypeRegistry`](crate::model::TypeRegistry); an unknown name is an
//! `UnknownType` error.

use std::sync::LazyLock;

use crate::ast::ExpressionNode;
use crate::core::{FhirPathError, Result};
use crate::model::{Collection, ResolvedType};
use crate::registry::signature::{FunctionCategory, FunctionSignature, ParameterType, ValueType};
use crate::registry::traits::{LambdaOperation, OperationContext};

fn resolve_argument(
    function: &str,
    args: &[ExpressionNode],
    context: &OperationContext<'_>,
) -> Result<ResolvedType> {
    let specifier = args
        .first()
        .and_then(ExpressionNode::as_type_specifier)
        .ok_or_else(|| {
            FhirPathError::evaluation_error(format!("{function}() expects a type name argument"))
        })?;
    context.types().resolve(&specifier)
}

/// Keep the items whose type is `target` or a subtype of it
pub(crate) fn filter_by_type(
    input: &Collection,
    target: &ResolvedType,
    context: &OperationContext<'_>,
) -> Collection {
    input
        .iter()
        .filter(|item| context.types().matches(item, target))
        .cloned()
        .collect()
}

/// is(T): whether the single input item is of type T
pub struct IsFunction;

impl LambdaOperation for IsFunction {
    fn name(&self) -> &'static str {
        "is"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "is",
                vec![ParameterType::TypeSpecifier],
                ValueType::Boolean,
                FunctionCategory::Type,
            )
            .scalar_input()
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[ExpressionNode], context: &OperationContext<'_>) -> Result<Collection> {
        let target = resolve_argument(self.name(), args, context)?;
        Ok(match context.input.singleton(self.name())? {
            Some(item) => Collection::boolean(context.types().matches(item, &target)),
            None => Collection::empty(),
        })
    }
}

/// as(T): the input items of type T; a mismatch yields empty, never an error
pub struct AsFunction;

impl LambdaOperation for AsFunction {
    fn name(&self) -> &'static str {
        "as"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "as",
                vec![ParameterType::TypeSpecifier],
                ValueType::Collection,
                FunctionCategory::Type,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[ExpressionNode], context: &OperationContext<'_>) -> Result<Collection> {
        let target = resolve_argument(self.name(), args, context)?;
        Ok(filter_by_type(context.input, &target, context))
    }
}

/// ofType(T): the input items of type T
pub struct OfTypeFunction;

impl LambdaOperation for OfTypeFunction {
    fn name(&self) -> &'static str {
        "ofType"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "ofType",
                vec![ParameterType::TypeSpecifier],
                ValueType::Collection,
                FunctionCategory::Type,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[ExpressionNode], context: &OperationContext<'_>) -> Result<Collection> {
        let target = resolve_argument(self.name(), args, context)?;
        Ok(filter_by_type(context.input, &target, context))
    }
}
