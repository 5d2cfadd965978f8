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

//! trace(name [, projection])

use std::sync::LazyLock;

use log::info;

use crate::ast::ExpressionNode;
use crate::core::Result;
use crate::model::Collection;
use crate::registry::signature::{FunctionCategory, FunctionSignature, ParameterType, ValueType};
use crate::registry::traits::{LambdaOperation, OperationContext};

use super::string_input;

/// Logs the input (or a projection of it) under `fhirpath::trace` and returns the input unchanged
pub struct TraceFunction;

impl LambdaOperation for TraceFunction {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "trace",
                vec![ParameterType::String],
                ValueType::Collection,
                FunctionCategory::Utility,
            )
            .with_optional(vec![ParameterType::Lambda])
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[ExpressionNode], context: &OperationContext<'_>) -> Result<Collection> {
        let label = context.evaluator.evaluate_in_scope(&args[0])?;
        let label = string_input(&label, self.name())?.unwrap_or_default().to_string();

        let shown = match args.get(1) {
            Some(projection) => {
                let mut projected = Collection::empty();
                for (index, item) in context.input.iter().enumerate() {
                    projected.extend(context.evaluator.evaluate_for_item(projection, item, index)?);
                }
                projected
            }
            None => context.input.clone(),
        };

        info!(target: "fhirpath::trace", "{label}: [{}]", shown.to_strings().join(", "));
        Ok(context.input.clone())
    }
}
