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

//! Tree functions: `resolve()`, `children()` and `descendants()`

use std::sync::LazyLock;

use log::debug;

use crate::core::Result;
use crate::evaluator::navigation::{all_children, all_descendants};
use crate::model::{Collection, FhirPathValue};
use crate::registry::signature::{FunctionCategory, FunctionSignature, ValueType};
use crate::registry::traits::{OperationContext, SyncOperation};

/// Reference text carried by `value`: a string primitive, or the `reference`
/// child of a Reference element
pub(crate) fn reference_text(value: &FhirPathValue) -> Option<String> {
    match value {
        FhirPathValue::Primitive(_) => value.as_string().map(str::to_string),
        FhirPathValue::Complex(node) => node
            .children("reference")
            .first()
            .and_then(FhirPathValue::as_string)
            .map(str::to_string),
    }
}

/// resolve(): the targets of the references in the input; unresolved ones are dropped
pub struct SimpleResolveFunction;

impl SyncOperation for SimpleResolveFunction {
    fn name(&self) -> &'static str {
        "resolve"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("resolve", ValueType::Collection, FunctionCategory::Navigation)
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let mut resolved = Collection::empty();
        for item in context.input.iter() {
            let Some(reference) = reference_text(item) else {
                continue;
            };
            match context.evaluator.resolve_reference(&reference) {
                Some(target) => resolved.push(target),
                None => debug!("unresolved reference '{reference}' dropped"),
            }
        }
        Ok(resolved)
    }
}

/// children(): every direct child of every input item
pub struct SimpleChildrenFunction;

impl SyncOperation for SimpleChildrenFunction {
    fn name(&self) -> &'static str {
        "children"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("children", ValueType::Collection, FunctionCategory::Navigation)
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        Ok(context.input.iter().flat_map(all_children).collect())
    }
}

/// descendants(): children, recursively, in document order
pub struct SimpleDescendantsFunction;

impl SyncOperation for SimpleDescendantsFunction {
    fn name(&self) -> &'static str {
        "descendants"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args(
                "descendants",
                ValueType::Collection,
                FunctionCategory::Navigation,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        Ok(context.input.iter().flat_map(all_descendants).collect())
    }
}
