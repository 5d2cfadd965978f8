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

//! Operation traits for the function library
//!
//! Operations come in two shapes:
//!
//! - **Sync operations**: arguments are evaluated eagerly by the engine before the
//!   call (`startsWith`, `first`, `union`, ...)
//! - **Lambda operations**: arguments arrive unevaluated and are evaluated per input
//!   item through an [`ExpressionEvaluator`] (`where`, `all`, `exists(criteria)`,
//!   `iif`, type operators)
//!
//! # Example
//! ```rust
//! use octofhir_fhirpath_engine::registry::signature::{FunctionCategory, FunctionSignature, ValueType};
//! use octofhir_fhirpath_engine::registry::traits::{OperationContext, SyncOperation};
//! use octofhir_fhirpath_engine::{Collection, FhirPathValue, Result};
//!
//! pub struct SizeFunction;
//!
//! impl SyncOperation for SizeFunction {
//!     fn name(&self) -> &'static str {
//!         "size"
//!     }
//!
//!     fn signature(&self) -> &FunctionSignature {
//!         static SIGNATURE: std::sync::LazyLock<FunctionSignature> = std::sync::LazyLock::new(|| {
//!             FunctionSignature::no_args("size", ValueType::Integer, FunctionCategory::Collection)
//!         });
//!         &SIGNATURE
//!     }
//!
//!     fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
//!         Ok(Collection::single(FhirPathValue::integer(context.input.len() as i64)))
//!     }
//! }
//! ```

use crate::ast::ExpressionNode;
use crate::core::Result;
use crate::model::{Collection, FhirPathValue, TypeRegistry};

use super::signature::FunctionSignature;

/// Callback into the engine for operations that evaluate their own arguments
pub trait ExpressionEvaluator {
    /// Evaluate `expression` with `$this` bound to `item` and `$index` to `index`
    fn evaluate_for_item(
        &self,
        expression: &ExpressionNode,
        item: &FhirPathValue,
        index: usize,
    ) -> Result<Collection>;

    /// Evaluate `expression` in the scope the function was called from
    fn evaluate_in_scope(&self, expression: &ExpressionNode) -> Result<Collection>;

    /// Type lookups for the current engine
    fn types(&self) -> &TypeRegistry;

    /// Resolve a reference string relative to the current resources.
    /// Returns `None` when the target cannot be found.
    fn resolve_reference(&self, reference: &str) -> Option<FhirPathValue>;
}

/// Context handed to an operation
pub struct OperationContext<'a> {
    /// The collection the function was invoked on
    pub input: &'a Collection,
    /// Engine callback
    pub evaluator: &'a dyn ExpressionEvaluator,
}

impl<'a> OperationContext<'a> {
    /// Create a new operation context
    pub fn new(input: &'a Collection, evaluator: &'a dyn ExpressionEvaluator) -> Self {
        Self { input, evaluator }
    }

    /// Type lookups for the current engine
    pub fn types(&self) -> &TypeRegistry {
        self.evaluator.types()
    }
}

/// Trait for operations whose arguments are evaluated before the call
pub trait SyncOperation: Send + Sync {
    /// Operation name (e.g., "length", "count", "upper")
    fn name(&self) -> &'static str;

    /// Function signature with parameter and return type information
    fn signature(&self) -> &FunctionSignature;

    /// Execute the operation
    ///
    /// # Arguments
    /// * `args` - Evaluated argument collections, one per argument expression
    /// * `context` - Input collection and engine access
    ///
    /// # Errors
    /// Returns FhirPathError for type mismatches or singleton violations
    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection>;
}

/// Trait for operations that receive their argument expressions unevaluated
pub trait LambdaOperation: Send + Sync {
    /// Operation name (e.g., "where", "all")
    fn name(&self) -> &'static str;

    /// Function signature with parameter and return type information
    fn signature(&self) -> &FunctionSignature;

    /// Execute the operation, evaluating `args` through `context.evaluator` as needed
    fn execute(
        &self,
        args: &[ExpressionNode],
        context: &OperationContext<'_>,
    ) -> Result<Collection>;
}
