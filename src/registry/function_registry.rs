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

//! Closed function registry
//!
//! The catalog is fixed when the registry is built: lookups never mutate it, so
//! one registry is shared read-only by every evaluation.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::operations::*;
use super::signature::FunctionSignature;
use super::traits::{LambdaOperation, SyncOperation};

/// A registered operation
#[derive(Clone)]
pub enum Operation {
    /// Arguments evaluated before the call
    Sync(Arc<dyn SyncOperation>),
    /// Arguments passed unevaluated
    Lambda(Arc<dyn LambdaOperation>),
}

impl Operation {
    /// Operation name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sync(op) => op.name(),
            Self::Lambda(op) => op.name(),
        }
    }

    /// Operation signature
    pub fn signature(&self) -> &FunctionSignature {
        match self {
            Self::Sync(op) => op.signature(),
            Self::Lambda(op) => op.signature(),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(op) => write!(f, "Sync({})", op.name()),
            Self::Lambda(op) => write!(f, "Lambda({})", op.name()),
        }
    }
}

/// Name-indexed function catalog
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    operations: FxHashMap<&'static str, Operation>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an eager operation, replacing any operation of the same name
    pub fn register_sync(&mut self, operation: impl SyncOperation + 'static) {
        self.operations
            .insert(operation.name(), Operation::Sync(Arc::new(operation)));
    }

    /// Register a lambda operation, replacing any operation of the same name
    pub fn register_lambda(&mut self, operation: impl LambdaOperation + 'static) {
        self.operations
            .insert(operation.name(), Operation::Lambda(Arc::new(operation)));
    }

    /// Look up an operation by name
    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    /// Check if a function is registered
    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Registered function names, sorted
    pub fn function_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.operations.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Build the registry holding the standard function catalog
pub fn create_standard_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();

    // collection
    registry.register_sync(SimpleEmptyFunction);
    registry.register_sync(SimpleFirstFunction);
    registry.register_sync(SimpleLastFunction);
    registry.register_sync(SimpleTailFunction);
    registry.register_sync(SimpleSkipFunction);
    registry.register_sync(SimpleTakeFunction);
    registry.register_sync(SimpleSingleFunction);
    registry.register_sync(SimpleCountFunction);
    registry.register_sync(SimpleDistinctFunction);
    registry.register_sync(SimpleIsDistinctFunction);
    registry.register_sync(SimpleUnionFunction);
    registry.register_sync(SimpleCombineFunction);

    // filtering and projection
    registry.register_lambda(ExistsFunction);
    registry.register_lambda(WhereFunction);
    registry.register_lambda(SelectFunction);
    registry.register_lambda(AllFunction);

    // logic
    registry.register_sync(SimpleNotFunction);
    registry.register_sync(SimpleAllTrueFunction);
    registry.register_sync(SimpleAnyTrueFunction);
    registry.register_sync(SimpleHasValueFunction);
    registry.register_lambda(IifFunction);

    // types
    registry.register_lambda(IsFunction);
    registry.register_lambda(AsFunction);
    registry.register_lambda(OfTypeFunction);

    // strings
    registry.register_sync(SimpleStartsWithFunction);
    registry.register_sync(SimpleEndsWithFunction);
    registry.register_sync(SimpleContainsFunction);
    registry.register_sync(SimpleIndexOfFunction);
    registry.register_sync(SimpleLengthFunction);
    registry.register_sync(SimpleUpperFunction);
    registry.register_sync(SimpleLowerFunction);
    registry.register_sync(SimpleSubstringFunction);
    registry.register_sync(SimpleMatchesFunction);
    registry.register_sync(SimpleReplaceFunction);
    registry.register_sync(SimpleReplaceMatchesFunction);

    // conversion
    registry.register_sync(SimpleToStringFunction);
    registry.register_sync(SimpleToIntegerFunction);
    registry.register_sync(SimpleToDecimalFunction);

    // tree
    registry.register_sync(SimpleResolveFunction);
    registry.register_sync(SimpleChildrenFunction);
    registry.register_sync(SimpleDescendantsFunction);

    registry.register_lambda(TraceFunction);

    registry
}
