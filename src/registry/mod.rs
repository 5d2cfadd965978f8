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

//! Function library: operation traits, signatures and the standard catalog

pub mod function_registry;
pub mod operations;
pub mod signature;
pub mod traits;

pub use function_registry::{FunctionRegistry, Operation, create_standard_registry};
pub use signature::{
    CardinalityRequirement, FunctionCategory, FunctionSignature, ParameterType, ValueType,
};
pub use traits::{ExpressionEvaluator, LambdaOperation, OperationContext, SyncOperation};
