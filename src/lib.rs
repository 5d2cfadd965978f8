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

//! FHIRPath expression engine
//!
//! Evaluates FHIRPath expressions over typed, polymorphic record trees such as FHIR
//! resources. Every expression produces an ordered collection; missing data is the
//! empty collection rather than an error.
//!
//! The crate is layered the same way evaluation flows:
//!
//! - [`parser`] turns text into an [`ast::ExpressionNode`] (with an LRU-style cache)
//! - [`model`] defines the node tree, the value model and type metadata
//! - [`registry`] holds the function catalog
//! - [`evaluator`] walks the tree and resolves references
//!
//! ```rust
//! use octofhir_fhirpath_engine::{ElementNode, FhirPathEngine, FhirPathValue};
//!
//! let patient = ElementNode::new("Patient")
//!     .with_string("id", "pat1")
//!     .with_child("name", ElementNode::new("HumanName").with_string("family", "Doe"))
//!     .into_value();
//!
//! let engine = FhirPathEngine::new();
//! let names = engine.evaluate(&patient, "name.family").unwrap();
//! assert_eq!(names.to_strings(), vec!["Doe"]);
//!
//! let check = engine.evaluate(&patient, "id.exists() and name.count() = 1").unwrap();
//! assert_eq!(check.as_slice(), &[FhirPathValue::boolean(true)]);
//! ```

pub mod ast;
pub mod core;
pub mod evaluator;
pub mod model;
pub mod parser;
pub mod registry;

// Re-export main types
pub use crate::core::{FhirPathError, Result, SourceLocation};
pub use evaluator::{
    EvaluationConfig, EvaluationContext, FhirPathEngine, InMemoryReferenceResolver, ReferenceKey,
    ReferenceResolver, ResolutionScope,
};
pub use model::{
    Collection, ComplexNode, ElementNode, EmptyModelProvider, FhirPathValue,
    InMemoryModelProvider, ModelProvider, PrimitiveNode, PrimitiveValue, Quantity, TypeDescriptor,
    TypeKind, TypeRegistry,
};
pub use parser::parse_expression;
pub use registry::{FunctionRegistry, create_standard_registry};
