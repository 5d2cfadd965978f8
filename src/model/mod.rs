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

//! Value model and type metadata

pub mod node;
pub mod provider;
pub mod quantity;
pub mod system_types;
pub mod type_registry;
pub mod value;

pub use node::{ComplexNode, ElementNode};
pub use provider::{
    EmptyModelProvider, InMemoryModelProvider, ModelProvider, TypeDescriptor, TypeKind,
};
pub use quantity::Quantity;
pub use type_registry::{ResolvedType, TypeRegistry};
pub use value::{Collection, FhirPathValue, PrimitiveNode, PrimitiveValue, TypeNamespace};
