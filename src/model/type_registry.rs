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

//! Type registry: resolves type specifiers and tests values against them

use std::fmt;
use std::sync::Arc;

use super::provider::{ModelProvider, TypeKind};
use super::system_types::{fhir_primitive, is_primitive_subtype, is_system_type, system_type_for};
use super::value::{FhirPathValue, TypeNamespace};
use crate::ast::TypeSpecifier;
use crate::core::{FhirPathError, Result};

/// A type specifier after resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedType {
    /// Namespace the name was found in
    pub namespace: TypeNamespace,
    /// Type name
    pub name: String,
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Type lookups combining the built-in tables with the model provider
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    provider: Arc<dyn ModelProvider>,
}

impl TypeRegistry {
    /// Create a registry over `provider`
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    /// The underlying model provider
    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    fn fhir_type_exists(&self, name: &str) -> bool {
        fhir_primitive(name).is_some() || self.provider.resolve_type(name).is_some()
    }

    /// Resolve a type specifier. Unqualified names are tried in the FHIR namespace
    /// first and then in System.
    pub fn resolve(&self, specifier: &TypeSpecifier) -> Result<ResolvedType> {
        let found = match specifier.namespace.as_deref() {
            Some("System") => is_system_type(&specifier.name).then_some(TypeNamespace::System),
            Some("FHIR") => self
                .fhir_type_exists(&specifier.name)
                .then_some(TypeNamespace::Fhir),
            Some(_) => None,
            None => {
                if self.fhir_type_exists(&specifier.name) {
                    Some(TypeNamespace::Fhir)
                } else if is_system_type(&specifier.name) {
                    Some(TypeNamespace::System)
                } else {
                    None
                }
            }
        };

        match found {
            Some(namespace) => Ok(ResolvedType {
                namespace,
                name: specifier.name.clone(),
            }),
            None => Err(FhirPathError::UnknownType {
                type_name: specifier.to_string(),
            }),
        }
    }

    /// Whether FHIR type `child` is `parent` or derives from it
    pub fn is_subtype_of(&self, child: &str, parent: &str) -> bool {
        if fhir_primitive(child).is_some() {
            return is_primitive_subtype(child, parent);
        }
        self.provider.is_subtype_of(child, parent)
    }

    /// Classify a FHIR type name
    pub fn kind_of(&self, name: &str) -> Option<TypeKind> {
        if fhir_primitive(name).is_some() {
            return Some(TypeKind::Primitive);
        }
        self.provider.resolve_type(name).map(|descriptor| descriptor.kind)
    }

    /// Whether `value`'s runtime type is `target` or one of its subtypes.
    /// A FHIR primitive also matches the System type it carries.
    pub fn matches(&self, value: &FhirPathValue, target: &ResolvedType) -> bool {
        let type_name = value.type_name();
        match (value.namespace(), target.namespace) {
            (TypeNamespace::System, TypeNamespace::System) => type_name == target.name,
            (TypeNamespace::System, TypeNamespace::Fhir) => false,
            (TypeNamespace::Fhir, TypeNamespace::Fhir) => {
                self.is_subtype_of(type_name, &target.name)
            }
            (TypeNamespace::Fhir, TypeNamespace::System) => {
                system_type_for(type_name) == Some(target.name.as_str())
            }
        }
    }
}
