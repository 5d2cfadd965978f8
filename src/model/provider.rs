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

//! Model provider: type metadata supplied by the record model
//!
//! The engine only needs to know which type names exist, whether a type is a
//! primitive, a complex datatype or a resource, and what it derives from.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{FhirPathError, Result};

/// Classification of a model type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// Primitive datatype
    Primitive,
    /// Complex datatype or backbone element
    Complex,
    /// Resource type
    Resource,
}

/// Metadata for one model type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    /// Type name
    pub name: String,
    /// Classification
    pub kind: TypeKind,
    /// Direct base type
    #[serde(default)]
    pub base_type: Option<String>,
    /// Whether the type can only appear through a subtype
    #[serde(default)]
    pub is_abstract: bool,
}

impl TypeDescriptor {
    /// Concrete resource type deriving from `DomainResource`
    pub fn resource(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Resource,
            base_type: Some("DomainResource".to_string()),
            is_abstract: false,
        }
    }

    /// Complex datatype deriving from `Element`
    pub fn complex(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Complex,
            base_type: Some("Element".to_string()),
            is_abstract: false,
        }
    }

    /// Override the base type
    pub fn with_base(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = Some(base_type.into());
        self
    }

    fn abstract_type(name: &str, kind: TypeKind, base_type: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            base_type: base_type.map(str::to_string),
            is_abstract: true,
        }
    }
}

/// Source of type metadata for the record model
pub trait ModelProvider: Send + Sync + fmt::Debug {
    /// Look up a type by name
    fn resolve_type(&self, name: &str) -> Option<&TypeDescriptor>;

    /// Direct base type of `name`
    fn base_type(&self, name: &str) -> Option<&str> {
        self.resolve_type(name)
            .and_then(|descriptor| descriptor.base_type.as_deref())
    }

    /// Whether `child` is `parent` or derives from it
    fn is_subtype_of(&self, child: &str, parent: &str) -> bool {
        let mut current = Some(child);
        // Hierarchies from metadata may be cyclic.
        for _ in 0..64 {
            match current {
                Some(name) if name == parent => return true,
                Some(name) => current = self.base_type(name),
                None => return false,
            }
        }
        false
    }

    /// Whether `name` is a resource type
    fn is_resource_type(&self, name: &str) -> bool {
        self.resolve_type(name)
            .is_some_and(|descriptor| descriptor.kind == TypeKind::Resource)
    }
}

/// Provider that knows no model types; only System and FHIR primitive types resolve
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyModelProvider;

impl ModelProvider for EmptyModelProvider {
    fn resolve_type(&self, _name: &str) -> Option<&TypeDescriptor> {
        None
    }
}

/// Provider backed by an in-memory table of type descriptors
#[derive(Debug, Clone)]
pub struct InMemoryModelProvider {
    types: FxHashMap<String, TypeDescriptor>,
}

impl InMemoryModelProvider {
    /// Provider holding the abstract base hierarchy
    /// (`Base`, `Element`, `BackboneElement`, `Resource`, `DomainResource`)
    pub fn new() -> Self {
        let mut provider = Self {
            types: FxHashMap::default(),
        };
        provider.add_type(TypeDescriptor::abstract_type("Base", TypeKind::Complex, None));
        provider.add_type(TypeDescriptor::abstract_type(
            "Element",
            TypeKind::Complex,
            Some("Base"),
        ));
        provider.add_type(TypeDescriptor::complex("BackboneElement"));
        provider.add_type(TypeDescriptor::abstract_type(
            "Resource",
            TypeKind::Resource,
            Some("Base"),
        ));
        provider.add_type(TypeDescriptor::abstract_type(
            "DomainResource",
            TypeKind::Resource,
            Some("Resource"),
        ));
        provider
    }

    /// Provider from a JSON array of type descriptors, on top of the base hierarchy
    ///
    /// ```json
    /// [{"name": "Patient", "kind": "resource", "baseType": "DomainResource"}]
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let descriptors: Vec<TypeDescriptor> = serde_json::from_str(json).map_err(|e| {
            FhirPathError::evaluation_error(format!("invalid type metadata: {e}"))
        })?;
        let mut provider = Self::new();
        for descriptor in descriptors {
            provider.add_type(descriptor);
        }
        Ok(provider)
    }

    /// Register a type, replacing any previous descriptor of the same name
    pub fn add_type(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    /// Builder form of [`Self::add_type`]
    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.add_type(descriptor);
        self
    }

    /// Register several resource types at once
    pub fn with_resources<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        for name in names {
            self.add_type(TypeDescriptor::resource(name));
        }
        self
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for InMemoryModelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelProvider for InMemoryModelProvider {
    fn resolve_type(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtype_chain() {
        let provider = InMemoryModelProvider::new()
            .with_resources(["Patient"])
            .with_type(TypeDescriptor::complex("HumanName"));

        assert!(provider.is_subtype_of("Patient", "Patient"));
        assert!(provider.is_subtype_of("Patient", "DomainResource"));
        assert!(provider.is_subtype_of("Patient", "Resource"));
        assert!(!provider.is_subtype_of("HumanName", "Resource"));
        assert!(provider.is_resource_type("Patient"));
        assert!(!provider.is_resource_type("HumanName"));
    }

    #[test]
    fn test_from_json_str() {
        let provider = InMemoryModelProvider::from_json_str(
            r#"[
                {"name": "Observation", "kind": "resource", "baseType": "DomainResource"},
                {"name": "Reference", "kind": "complex", "baseType": "Element"},
                {"name": "Shape", "kind": "complex", "isAbstract": true}
            ]"#,
        )
        .unwrap();

        let observation = provider.resolve_type("Observation").unwrap();
        assert_eq!(observation.kind, TypeKind::Resource);
        assert!(provider.is_subtype_of("Reference", "Base"));
        assert!(provider.resolve_type("Shape").unwrap().is_abstract);
        assert_eq!(provider.len(), 8);
    }

    #[test]
    fn test_from_json_str_rejects_malformed_metadata() {
        let err = InMemoryModelProvider::from_json_str(r#"[{"name": "X"}]"#).unwrap_err();
        assert!(err.to_string().contains("invalid type metadata"));
    }

    #[test]
    fn test_empty_provider() {
        assert!(EmptyModelProvider.resolve_type("Patient").is_none());
        assert!(!EmptyModelProvider.is_subtype_of("Patient", "Resource"));
        assert!(EmptyModelProvider.is_subtype_of("Patient", "Patient"));
    }
}
