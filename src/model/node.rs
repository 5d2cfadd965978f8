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

//! Complex node capability and the in-memory element tree
//!
//! The engine never knows what a `Patient` is. It reads any tree through
//! [`ComplexNode`]: a type name, children by field name, and an id. Callers with
//! their own record model implement the trait; [`ElementNode`] is the ready-made
//! implementation used by tests and by callers that build trees in code.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use super::value::{FhirPathValue, PrimitiveNode, PrimitiveValue, TypeNamespace};

/// Read-only view of a complex element or resource
pub trait ComplexNode: fmt::Debug + Send + Sync {
    /// Declared type name, e.g. `Patient` or `HumanName`
    fn type_name(&self) -> &str;

    /// Namespace of the type name
    fn namespace(&self) -> TypeNamespace {
        TypeNamespace::Fhir
    }

    /// Children under `name`, in document order; empty when the field is absent
    fn children(&self, name: &str) -> Vec<FhirPathValue>;

    /// Names of the fields that are present, in document order
    fn field_names(&self) -> Vec<String>;

    /// Element or resource id
    fn id(&self) -> Option<String> {
        self.children("id")
            .first()
            .and_then(|id| id.as_string().map(str::to_string))
    }
}

/// In-memory complex node with insertion-ordered fields
#[derive(Debug, Clone)]
pub struct ElementNode {
    type_name: String,
    namespace: TypeNamespace,
    fields: IndexMap<String, Vec<FhirPathValue>>,
}

impl ElementNode {
    /// Create an element of the given FHIR type with no fields
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            namespace: TypeNamespace::Fhir,
            fields: IndexMap::new(),
        }
    }

    /// Append one child under `name`
    pub fn with_child(mut self, name: impl Into<String>, child: impl Into<FhirPathValue>) -> Self {
        self.push_child(name, child);
        self
    }

    /// Append several children under `name`
    pub fn with_children<I, V>(mut self, name: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FhirPathValue>,
    {
        let entry = self.fields.entry(name.into()).or_default();
        entry.extend(children.into_iter().map(Into::into));
        self
    }

    /// Append a FHIR primitive child with a value
    pub fn with_primitive(
        self,
        name: impl Into<String>,
        fhir_type: &str,
        value: PrimitiveValue,
    ) -> Self {
        self.with_child(name, PrimitiveNode::fhir(fhir_type, value))
    }

    /// Append a FHIR `string` child
    pub fn with_string(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_primitive(name, "string", PrimitiveValue::String(value.into()))
    }

    /// Append a child in place
    pub fn push_child(&mut self, name: impl Into<String>, child: impl Into<FhirPathValue>) {
        self.fields.entry(name.into()).or_default().push(child.into());
    }

    /// Wrap into a shareable value
    pub fn into_value(self) -> FhirPathValue {
        FhirPathValue::Complex(Arc::new(self))
    }
}

impl From<ElementNode> for FhirPathValue {
    fn from(node: ElementNode) -> Self {
        node.into_value()
    }
}

impl ComplexNode for ElementNode {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn namespace(&self) -> TypeNamespace {
        self.namespace
    }

    fn children(&self, name: &str) -> Vec<FhirPathValue> {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}
