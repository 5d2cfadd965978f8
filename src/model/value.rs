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

//! Values flowing through the engine
//!
//! Every node is either a primitive or a complex element. Primitives carry an
//! optional scalar: `None` is an element that is present in the record but has
//! no value, which the engine treats exactly like an absent element.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::node::ComplexNode;
use super::quantity::Quantity;
use crate::core::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use crate::core::{FhirPathError, Result};

/// Namespace a type name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeNamespace {
    /// FHIRPath system types (`System.String`, ...)
    System,
    /// Types defined by the record model (`FHIR.string`, `FHIR.Patient`, ...)
    Fhir,
}

impl fmt::Display for TypeNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "System"),
            Self::Fhir => write!(f, "FHIR"),
        }
    }
}

/// A scalar value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveValue {
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Decimal value
    Decimal(Decimal),
    /// String value
    String(String),
    /// Date with precision
    Date(PrecisionDate),
    /// Date and time with precision and optional offset
    DateTime(PrecisionDateTime),
    /// Time of day with precision
    Time(PrecisionTime),
    /// Quantity with unit
    Quantity(Quantity),
}

impl PrimitiveValue {
    /// The System type this scalar belongs to
    pub fn system_type(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Decimal(_) => "Decimal",
            Self::String(_) => "String",
            Self::Date(_) => "Date",
            Self::DateTime(_) => "DateTime",
            Self::Time(_) => "Time",
            Self::Quantity(_) => "Quantity",
        }
    }

    /// Textual form, as `toString()` renders it
    pub fn to_fhirpath_string(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Decimal(d) => d.to_string(),
            Self::String(s) => s.clone(),
            Self::Date(d) => d.to_string(),
            Self::DateTime(dt) => dt.to_string(),
            Self::Time(t) => t.to_string(),
            Self::Quantity(q) => q.to_string(),
        }
    }
}

/// A primitive node: a typed, possibly empty scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveNode {
    /// Namespace of `type_name`
    pub namespace: TypeNamespace,
    /// Type name, e.g. `String` (System) or `code` (FHIR)
    pub type_name: String,
    /// The scalar, absent for declared-but-empty elements
    pub value: Option<PrimitiveValue>,
    /// Element id, if the record carries one
    pub id: Option<String>,
}

impl PrimitiveNode {
    /// A System-typed value, as produced by literals and operators
    pub fn system(value: PrimitiveValue) -> Self {
        Self {
            namespace: TypeNamespace::System,
            type_name: value.system_type().to_string(),
            value: Some(value),
            id: None,
        }
    }

    /// A FHIR-typed primitive element with a value
    pub fn fhir(type_name: impl Into<String>, value: PrimitiveValue) -> Self {
        Self {
            namespace: TypeNamespace::Fhir,
            type_name: type_name.into(),
            value: Some(value),
            id: None,
        }
    }

    /// A FHIR-typed primitive element that carries no value
    pub fn empty_fhir(type_name: impl Into<String>) -> Self {
        Self {
            namespace: TypeNamespace::Fhir,
            type_name: type_name.into(),
            value: None,
            id: None,
        }
    }

    /// Attach an element id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Check whether the element carries a value
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// A node in the evaluated tree
#[derive(Debug, Clone)]
pub enum FhirPathValue {
    /// Scalar node
    Primitive(PrimitiveNode),
    /// Complex element or resource, supplied by the caller's model adapter
    Complex(Arc<dyn ComplexNode>),
}

impl FhirPathValue {
    /// System boolean
    pub fn boolean(value: bool) -> Self {
        Self::Primitive(PrimitiveNode::system(PrimitiveValue::Boolean(value)))
    }

    /// System integer
    pub fn integer(value: i64) -> Self {
        Self::Primitive(PrimitiveNode::system(PrimitiveValue::Integer(value)))
    }

    /// System decimal
    pub fn decimal(value: Decimal) -> Self {
        Self::Primitive(PrimitiveNode::system(PrimitiveValue::Decimal(value)))
    }

    /// System string
    pub fn string(value: impl Into<String>) -> Self {
        Self::Primitive(PrimitiveNode::system(PrimitiveValue::String(value.into())))
    }

    /// System-typed value from any scalar
    pub fn system(value: PrimitiveValue) -> Self {
        Self::Primitive(PrimitiveNode::system(value))
    }

    /// Wrap a complex node
    pub fn complex(node: impl ComplexNode + 'static) -> Self {
        Self::Complex(Arc::new(node))
    }

    /// Type name without namespace
    pub fn type_name(&self) -> &str {
        match self {
            Self::Primitive(p) => &p.type_name,
            Self::Complex(c) => c.type_name(),
        }
    }

    /// Namespace of the type name
    pub fn namespace(&self) -> TypeNamespace {
        match self {
            Self::Primitive(p) => p.namespace,
            Self::Complex(c) => c.namespace(),
        }
    }

    /// Namespace-qualified type name, e.g. `FHIR.Patient`
    pub fn qualified_type_name(&self) -> String {
        format!("{}.{}", self.namespace(), self.type_name())
    }

    /// Scalar value of a primitive node that carries one
    pub fn as_primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            Self::Primitive(p) => p.value.as_ref(),
            Self::Complex(_) => None,
        }
    }

    /// The complex node, if this is one
    pub fn as_complex(&self) -> Option<&Arc<dyn ComplexNode>> {
        match self {
            Self::Complex(c) => Some(c),
            Self::Primitive(_) => None,
        }
    }

    /// String scalar
    pub fn as_string(&self) -> Option<&str> {
        match self.as_primitive() {
            Some(PrimitiveValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Boolean scalar
    pub fn as_boolean(&self) -> Option<bool> {
        match self.as_primitive() {
            Some(PrimitiveValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Integer scalar
    pub fn as_integer(&self) -> Option<i64> {
        match self.as_primitive() {
            Some(PrimitiveValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Check whether this node holds a value: complex nodes always do
    pub fn has_value(&self) -> bool {
        match self {
            Self::Primitive(p) => p.has_value(),
            Self::Complex(_) => true,
        }
    }

    /// Element or resource id
    pub fn id(&self) -> Option<String> {
        match self {
            Self::Primitive(p) => p.id.clone(),
            Self::Complex(c) => c.id(),
        }
    }

    /// Children of a complex node under `name`; primitives have none
    pub fn children(&self, name: &str) -> Vec<FhirPathValue> {
        match self {
            Self::Complex(c) => c.children(name),
            Self::Primitive(_) => Vec::new(),
        }
    }

    /// Textual form of a primitive that carries a value
    pub fn to_fhirpath_string(&self) -> Option<String> {
        self.as_primitive().map(PrimitiveValue::to_fhirpath_string)
    }
}

impl From<PrimitiveNode> for FhirPathValue {
    fn from(node: PrimitiveNode) -> Self {
        Self::Primitive(node)
    }
}

impl From<PrimitiveValue> for FhirPathValue {
    fn from(value: PrimitiveValue) -> Self {
        Self::system(value)
    }
}

/// Structural equality of trees: primitives by type and value, complex nodes field
/// by field. Not the FHIRPath `=` operator, which lives in the evaluator.
impl PartialEq for FhirPathValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Primitive(a), Self::Primitive(b)) => a == b,
            (Self::Complex(a), Self::Complex(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let fields = a.field_names();
                a.type_name() == b.type_name()
                    && a.namespace() == b.namespace()
                    && fields == b.field_names()
                    && fields.iter().all(|name| a.children(name) == b.children(name))
            }
            _ => false,
        }
    }
}

impl fmt::Display for FhirPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => match &p.value {
                Some(value) => write!(f, "{}", value.to_fhirpath_string()),
                None => write!(f, "<empty {}>", p.type_name),
            },
            Self::Complex(c) => write!(f, "{}", c.type_name()),
        }
    }
}

/// Ordered collection of nodes: the result of every expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection(Vec<FhirPathValue>);

impl Collection {
    /// Empty collection
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Collection holding one value
    pub fn single(value: FhirPathValue) -> Self {
        Self(vec![value])
    }

    /// Collection from a vector
    pub fn from_vec(values: Vec<FhirPathValue>) -> Self {
        Self(values)
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the items in order
    pub fn iter(&self) -> std::slice::Iter<'_, FhirPathValue> {
        self.0.iter()
    }

    /// Borrow the items
    pub fn as_slice(&self) -> &[FhirPathValue] {
        &self.0
    }

    /// Take the items
    pub fn into_vec(self) -> Vec<FhirPathValue> {
        self.0
    }

    /// Append an item
    pub fn push(&mut self, value: FhirPathValue) {
        self.0.push(value);
    }

    /// First item
    pub fn first(&self) -> Option<&FhirPathValue> {
        self.0.first()
    }

    /// Item at `index`
    pub fn get(&self, index: usize) -> Option<&FhirPathValue> {
        self.0.get(index)
    }

    /// The single item, `None` when empty, an error when there are several
    pub fn singleton(&self, context: &str) -> Result<Option<&FhirPathValue>> {
        match self.0.as_slice() {
            [] => Ok(None),
            [item] => Ok(Some(item)),
            items => Err(FhirPathError::singleton_expected(context, items.len())),
        }
    }

    /// Boolean collection `[value]`
    pub fn boolean(value: bool) -> Self {
        Self::single(FhirPathValue::boolean(value))
    }

    /// Boolean collection, or empty for an unknown result
    pub fn from_option_bool(value: Option<bool>) -> Self {
        value.map(Self::boolean).unwrap_or_default()
    }

    /// Textual forms of the primitive items, for tests and diagnostics
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|v| v.to_string()).collect()
    }
}

impl From<Vec<FhirPathValue>> for Collection {
    fn from(values: Vec<FhirPathValue>) -> Self {
        Self(values)
    }
}

impl From<FhirPathValue> for Collection {
    fn from(value: FhirPathValue) -> Self {
        Self::single(value)
    }
}

impl FromIterator<FhirPathValue> for Collection {
    fn from_iter<I: IntoIterator<Item = FhirPathValue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Collection {
    type Item = FhirPathValue;
    type IntoIter = std::vec::IntoIter<FhirPathValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a FhirPathValue;
    type IntoIter = std::slice::Iter<'a, FhirPathValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Extend<FhirPathValue> for Collection {
    fn extend<I: IntoIterator<Item = FhirPathValue>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::ElementNode;

    #[test]
    fn test_primitive_rendering_keeps_precision() {
        let received = PrimitiveNode::fhir(
            "dateTime",
            PrimitiveValue::DateTime(PrecisionDateTime::parse("2011-01-01").unwrap()),
        );
        let value = FhirPathValue::from(received);
        assert_eq!(value.to_fhirpath_string().as_deref(), Some("2011-01-01"));
        assert_eq!(value.qualified_type_name(), "FHIR.dateTime");
    }

    #[test]
    fn test_empty_primitive_has_no_value() {
        let value = FhirPathValue::from(PrimitiveNode::empty_fhir("boolean"));
        assert!(!value.has_value());
        assert_eq!(value.as_boolean(), None);
        assert_eq!(value.to_fhirpath_string(), None);
    }

    #[test]
    fn test_structural_equality() {
        let name = |family: &str| {
            FhirPathValue::complex(ElementNode::new("HumanName").with_string("family", family))
        };
        assert_eq!(name("Doe"), name("Doe"));
        assert_ne!(name("Doe"), name("Roe"));
        assert_ne!(name("Doe"), FhirPathValue::complex(ElementNode::new("Address")));

        let fhir = FhirPathValue::from(PrimitiveNode::fhir(
            "string",
            PrimitiveValue::String("Doe".to_string()),
        ));
        assert_ne!(fhir, FhirPathValue::string("Doe"));
        assert_eq!(
            Collection::from_vec(vec![FhirPathValue::integer(1), name("Doe")]),
            Collection::from_vec(vec![FhirPathValue::integer(1), name("Doe")])
        );
    }

    #[test]
    fn test_singleton() {
        let patient = FhirPathValue::complex(ElementNode::new("Patient"));
        let one = Collection::single(patient.clone());
        assert!(one.singleton("test").unwrap().is_some());
        assert!(Collection::empty().singleton("test").unwrap().is_none());

        let two = Collection::from_vec(vec![patient.clone(), patient]);
        assert_eq!(
            two.singleton("test").unwrap_err(),
            FhirPathError::singleton_expected("test", 2)
        );
    }
}
