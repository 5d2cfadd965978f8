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

//! FHIRPath expression AST
//!
//! Nodes are immutable once parsed and carry no evaluation state, so one parsed
//! tree can be shared between threads and evaluated against any number of contexts.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::literal::LiteralValue;
use super::operator::{BinaryOperator, UnaryOperator};
use crate::core::SourceLocation;

/// The main expression node representing any FHIRPath expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionNode {
    /// Literal value (string, number, boolean, date, quantity, `{}`)
    Literal(LiteralNode),

    /// Leading path step evaluated against `$this` (e.g., "Patient", "name")
    Identifier(IdentifierNode),

    /// Function call without an explicit receiver (e.g., "exists()")
    FunctionCall(FunctionCallNode),

    /// Method call on an object (e.g., "name.first()")
    MethodCall(MethodCallNode),

    /// Property navigation (e.g., "Patient.name")
    PropertyAccess(PropertyAccessNode),

    /// Index access (e.g., "name[0]")
    IndexAccess(IndexAccessNode),

    /// Binary operation (e.g., "age > 18")
    BinaryOperation(BinaryOperationNode),

    /// Unary operation (e.g., "-5")
    UnaryOperation(UnaryOperationNode),

    /// Type cast operator (e.g., "value as String")
    TypeCast(TypeCastNode),

    /// Type check operator (e.g., "value is String")
    TypeCheck(TypeCheckNode),

    /// Variable reference (e.g., "$this", "%resource")
    Variable(VariableNode),
}

/// A possibly namespace-qualified type name (e.g., `String`, `FHIR.Patient`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeSpecifier {
    /// Namespace qualifier, `System` or `FHIR`
    pub namespace: Option<String>,
    /// Type name
    pub name: String,
}

impl TypeSpecifier {
    /// Unqualified type specifier
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Namespace-qualified type specifier
    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Literal value with source location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralNode {
    /// Literal value
    pub value: LiteralValue,
    /// Source location
    pub location: Option<SourceLocation>,
}

/// Identifier with source tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierNode {
    /// Identifier name, backticks removed
    pub name: String,
    /// Source location
    pub location: Option<SourceLocation>,
}

/// Function call with arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallNode {
    /// Function name
    pub name: String,
    /// Function arguments, unevaluated
    pub arguments: Vec<ExpressionNode>,
    /// Source location
    pub location: Option<SourceLocation>,
}

/// Method call on an object (e.g., Patient.name.first())
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCallNode {
    /// Method object
    pub object: Box<ExpressionNode>,
    /// Method name
    pub method: String,
    /// Method arguments, unevaluated
    pub arguments: Vec<ExpressionNode>,
    /// Source location
    pub location: Option<SourceLocation>,
}

/// Property access for navigation (dot notation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAccessNode {
    /// Property object
    pub object: Box<ExpressionNode>,
    /// Property name
    pub property: String,
    /// Source location
    pub location: Option<SourceLocation>,
}

/// Index access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexAccessNode {
    /// Index object
    pub object: Box<ExpressionNode>,
    /// Index expression
    pub index: Box<ExpressionNode>,
    /// Source location
    pub location: Option<SourceLocation>,
}

/// Binary operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOperationNode {
    /// Left operand
    pub left: Box<ExpressionNode>,
    /// Binary operator
    pub operator: BinaryOperator,
    /// Right operand
    pub right: Box<ExpressionNode>,
    /// Source location
    pub location: Option<SourceLocation>,
}

/// Unary operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryOperationNode {
    /// Unary operator
    pub operator: UnaryOperator,
    /// Operand expression
    pub operand: Box<ExpressionNode>,
    /// Source location
    pub location: Option<SourceLocation>,
}

/// Type cast expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCastNode {
    /// Expression to cast
    pub expression: Box<ExpressionNode>,
    /// Target type
    pub target_type: TypeSpecifier,
    /// Source location
    pub location: Option<SourceLocation>,
}

/// Type check expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCheckNode {
    /// Expression to check
    pub expression: Box<ExpressionNode>,
    /// Target type
    pub target_type: TypeSpecifier,
    /// Source location
    pub location: Option<SourceLocation>,
}

/// Which sigil introduced a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    /// `%name`: environment variable
    Environment,
    /// `$this`, `$index`, `$total`
    Special,
}

/// Variable reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableNode {
    /// Variable name without its sigil
    pub name: String,
    /// Sigil kind
    pub kind: VariableKind,
    /// Source location
    pub location: Option<SourceLocation>,
}

impl ExpressionNode {
    /// Get the source location for this node, if available
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Literal(n) => n.location.as_ref(),
            Self::Identifier(n) => n.location.as_ref(),
            Self::FunctionCall(n) => n.location.as_ref(),
            Self::MethodCall(n) => n.location.as_ref(),
            Self::PropertyAccess(n) => n.location.as_ref(),
            Self::IndexAccess(n) => n.location.as_ref(),
            Self::BinaryOperation(n) => n.location.as_ref(),
            Self::UnaryOperation(n) => n.location.as_ref(),
            Self::TypeCast(n) => n.location.as_ref(),
            Self::TypeCheck(n) => n.location.as_ref(),
            Self::Variable(n) => n.location.as_ref(),
        }
    }

    /// Set the source location for this node
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        match &mut self {
            Self::Literal(n) => n.location = Some(location),
            Self::Identifier(n) => n.location = Some(location),
            Self::FunctionCall(n) => n.location = Some(location),
            Self::MethodCall(n) => n.location = Some(location),
            Self::PropertyAccess(n) => n.location = Some(location),
            Self::IndexAccess(n) => n.location = Some(location),
            Self::BinaryOperation(n) => n.location = Some(location),
            Self::UnaryOperation(n) => n.location = Some(location),
            Self::TypeCast(n) => n.location = Some(location),
            Self::TypeCheck(n) => n.location = Some(location),
            Self::Variable(n) => n.location = Some(location),
        }
        self
    }

    /// Get a human-readable description of the node type
    pub fn node_type(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Identifier(_) => "identifier",
            Self::FunctionCall(_) => "function call",
            Self::MethodCall(_) => "method call",
            Self::PropertyAccess(_) => "property access",
            Self::IndexAccess(_) => "index access",
            Self::BinaryOperation(_) => "binary operation",
            Self::UnaryOperation(_) => "unary operation",
            Self::TypeCast(_) => "type cast",
            Self::TypeCheck(_) => "type check",
            Self::Variable(_) => "variable",
        }
    }

    /// Count the nodes in this tree
    pub fn node_count(&self) -> usize {
        1 + match self {
            Self::Literal(_) | Self::Identifier(_) | Self::Variable(_) => 0,
            Self::FunctionCall(n) => n.arguments.iter().map(Self::node_count).sum(),
            Self::MethodCall(n) => {
                n.object.node_count() + n.arguments.iter().map(Self::node_count).sum::<usize>()
            }
            Self::PropertyAccess(n) => n.object.node_count(),
            Self::IndexAccess(n) => n.object.node_count() + n.index.node_count(),
            Self::BinaryOperation(n) => n.left.node_count() + n.right.node_count(),
            Self::UnaryOperation(n) => n.operand.node_count(),
            Self::TypeCast(n) => n.expression.node_count(),
            Self::TypeCheck(n) => n.expression.node_count(),
        }
    }

    /// Interpret this node as a type specifier, as written in function arguments
    /// like `as(String)` or `ofType(FHIR.Patient)`
    pub fn as_type_specifier(&self) -> Option<TypeSpecifier> {
        match self {
            Self::Identifier(n) => Some(TypeSpecifier::new(&n.name)),
            Self::PropertyAccess(n) => match n.object.as_ref() {
                Self::Identifier(namespace) => {
                    Some(TypeSpecifier::qualified(&namespace.name, &n.property))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn write_identifier(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_plain_identifier(name) {
        write!(f, "{name}")
    } else {
        write!(f, "`{name}`")
    }
}

fn write_arguments(f: &mut fmt::Formatter<'_>, arguments: &[ExpressionNode]) -> fmt::Result {
    write!(f, "(")?;
    for (i, arg) in arguments.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ")")
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(n) => write!(f, "{}", n.value),
            Self::Identifier(n) => write_identifier(f, &n.name),
            Self::FunctionCall(n) => {
                write_identifier(f, &n.name)?;
                write_arguments(f, &n.arguments)
            }
            Self::MethodCall(n) => {
                write!(f, "{}.", n.object)?;
                write_identifier(f, &n.method)?;
                write_arguments(f, &n.arguments)
            }
            Self::PropertyAccess(n) => {
                write!(f, "{}.", n.object)?;
                write_identifier(f, &n.property)
            }
            Self::IndexAccess(n) => write!(f, "{}[{}]", n.object, n.index),
            Self::BinaryOperation(n) => write!(f, "({} {} {})", n.left, n.operator, n.right),
            Self::UnaryOperation(n) => write!(f, "{}{}", n.operator, n.operand),
            Self::TypeCast(n) => write!(f, "({} as {})", n.expression, n.target_type),
            Self::TypeCheck(n) => write!(f, "({} is {})", n.expression, n.target_type),
            Self::Variable(n) => match n.kind {
                VariableKind::Special => write!(f, "${}", n.name),
                VariableKind::Environment => {
                    write!(f, "%")?;
                    write_identifier(f, &n.name)
                }
            },
        }
    }
}

// Convenience constructors
impl ExpressionNode {
    /// Create a literal node
    pub fn literal(value: LiteralValue) -> Self {
        Self::Literal(LiteralNode {
            value,
            location: None,
        })
    }

    /// Create an identifier node
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(IdentifierNode {
            name: name.into(),
            location: None,
        })
    }

    /// Create a function call node
    pub fn function_call(name: impl Into<String>, arguments: Vec<ExpressionNode>) -> Self {
        Self::FunctionCall(FunctionCallNode {
            name: name.into(),
            arguments,
            location: None,
        })
    }

    /// Create a method call node
    pub fn method_call(
        object: ExpressionNode,
        method: impl Into<String>,
        arguments: Vec<ExpressionNode>,
    ) -> Self {
        Self::MethodCall(MethodCallNode {
            object: Box::new(object),
            method: method.into(),
            arguments,
            location: None,
        })
    }

    /// Create a property access node
    pub fn property_access(object: ExpressionNode, property: impl Into<String>) -> Self {
        Self::PropertyAccess(PropertyAccessNode {
            object: Box::new(object),
            property: property.into(),
            location: None,
        })
    }

    /// Create an index access node
    pub fn index_access(object: ExpressionNode, index: ExpressionNode) -> Self {
        Self::IndexAccess(IndexAccessNode {
            object: Box::new(object),
            index: Box::new(index),
            location: None,
        })
    }

    /// Create a binary operation node
    pub fn binary_op(left: ExpressionNode, operator: BinaryOperator, right: ExpressionNode) -> Self {
        Self::BinaryOperation(BinaryOperationNode {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            location: None,
        })
    }

    /// Create a unary operation node
    pub fn unary_op(operator: UnaryOperator, operand: ExpressionNode) -> Self {
        Self::UnaryOperation(UnaryOperationNode {
            operator,
            operand: Box::new(operand),
            location: None,
        })
    }

    /// Create a type cast node
    pub fn type_cast(expression: ExpressionNode, target_type: TypeSpecifier) -> Self {
        Self::TypeCast(TypeCastNode {
            expression: Box::new(expression),
            target_type,
            location: None,
        })
    }

    /// Create a type check node
    pub fn type_check(expression: ExpressionNode, target_type: TypeSpecifier) -> Self {
        Self::TypeCheck(TypeCheckNode {
            expression: Box::new(expression),
            target_type,
            location: None,
        })
    }

    /// Create a variable reference node
    pub fn variable(name: impl Into<String>, kind: VariableKind) -> Self {
        Self::Variable(VariableNode {
            name: name.into(),
            kind,
            location: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_access() {
        let expr = ExpressionNode::property_access(ExpressionNode::identifier("Patient"), "name");
        assert_eq!(expr.to_string(), "Patient.name");
        assert_eq!(expr.node_count(), 2);
        assert_eq!(expr.node_type(), "property access");
    }

    #[test]
    fn test_method_call() {
        let expr = ExpressionNode::method_call(
            ExpressionNode::identifier("name"),
            "where",
            vec![ExpressionNode::identifier("use")],
        );
        assert_eq!(expr.to_string(), "name.where(use)");
        assert_eq!(expr.node_count(), 3);
    }

    #[test]
    fn test_variables_render_with_sigil() {
        assert_eq!(
            ExpressionNode::variable("this", VariableKind::Special).to_string(),
            "$this"
        );
        assert_eq!(
            ExpressionNode::variable("resource", VariableKind::Environment).to_string(),
            "%resource"
        );
        assert_eq!(
            ExpressionNode::variable("vs-name", VariableKind::Environment).to_string(),
            "%`vs-name`"
        );
    }

    #[test]
    fn test_as_type_specifier() {
        let plain = ExpressionNode::identifier("String");
        assert_eq!(plain.as_type_specifier(), Some(TypeSpecifier::new("String")));

        let qualified =
            ExpressionNode::property_access(ExpressionNode::identifier("FHIR"), "Patient");
        assert_eq!(
            qualified.as_type_specifier(),
            Some(TypeSpecifier::qualified("FHIR", "Patient"))
        );

        let literal = ExpressionNode::literal(LiteralValue::Integer(1));
        assert_eq!(literal.as_type_specifier(), None);
    }
}
