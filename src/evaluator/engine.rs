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

//! # FHIRPath evaluation engine
//!
//! [`FhirPathEngine`] walks a parsed expression over a node tree and returns a
//! [`Collection`]. The engine holds only configuration (function registry, type
//! registry, reference resolver, AST cache) and never mutates the tree or the
//! AST, so one instance can be shared across threads.
//!
//! ## Quick Start
//!
//! ```rust
//! use octofhir_fhirpath_engine::{ElementNode, FhirPathEngine};
//!
//! let patient = ElementNode::new("Patient")
//!     .with_child("name", ElementNode::new("HumanName").with_string("family", "Chalmers"))
//!     .into_value();
//!
//! let engine = FhirPathEngine::new();
//! let family = engine.evaluate_to_string(&patient, "Patient.name.family").unwrap();
//! assert_eq!(family, "Chalmers");
//!
//! let result = engine.evaluate(&patient, "Patient.name.where(family.exists())").unwrap();
//! assert_eq!(result.len(), 1);
//! ```

use std::sync::Arc;

use log::{debug, trace};
use smallvec::SmallVec;

use super::config::EvaluationConfig;
use super::context::EvaluationContext;
use super::navigation;
use super::operators;
use super::resolver::{self, ReferenceResolver, ResolutionScope};
use crate::ast::{BinaryOperationNode, ExpressionNode, LiteralValue, VariableKind, VariableNode};
use crate::core::stack::ensure_sufficient_stack;
use crate::core::{FhirPathError, Result, SourceLocation};
use crate::model::{
    Collection, FhirPathValue, InMemoryModelProvider, ModelProvider, PrimitiveValue, Quantity,
    TypeRegistry,
};
use crate::parser::{AstCache, AstCacheStats, SharedAst, parse_expression_with_depth};
use crate::registry::{
    CardinalityRequirement, ExpressionEvaluator, FunctionRegistry, Operation, OperationContext,
    create_standard_registry,
};

/// FHIRPath evaluation engine.
///
/// Cloning is cheap: clones share the registry, the resolver and the AST cache.
///
/// ```rust
/// use octofhir_fhirpath_engine::{FhirPathEngine, InMemoryModelProvider, TypeDescriptor};
/// use std::sync::Arc;
///
/// let provider = InMemoryModelProvider::new()
///     .with_resources(["Patient", "Observation"])
///     .with_type(TypeDescriptor::complex("HumanName"));
/// let engine = FhirPathEngine::new().with_model_provider(Arc::new(provider));
/// ```
#[derive(Debug, Clone)]
pub struct FhirPathEngine {
    registry: Arc<FunctionRegistry>,
    types: TypeRegistry,
    resolver: Option<Arc<dyn ReferenceResolver>>,
    cache: Arc<AstCache>,
    config: EvaluationConfig,
}

impl Default for FhirPathEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FhirPathEngine {
    /// Engine with the standard function catalog, the base type hierarchy and
    /// no external reference resolver
    pub fn new() -> Self {
        let config = EvaluationConfig::default();
        Self {
            registry: Arc::new(create_standard_registry()),
            types: TypeRegistry::new(Arc::new(InMemoryModelProvider::new())),
            resolver: None,
            cache: Arc::new(AstCache::new(config.expression_cache_size)),
            config,
        }
    }

    /// Use `provider` for type names in `is`, `as`, `ofType` and path pass-through
    pub fn with_model_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.types = TypeRegistry::new(provider);
        self
    }

    /// Use `resolver` for references that the evaluated tree cannot satisfy
    pub fn with_reference_resolver(mut self, resolver: Arc<dyn ReferenceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replace the function catalog
    pub fn with_function_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Apply `config`; a different cache size or parse depth starts a fresh AST cache
    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        if config.expression_cache_size != self.config.expression_cache_size
            || config.max_parse_depth != self.config.max_parse_depth
        {
            self.cache = Arc::new(AstCache::new(config.expression_cache_size));
        }
        self.config = config;
        self
    }

    /// Returns the current evaluation configuration.
    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Type lookups used by this engine
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// The function catalog
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// AST cache statistics
    pub fn cache_stats(&self) -> AstCacheStats {
        self.cache.stats()
    }

    /// Parse `expression`, reusing a cached tree when one exists
    pub fn parse(&self, expression: &str) -> Result<SharedAst> {
        let max_depth = self.config.max_parse_depth;
        self.cache
            .get_or_parse(expression, |text| parse_expression_with_depth(text, max_depth))
    }

    /// Evaluate `expression` with `input` as focus and as `%resource`
    pub fn evaluate(&self, input: &FhirPathValue, expression: &str) -> Result<Collection> {
        self.evaluate_with_context(expression, &EvaluationContext::new(input.clone()))
    }

    /// Like [`Self::evaluate`], with extra `%name` bindings
    pub fn evaluate_with_variables<I, K, V>(
        &self,
        input: &FhirPathValue,
        expression: &str,
        variables: I,
    ) -> Result<Collection>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Collection>,
    {
        let context = variables
            .into_iter()
            .fold(EvaluationContext::new(input.clone()), |context, (name, value)| {
                context.with_variable(name, value)
            });
        self.evaluate_with_context(expression, &context)
    }

    /// Evaluate an expression authored against a type definition while positioned
    /// on `focus` (for example a differential element).
    ///
    /// `resource` becomes `%resource`/`%rootResource` and `definition` becomes
    /// `%context`; both default to `focus`.
    pub fn evaluate_in_definition(
        &self,
        resource: Option<&FhirPathValue>,
        focus: &FhirPathValue,
        definition: Option<&FhirPathValue>,
        expression: &str,
    ) -> Result<Collection> {
        let mut context = EvaluationContext::from_collection(Collection::single(focus.clone()))
            .with_resource(resource.unwrap_or(focus).clone());
        if let Some(definition) = definition {
            context = context.with_definition(definition.clone());
        }
        self.evaluate_with_context(expression, &context)
    }

    /// Evaluate and render the single primitive result; any other result is an error
    pub fn evaluate_to_string(&self, input: &FhirPathValue, expression: &str) -> Result<String> {
        let result = self.evaluate(input, expression)?;
        match result.as_slice() {
            [value] => value.to_fhirpath_string().ok_or_else(|| {
                FhirPathError::evaluation_error(format!(
                    "'{expression}' produced a {} instead of a primitive value",
                    value.type_name()
                ))
            }),
            items => Err(FhirPathError::evaluation_error(format!(
                "'{expression}' produced {} values, expected exactly one",
                items.len()
            ))),
        }
    }

    /// Parse (through the cache) and evaluate against a prepared context
    pub fn evaluate_with_context(
        &self,
        expression: &str,
        context: &EvaluationContext,
    ) -> Result<Collection> {
        let ast = self.parse(expression)?;
        self.evaluate_expression(&ast, context)
    }

    /// Evaluate a pre-parsed expression
    pub fn evaluate_expression(
        &self,
        expression: &ExpressionNode,
        context: &EvaluationContext,
    ) -> Result<Collection> {
        debug!("evaluating {expression} on {} input items", context.input.len());
        let evaluation = Evaluation {
            engine: self,
            context,
        };
        let frame = Frame {
            this: context.input.clone(),
            index: None,
        };
        let result = evaluation.eval(expression, &frame, 0)?;
        debug!("{expression} produced {} items", result.len());
        Ok(result)
    }
}

/// `$this`/`$index` scope
struct Frame {
    this: Collection,
    index: Option<usize>,
}

/// Working state of one evaluation call
struct Evaluation<'e> {
    engine: &'e FhirPathEngine,
    context: &'e EvaluationContext,
}

impl Evaluation<'_> {
    fn eval(&self, node: &ExpressionNode, frame: &Frame, depth: usize) -> Result<Collection> {
        let limit = self.engine.config.max_recursion_depth;
        if depth > limit {
            return Err(FhirPathError::RecursionLimitExceeded { limit });
        }
        ensure_sufficient_stack(|| self.eval_node(node, frame, depth + 1))
    }

    fn eval_node(&self, node: &ExpressionNode, frame: &Frame, depth: usize) -> Result<Collection> {
        match node {
            ExpressionNode::Literal(literal) => Ok(literal_collection(&literal.value)),
            ExpressionNode::Identifier(identifier) => Ok(navigation::step_identifier(
                &frame.this,
                &identifier.name,
                &self.engine.types,
            )),
            ExpressionNode::PropertyAccess(access) => {
                let base = self.eval(&access.object, frame, depth)?;
                Ok(navigation::step(&base, &access.property))
            }
            ExpressionNode::FunctionCall(call) => self.call_function(
                &call.name,
                &call.arguments,
                &frame.this,
                frame,
                call.location.as_ref(),
                depth,
            ),
            ExpressionNode::MethodCall(call) => {
                let input = self.eval(&call.object, frame, depth)?;
                self.call_function(
                    &call.method,
                    &call.arguments,
                    &input,
                    frame,
                    call.location.as_ref(),
                    depth,
                )
            }
            ExpressionNode::IndexAccess(access) => {
                let base = self.eval(&access.object, frame, depth)?;
                let index = self.eval(&access.index, frame, depth)?;
                let Some(index) = index.singleton("[]")? else {
                    return Ok(Collection::empty());
                };
                let index = index.as_integer().ok_or_else(|| {
                    FhirPathError::type_mismatch(
                        "Integer",
                        index.qualified_type_name(),
                        Some("index".to_string()),
                    )
                })?;
                Ok(usize::try_from(index)
                    .ok()
                    .and_then(|i| base.get(i))
                    .cloned()
                    .into_iter()
                    .collect())
            }
            ExpressionNode::BinaryOperation(operation) => self.eval_binary(operation, frame, depth),
            ExpressionNode::UnaryOperation(operation) => {
                let operand = self.eval(&operation.operand, frame, depth)?;
                operators::unary(operation.operator, &operand)
            }
            ExpressionNode::TypeCast(cast) => {
                let target = self.engine.types.resolve(&cast.target_type)?;
                let value = self.eval(&cast.expression, frame, depth)?;
                Ok(value
                    .iter()
                    .filter(|item| self.engine.types.matches(item, &target))
                    .cloned()
                    .collect())
            }
            ExpressionNode::TypeCheck(check) => {
                let target = self.engine.types.resolve(&check.target_type)?;
                let value = self.eval(&check.expression, frame, depth)?;
                Ok(match value.singleton("is")? {
                    Some(item) => Collection::boolean(self.engine.types.matches(item, &target)),
                    None => Collection::empty(),
                })
            }
            ExpressionNode::Variable(variable) => self.variable(variable, frame),
        }
    }

    fn eval_binary(
        &self,
        operation: &BinaryOperationNode,
        frame: &Frame,
        depth: usize,
    ) -> Result<Collection> {
        let left = self.eval(&operation.left, frame, depth)?;
        if let Some(result) = operators::short_circuit(operation.operator, &left)? {
            return Ok(result);
        }
        let right = self.eval(&operation.right, frame, depth)?;
        operators::binary(operation.operator, &left, &right)
    }

    fn call_function(
        &self,
        name: &str,
        arguments: &[ExpressionNode],
        input: &Collection,
        frame: &Frame,
        location: Option<&SourceLocation>,
        depth: usize,
    ) -> Result<Collection> {
        let operation =
            self.engine
                .registry
                .get(name)
                .ok_or_else(|| FhirPathError::UnknownFunction {
                    function_name: name.to_string(),
                    location: location.copied(),
                })?;
        let signature = operation.signature();
        signature.check_arg_count(arguments.len())?;
        if signature.cardinality_requirement == CardinalityRequirement::RequiresScalar
            && input.len() > 1
        {
            return Err(FhirPathError::singleton_expected(
                format!("{name}()"),
                input.len(),
            ));
        }

        trace!("calling {name}() on {} items", input.len());
        let call_site = CallSite {
            evaluation: self,
            frame,
            depth,
        };
        let context = OperationContext::new(input, &call_site);
        match operation {
            Operation::Sync(op) => {
                let args = arguments
                    .iter()
                    .map(|argument| self.eval(argument, frame, depth))
                    .collect::<Result<SmallVec<[Collection; 4]>>>()?;
                op.execute(&args, &context)
            }
            Operation::Lambda(op) => op.execute(arguments, &context),
        }
    }

    fn variable(&self, variable: &VariableNode, frame: &Frame) -> Result<Collection> {
        let name = variable.name.as_str();
        match variable.kind {
            VariableKind::Special => match name {
                "this" => Ok(frame.this.clone()),
                "index" => Ok(frame
                    .index
                    .and_then(|i| i64::try_from(i).ok())
                    .map(FhirPathValue::integer)
                    .into_iter()
                    .collect()),
                // Only meaningful inside aggregate(), which is not part of the catalog
                "total" => Ok(Collection::empty()),
                _ => Err(FhirPathError::evaluation_error(format!(
                    "unknown special variable ${name}"
                ))),
            },
            VariableKind::Environment => {
                if let Some(value) = self.context.variables.get(name) {
                    return Ok(value.clone());
                }
                match name {
                    "resource" => Ok(self.context.resource_variable()),
                    "rootResource" => Ok(self.context.root_resource_variable()),
                    "context" => Ok(self.context.context_variable()),
                    "ucum" => Ok(Collection::single(FhirPathValue::string(
                        "http://unitsofmeasure.org",
                    ))),
                    "sct" => Ok(Collection::single(FhirPathValue::string(
                        "http://snomed.info/sct",
                    ))),
                    "loinc" => Ok(Collection::single(FhirPathValue::string("http://loinc.org"))),
                    _ => Err(FhirPathError::UnknownVariable {
                        name: name.to_string(),
                    }),
                }
            }
        }
    }
}

/// Engine callback handed to operations at one call site
struct CallSite<'a> {
    evaluation: &'a Evaluation<'a>,
    frame: &'a Frame,
    depth: usize,
}

impl ExpressionEvaluator for CallSite<'_> {
    fn evaluate_for_item(
        &self,
        expression: &ExpressionNode,
        item: &FhirPathValue,
        index: usize,
    ) -> Result<Collection> {
        let frame = Frame {
            this: Collection::single(item.clone()),
            index: Some(index),
        };
        self.evaluation.eval(expression, &frame, self.depth)
    }

    fn evaluate_in_scope(&self, expression: &ExpressionNode) -> Result<Collection> {
        self.evaluation.eval(expression, self.frame, self.depth)
    }

    fn types(&self) -> &TypeRegistry {
        &self.evaluation.engine.types
    }

    fn resolve_reference(&self, reference: &str) -> Option<FhirPathValue> {
        let context = self.evaluation.context;
        let scope = ResolutionScope {
            resource: context.anchor_resource(),
            root: context.root(),
        };
        resolver::resolve_reference(reference, &scope, self.evaluation.engine.resolver.as_deref())
    }
}

fn literal_collection(value: &LiteralValue) -> Collection {
    let primitive = match value {
        LiteralValue::String(s) => PrimitiveValue::String(s.clone()),
        LiteralValue::Integer(i) => PrimitiveValue::Integer(*i),
        LiteralValue::Decimal(d) => PrimitiveValue::Decimal(*d),
        LiteralValue::Boolean(b) => PrimitiveValue::Boolean(*b),
        LiteralValue::Date(d) => PrimitiveValue::Date(d.clone()),
        LiteralValue::DateTime(dt) => PrimitiveValue::DateTime(dt.clone()),
        LiteralValue::Time(t) => PrimitiveValue::Time(t.clone()),
        LiteralValue::Quantity { value, unit } => {
            PrimitiveValue::Quantity(Quantity::new(*value, unit.clone()))
        }
        LiteralValue::Empty => return Collection::empty(),
    };
    Collection::single(FhirPathValue::system(primitive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementNode, PrimitiveNode, TypeDescriptor};
    use pretty_assertions::assert_eq;

    fn patient() -> FhirPathValue {
        ElementNode::new("Patient")
            .with_string("id", "example")
            .with_child("active", PrimitiveNode::fhir("boolean", PrimitiveValue::Boolean(true)))
            .with_children(
                "name",
                [
                    ElementNode::new("HumanName")
                        .with_string("family", "Chalmers")
                        .with_children(
                            "given",
                            [
                                PrimitiveNode::fhir("string", PrimitiveValue::String("Peter".into())),
                                PrimitiveNode::fhir("string", PrimitiveValue::String("James".into())),
                            ],
                        ),
                    ElementNode::new("HumanName").with_string("family", "Windsor"),
                ],
            )
            .into_value()
    }

    fn engine() -> FhirPathEngine {
        let provider = InMemoryModelProvider::new()
            .with_resources(["Patient", "Observation"])
            .with_type(TypeDescriptor::complex("HumanName"));
        FhirPathEngine::new().with_model_provider(Arc::new(provider))
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<FhirPathEngine>();
    }

    #[test]
    fn test_path_navigation() {
        let engine = engine();
        let result = engine.evaluate(&patient(), "Patient.name.given").unwrap();
        assert_eq!(result.to_strings(), vec!["Peter", "James"]);

        let result = engine.evaluate(&patient(), "name.family").unwrap();
        assert_eq!(result.to_strings(), vec!["Chalmers", "Windsor"]);

        let result = engine.evaluate(&patient(), "Observation.status").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_indexer_and_variables() {
        let engine = engine();
        let family = engine
            .evaluate_to_string(&patient(), "Patient.name[1].family")
            .unwrap();
        assert_eq!(family, "Windsor");
        assert!(engine.evaluate(&patient(), "name[5]").unwrap().is_empty());

        let result = engine
            .evaluate(&patient(), "name.given.where($index = 1)")
            .unwrap();
        assert_eq!(result.to_strings(), vec!["James"]);

        let result = engine
            .evaluate_with_variables(&patient(), "%limit + 1", [("limit", FhirPathValue::integer(4))])
            .unwrap();
        assert_eq!(result.to_strings(), vec!["5"]);

        let result = engine.evaluate(&patient(), "%resource.id").unwrap();
        assert_eq!(result.to_strings(), vec!["example"]);
        let result = engine.evaluate(&patient(), "%ucum").unwrap();
        assert_eq!(result.to_strings(), vec!["http://unitsofmeasure.org"]);
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        let engine = engine();
        let result = engine
            .evaluate(&patient(), "false and (1 + 'a') = 2")
            .unwrap();
        assert_eq!(result.as_slice(), &[FhirPathValue::boolean(false)]);
        assert!(engine.evaluate(&patient(), "true and (1 + 'a') = 2").is_err());
    }

    #[test]
    fn test_unknown_symbols() {
        let engine = engine();
        let err = engine.evaluate(&patient(), "name.frobnicate()").unwrap_err();
        assert!(matches!(err, FhirPathError::UnknownFunction { ref function_name, .. } if function_name == "frobnicate"));
        assert!(err.is_unknown_symbol());

        let err = engine.evaluate(&patient(), "%nope").unwrap_err();
        assert_eq!(err, FhirPathError::UnknownVariable { name: "nope".into() });

        let err = engine.evaluate(&patient(), "name.ofType(Nonsense)").unwrap_err();
        assert!(matches!(err, FhirPathError::UnknownType { .. }));
    }

    #[test]
    fn test_recursion_limit() {
        let engine = engine().with_config(EvaluationConfig {
            max_recursion_depth: 8,
            ..EvaluationConfig::default()
        });
        let expression = (0..20).map(|_| "1").collect::<Vec<_>>().join(" + ");
        let err = engine.evaluate(&patient(), &expression).unwrap_err();
        assert_eq!(err, FhirPathError::RecursionLimitExceeded { limit: 8 });
    }

    #[test]
    fn test_default_recursion_limit_is_reachable() {
        let engine = engine();
        let limit = engine.config().max_recursion_depth;

        let at_limit = format!("1{}", " + 1".repeat(limit));
        let result = engine.evaluate(&patient(), &at_limit).unwrap();
        assert_eq!(result.first().and_then(FhirPathValue::as_integer), Some(limit as i64 + 1));

        let past_limit = format!("1{}", " + 1".repeat(limit + 1));
        let err = engine.evaluate(&patient(), &past_limit).unwrap_err();
        assert_eq!(err, FhirPathError::RecursionLimitExceeded { limit });
    }

    #[test]
    fn test_parse_depth_comes_from_config() {
        let engine = engine().with_config(EvaluationConfig {
            max_parse_depth: 4,
            ..EvaluationConfig::default()
        });
        assert!(engine.evaluate(&patient(), "((1))").is_ok());
        let err = engine.evaluate(&patient(), "(((((1)))))").unwrap_err();
        assert!(err.is_parse_error(), "{err:?}");
    }

    #[test]
    fn test_evaluate_to_string_requires_one_primitive() {
        let engine = engine();
        assert!(engine.evaluate_to_string(&patient(), "name.family").is_err());
        assert!(engine.evaluate_to_string(&patient(), "name.first()").is_err());
        assert!(engine.evaluate_to_string(&patient(), "{}").is_err());
        assert_eq!(
            engine.evaluate_to_string(&patient(), "active").unwrap(),
            "true"
        );
    }

    #[test]
    fn test_parse_is_cached() {
        let engine = engine();
        engine.evaluate(&patient(), "name.family").unwrap();
        engine.evaluate(&patient(), "name.family").unwrap();
        let stats = engine.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}
