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

//! Per-call evaluation context

use rustc_hash::FxHashMap;

use crate::model::{Collection, FhirPathValue};

/// Inputs of one evaluation call: the focus, the resources behind the
/// `%resource`/`%rootResource`/`%context` variables, and caller bindings.
///
/// Contexts are plain values; the engine never mutates them, so one context may
/// be reused for any number of calls.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    /// Initial focus (`$this` at the top of the expression)
    pub input: Collection,
    /// Anchor resource, `%resource`
    pub resource: Option<FhirPathValue>,
    /// Outermost resource, `%rootResource`
    pub root_resource: Option<FhirPathValue>,
    /// Definition context, `%context`
    pub definition: Option<FhirPathValue>,
    /// Caller-supplied `%name` bindings
    pub variables: FxHashMap<String, Collection>,
}

impl EvaluationContext {
    /// Context focused on `input`, which is also the anchor resource
    pub fn new(input: FhirPathValue) -> Self {
        Self {
            input: Collection::single(input.clone()),
            resource: Some(input),
            ..Self::default()
        }
    }

    /// Context with an empty focus
    pub fn empty() -> Self {
        Self::default()
    }

    /// Context focused on an arbitrary collection
    pub fn from_collection(input: Collection) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    /// Set the anchor resource (`%resource`)
    pub fn with_resource(mut self, resource: FhirPathValue) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Set the outermost resource (`%rootResource`), e.g. a Bundle holding the anchor
    pub fn with_root_resource(mut self, root: FhirPathValue) -> Self {
        self.root_resource = Some(root);
        self
    }

    /// Set the definition context (`%context`)
    pub fn with_definition(mut self, definition: FhirPathValue) -> Self {
        self.definition = Some(definition);
        self
    }

    /// Bind `%name`
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Collection>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// `%resource`: the anchor resource, falling back to the focus
    pub fn resource_variable(&self) -> Collection {
        match &self.resource {
            Some(resource) => Collection::single(resource.clone()),
            None => self.input.clone(),
        }
    }

    /// `%rootResource`: the outermost resource, falling back to `%resource`
    pub fn root_resource_variable(&self) -> Collection {
        match &self.root_resource {
            Some(root) => Collection::single(root.clone()),
            None => self.resource_variable(),
        }
    }

    /// `%context`: the definition context, falling back to the focus
    pub fn context_variable(&self) -> Collection {
        match &self.definition {
            Some(definition) => Collection::single(definition.clone()),
            None => self.input.clone(),
        }
    }

    /// The resource that `#id` references are resolved against
    pub fn anchor_resource(&self) -> Option<&FhirPathValue> {
        self.resource.as_ref().or_else(|| self.input.first())
    }

    /// The outermost resource, for Bundle and contained lookups
    pub fn root(&self) -> Option<&FhirPathValue> {
        self.root_resource.as_ref().or_else(|| self.anchor_resource())
    }
}
