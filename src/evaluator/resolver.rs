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

//! Reference resolution for `resolve()`
//!
//! Lookup order for a reference string:
//!
//! 1. `#` is the anchor resource itself; `#id` is a `contained` resource of the
//!    anchor resource, then of the root resource
//! 2. when the root resource is a Bundle, an entry whose `fullUrl` equals the
//!    reference or whose resource has the referenced type and id
//! 3. the engine's [`ReferenceResolver`], for targets supplied out of band

use std::fmt;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use url::Url;

use crate::model::FhirPathValue;

/// Resources a reference is resolved relative to
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionScope<'a> {
    /// Resource holding the reference (`%resource`)
    pub resource: Option<&'a FhirPathValue>,
    /// Outermost resource (`%rootResource`), e.g. a Bundle
    pub root: Option<&'a FhirPathValue>,
}

/// External lookup capability for references the tree itself cannot satisfy.
///
/// Implementations must be cheap to call concurrently; any caching is theirs.
pub trait ReferenceResolver: Send + Sync + fmt::Debug {
    /// Find the target of `reference`, or `None` when it is unknown
    fn resolve(&self, reference: &str, scope: &ResolutionScope<'_>) -> Option<FhirPathValue>;
}

/// Type and id parsed from a literal reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceKey {
    /// Resource type, e.g. `Patient`
    pub resource_type: String,
    /// Logical id
    pub id: String,
}

impl ReferenceKey {
    /// Parse `Type/id`, `Type/id/_history/v` or an absolute URL ending in one of those
    pub fn parse(reference: &str) -> Option<Self> {
        let path = match Url::parse(reference) {
            Ok(url) => url.path().to_string(),
            Err(_) => reference.to_string(),
        };
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let segments = match segments.iter().position(|s| *s == "_history") {
            Some(history) => &segments[..history],
            None => &segments[..],
        };
        match segments {
            [.., resource_type, id] if is_resource_type_name(resource_type) => Some(Self {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            }),
            _ => None,
        }
    }

    /// `Type/id` form
    pub fn key(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }

    /// Whether `resource` has this type and id
    pub fn matches(&self, resource: &FhirPathValue) -> bool {
        resource.type_name() == self.resource_type && resource.id().as_deref() == Some(&self.id)
    }
}

fn is_resource_type_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Resolve `reference` inside the current tree, falling back to `external`
pub fn resolve_reference(
    reference: &str,
    scope: &ResolutionScope<'_>,
    external: Option<&dyn ReferenceResolver>,
) -> Option<FhirPathValue> {
    if reference.is_empty() {
        return None;
    }

    if let Some(fragment) = reference.strip_prefix('#') {
        if fragment.is_empty() {
            return scope.resource.cloned();
        }
        return [scope.resource, scope.root]
            .into_iter()
            .flatten()
            .find_map(|resource| find_contained(resource, fragment));
    }

    if let Some(root) = scope.root.filter(|root| root.type_name() == "Bundle") {
        if let Some(found) = find_in_bundle(root, reference) {
            return Some(found);
        }
    }

    external.and_then(|resolver| resolver.resolve(reference, scope))
}

/// The `contained` resource of `resource` with id `fragment`
fn find_contained(resource: &FhirPathValue, fragment: &str) -> Option<FhirPathValue> {
    resource.children("contained").into_iter().find(|contained| {
        contained
            .id()
            .is_some_and(|id| id.trim_start_matches('#') == fragment)
    })
}

fn find_in_bundle(bundle: &FhirPathValue, reference: &str) -> Option<FhirPathValue> {
    let key = ReferenceKey::parse(reference);
    bundle.children("entry").into_iter().find_map(|entry| {
        let resource = entry.children("resource").into_iter().next()?;
        let full_url = entry.children("fullUrl");
        let url_matches = full_url
            .first()
            .and_then(FhirPathValue::as_string)
            .is_some_and(|url| url == reference);
        let key_matches = key.as_ref().is_some_and(|key| key.matches(&resource));
        (url_matches || key_matches).then_some(resource)
    })
}

/// Thread-safe store of out-of-band resources, keyed by `Type/id` and by full URL
#[derive(Debug, Default)]
pub struct InMemoryReferenceResolver {
    resources: RwLock<FxHashMap<String, FhirPathValue>>,
}

impl InMemoryReferenceResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource under `Type/id`; resources without an id are ignored
    pub fn add_resource(&self, resource: FhirPathValue) {
        let Some(id) = resource.id() else {
            log::warn!("resource of type {} has no id, not registered", resource.type_name());
            return;
        };
        let key = format!("{}/{}", resource.type_name(), id);
        self.resources.write().insert(key, resource);
    }

    /// Register a resource under its full URL as well as `Type/id`
    pub fn add_resource_with_url(&self, url: impl Into<String>, resource: FhirPathValue) {
        self.resources.write().insert(url.into(), resource.clone());
        self.add_resource(resource);
    }

    /// Builder form of [`Self::add_resource`]
    pub fn with_resource(self, resource: FhirPathValue) -> Self {
        self.add_resource(resource);
        self
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Check if no resources are registered
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

impl ReferenceResolver for InMemoryReferenceResolver {
    fn resolve(&self, reference: &str, _scope: &ResolutionScope<'_>) -> Option<FhirPathValue> {
        let resources = self.resources.read();
        if let Some(found) = resources.get(reference) {
            return Some(found.clone());
        }
        let key = ReferenceKey::parse(reference)?;
        resources.get(&key.key()).cloned()
    }
}
