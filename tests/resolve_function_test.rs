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

//! Tests for the resolve() function: contained resources, Bundle entries and
//! external resolvers

mod utils;

use std::sync::Arc;

use octofhir_fhirpath_engine::{
    ElementNode, FhirPathValue, InMemoryReferenceResolver, PrimitiveNode, PrimitiveValue,
    ReferenceResolver, ResolutionScope,
};
use pretty_assertions::assert_eq;

use utils::{bundle, engine, entry, human_name, patient, reference};

#[test]
fn test_resolve_contained_resource() {
    let practitioner = ElementNode::new("Practitioner")
        .with_string("id", "prac1")
        .with_child("name", human_name("Smith", &["John"]))
        .into_value();
    let patient = ElementNode::new("Patient")
        .with_string("id", "patient1")
        .with_child("contained", practitioner)
        .with_child("generalPractitioner", reference("#prac1"))
        .into_value();

    let result = engine()
        .evaluate(&patient, "Patient.generalPractitioner.resolve().name.family")
        .unwrap();
    assert_eq!(result.to_strings(), vec!["Smith"]);
}

#[test]
fn test_resolve_self_fragment() {
    let patient = ElementNode::new("Patient")
        .with_string("id", "p1")
        .with_child("link", reference("#"))
        .into_value();
    let result = engine()
        .evaluate(&patient, "Patient.link.resolve().id")
        .unwrap();
    assert_eq!(result.to_strings(), vec!["p1"]);
}

#[test]
fn test_resolve_string_reference() {
    let practitioner = ElementNode::new("Practitioner")
        .with_string("id", "prac1")
        .into_value();
    let patient = ElementNode::new("Patient")
        .with_child("contained", practitioner)
        .into_value();
    let result = engine()
        .evaluate(&patient, "'#prac1'.resolve() is Practitioner")
        .unwrap();
    assert_eq!(result.as_slice(), &[FhirPathValue::boolean(true)]);
}

fn search_bundle() -> FhirPathValue {
    let observation = ElementNode::new("Observation")
        .with_string("id", "456")
        .with_child("subject", reference("Patient/123"))
        .with_child("performer", reference("http://example.com/Practitioner/9"))
        .into_value();
    bundle([
        entry("http://example.com/Patient/123", patient("123", "Doe")),
        entry("http://example.com/Observation/456", observation),
    ])
}

#[test]
fn test_resolve_bundle_entry_by_relative_reference() {
    let result = engine()
        .evaluate(
            &search_bundle(),
            "Bundle.entry[1].resource.subject.resolve().name.family",
        )
        .unwrap();
    assert_eq!(result.to_strings(), vec!["Doe"]);
}

#[test]
fn test_resolve_bundle_entry_by_full_url() {
    let result = engine()
        .evaluate(
            &search_bundle(),
            "'http://example.com/Patient/123'.resolve().id",
        )
        .unwrap();
    assert_eq!(result.to_strings(), vec!["123"]);

    let result = engine()
        .evaluate(
            &search_bundle(),
            "'http://other.org/fhir/Patient/123/_history/2'.resolve().id",
        )
        .unwrap();
    assert_eq!(result.to_strings(), vec!["123"]);
}

#[test]
fn test_unresolved_references_are_dropped() {
    let bundle = search_bundle();
    let engine = engine();

    let result = engine
        .evaluate(&bundle, "Bundle.entry.resource.performer.resolve()")
        .unwrap();
    assert!(result.is_empty());

    let result = engine
        .evaluate(
            &bundle,
            "Bundle.entry.resource.select(subject | performer).resolve().count()",
        )
        .unwrap();
    assert_eq!(result.as_slice(), &[FhirPathValue::integer(1)]);
}

#[test]
fn test_external_resolver() {
    let store = InMemoryReferenceResolver::new()
        .with_resource(patient("ext-1", "Outside"));
    store.add_resource_with_url(
        "urn:uuid:61ebe359-bfdc-4613-8bf2-c5e300945f0a",
        patient("ext-2", "Elsewhere"),
    );
    assert_eq!(store.len(), 3);

    let observation = ElementNode::new("Observation")
        .with_child("subject", reference("Patient/ext-1"))
        .with_child(
            "focus",
            reference("urn:uuid:61ebe359-bfdc-4613-8bf2-c5e300945f0a"),
        )
        .with_child("performer", reference("Practitioner/unknown"))
        .into_value();

    let engine = engine().with_reference_resolver(Arc::new(store));
    let result = engine
        .evaluate(&observation, "(subject | focus | performer).resolve().name.family")
        .unwrap();
    assert_eq!(result.to_strings(), vec!["Outside", "Elsewhere"]);
}

/// Resolver that answers every `Patient/` reference with a stub carrying the id
#[derive(Debug)]
struct StubResolver;

impl ReferenceResolver for StubResolver {
    fn resolve(&self, reference: &str, scope: &ResolutionScope<'_>) -> Option<FhirPathValue> {
        let id = reference.strip_prefix("Patient/")?;
        let requester = scope
            .resource
            .map(|r| r.type_name().to_string())
            .unwrap_or_default();
        Some(
            ElementNode::new("Patient")
                .with_string("id", id)
                .with_child(
                    "requestedBy",
                    PrimitiveNode::system(PrimitiveValue::String(requester)),
                )
                .into_value(),
        )
    }
}

#[test]
fn test_custom_resolver_receives_scope() {
    let observation = ElementNode::new("Observation")
        .with_child("subject", reference("Patient/42"))
        .into_value();
    let engine = engine().with_reference_resolver(Arc::new(StubResolver));
    let result = engine
        .evaluate(&observation, "subject.resolve().select(id & '@' & requestedBy)")
        .unwrap();
    assert_eq!(result.to_strings(), vec!["42@Observation"]);
}
