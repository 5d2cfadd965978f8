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

//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use octofhir_fhirpath_engine::core::PrecisionDateTime;
use octofhir_fhirpath_engine::{
    ElementNode, FhirPathEngine, FhirPathValue, InMemoryModelProvider, PrimitiveNode,
    PrimitiveValue, TypeDescriptor,
};

/// Type metadata for the resources and datatypes the fixtures use
pub fn model_provider() -> InMemoryModelProvider {
    InMemoryModelProvider::new()
        .with_resources(["Patient", "Observation", "Specimen", "Practitioner"])
        .with_type(TypeDescriptor::resource("Bundle").with_base("Resource"))
        .with_type(TypeDescriptor::resource("StructureDefinition"))
        .with_type(TypeDescriptor::complex("HumanName"))
        .with_type(TypeDescriptor::complex("Reference"))
        .with_type(TypeDescriptor::complex("ElementDefinition").with_base("BackboneElement"))
}

/// Engine configured with [`model_provider`]
pub fn engine() -> FhirPathEngine {
    FhirPathEngine::new().with_model_provider(Arc::new(model_provider()))
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn reference(target: &str) -> ElementNode {
    ElementNode::new("Reference").with_string("reference", target)
}

pub fn date_time(text: &str) -> PrimitiveNode {
    let value = PrecisionDateTime::parse(text).expect("valid dateTime");
    PrimitiveNode::fhir("dateTime", PrimitiveValue::DateTime(value))
}

pub fn human_name(family: &str, given: &[&str]) -> ElementNode {
    ElementNode::new("HumanName")
        .with_string("family", family)
        .with_children(
            "given",
            given
                .iter()
                .map(|g| PrimitiveNode::fhir("string", PrimitiveValue::String(g.to_string()))),
        )
}

pub fn patient(id: &str, family: &str) -> FhirPathValue {
    ElementNode::new("Patient")
        .with_primitive("id", "id", PrimitiveValue::String(id.to_string()))
        .with_child("active", PrimitiveNode::fhir("boolean", PrimitiveValue::Boolean(true)))
        .with_child("name", human_name(family, &["Jane"]))
        .into_value()
}

/// Observation carrying a contained Specimen with id `#FOO`, referenced as `#FOO`
pub fn observation_with_contained_specimen() -> FhirPathValue {
    let specimen = ElementNode::new("Specimen")
        .with_primitive("id", "id", PrimitiveValue::String("#FOO".to_string()))
        .with_child("receivedTime", date_time("2011-01-01"));
    ElementNode::new("Observation")
        .with_primitive("id", "id", PrimitiveValue::String("O1".to_string()))
        .with_child("contained", specimen)
        .with_primitive("status", "code", PrimitiveValue::String("final".to_string()))
        .with_child("specimen", reference("#FOO"))
        .into_value()
}

/// Bundle entry with the given full URL
pub fn entry(full_url: &str, resource: FhirPathValue) -> ElementNode {
    ElementNode::new("BackboneElement")
        .with_primitive("fullUrl", "uri", PrimitiveValue::String(full_url.to_string()))
        .with_child("resource", resource)
}

pub fn bundle(entries: impl IntoIterator<Item = ElementNode>) -> FhirPathValue {
    ElementNode::new("Bundle")
        .with_primitive("type", "code", PrimitiveValue::String("searchset".to_string()))
        .with_children("entry", entries)
        .into_value()
}

/// Differential of a profile: one ElementDefinition per path
pub fn differential(paths: &[&str]) -> FhirPathValue {
    ElementNode::new("BackboneElement")
        .with_children(
            "element",
            paths.iter().map(|path| {
                ElementNode::new("ElementDefinition").with_string("path", *path)
            }),
        )
        .into_value()
}

pub fn structure_definition(type_name: &str) -> FhirPathValue {
    ElementNode::new("StructureDefinition")
        .with_primitive("type", "uri", PrimitiveValue::String(type_name.to_string()))
        .into_value()
}
