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

//! FHIRPath Performance Benchmarks
//!
//! Tokenizer, parser and evaluator throughput over a small Patient tree.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use octofhir_fhirpath_engine::parser::tokenize;
use octofhir_fhirpath_engine::{
    ElementNode, FhirPathEngine, FhirPathValue, InMemoryModelProvider, PrimitiveNode,
    PrimitiveValue, TypeDescriptor, parse_expression,
};
use std::hint::black_box;
use std::sync::Arc;

const TEST_EXPRESSIONS: &[(&str, &str)] = &[
    ("simple", "Patient.name"),
    ("medium", "Patient.name.where(use = 'official')"),
    (
        "complex",
        "Patient.name.where(use = 'official').given.first() & ' ' & Patient.name.family.first()",
    ),
];

fn patient() -> FhirPathValue {
    let name = |use_: &str, family: &str| {
        ElementNode::new("HumanName")
            .with_primitive("use", "code", PrimitiveValue::String(use_.to_string()))
            .with_string("family", family)
            .with_children(
                "given",
                ["Peter", "James"]
                    .map(|g| PrimitiveNode::fhir("string", PrimitiveValue::String(g.to_string()))),
            )
    };
    ElementNode::new("Patient")
        .with_string("id", "example")
        .with_children("name", [name("official", "Chalmers"), name("usual", "Windsor")])
        .into_value()
}

fn engine() -> FhirPathEngine {
    let provider = InMemoryModelProvider::new()
        .with_resources(["Patient"])
        .with_type(TypeDescriptor::complex("HumanName"));
    FhirPathEngine::new().with_model_provider(Arc::new(provider))
}

fn bench_tokenizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenizer");
    group.throughput(Throughput::Elements(1));

    for (complexity, expression) in TEST_EXPRESSIONS {
        group.bench_with_input(
            BenchmarkId::new("tokenize", complexity),
            expression,
            |b, expr| b.iter(|| black_box(tokenize(black_box(expr)).map(|t| t.len()))),
        );
    }

    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    group.throughput(Throughput::Elements(1));

    for (complexity, expression) in TEST_EXPRESSIONS {
        group.bench_with_input(
            BenchmarkId::new("parse", complexity),
            expression,
            |b, expr| b.iter(|| black_box(parse_expression(black_box(expr)))),
        );
    }

    group.finish();
}

fn bench_evaluator(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluator");
    group.throughput(Throughput::Elements(1));

    let engine = engine();
    let input = patient();

    for (complexity, expression) in TEST_EXPRESSIONS {
        group.bench_with_input(
            BenchmarkId::new("evaluate", complexity),
            expression,
            |b, expr| b.iter(|| black_box(engine.evaluate(&input, black_box(expr)))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_tokenizer, bench_parser, bench_evaluator);
criterion_main!(benches);
