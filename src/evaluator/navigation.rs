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

//! Path stepping over the node tree
//!
//! Every step drops primitives that carry no value, so a declared-but-empty
//! element and an absent one look the same to the rest of the engine.

use crate::model::{Collection, FhirPathValue, TypeRegistry};

/// Children named `name` of every item in `input`
pub fn step(input: &Collection, name: &str) -> Collection {
    input
        .iter()
        .flat_map(|item| item.children(name))
        .filter(FhirPathValue::has_value)
        .collect()
}

/// Leading identifier step. A name that denotes the item's own type (or one of
/// its base types) passes the item through unchanged; otherwise it is a child step.
pub fn step_identifier(input: &Collection, name: &str, types: &TypeRegistry) -> Collection {
    if !is_type_like(name) {
        return step(input, name);
    }

    let mut result = Collection::empty();
    for item in input.iter() {
        if item.as_complex().is_some() && types.is_subtype_of(item.type_name(), name) {
            result.push(item.clone());
        } else {
            result.extend(item.children(name).into_iter().filter(FhirPathValue::has_value));
        }
    }
    result
}

fn is_type_like(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Every direct child of `value`, in field order
pub fn all_children(value: &FhirPathValue) -> Vec<FhirPathValue> {
    let Some(node) = value.as_complex() else {
        return Vec::new();
    };
    node.field_names()
        .iter()
        .flat_map(|field| node.children(field))
        .filter(FhirPathValue::has_value)
        .collect()
}

/// Every descendant of `value`, depth first
pub fn all_descendants(value: &FhirPathValue) -> Vec<FhirPathValue> {
    let mut result = Vec::new();
    let mut stack: Vec<FhirPathValue> = all_children(value).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        stack.extend(all_children(&node).into_iter().rev());
        result.push(node);
    }
    result
}
