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

//! String functions
//!
//! All of these take a singleton string input: an empty input yields empty, a
//! non-string input is a `TypeMismatch`.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use regex::Regex;

use crate::core::{FhirPathError, Result};
use crate::model::{Collection, FhirPathValue};
use crate::registry::signature::{FunctionCategory, FunctionSignature, ParameterType, ValueType};
use crate::registry::traits::{OperationContext, SyncOperation};

use super::{integer_arg, string_arg, string_input};

const REGEX_CACHE_SIZE: usize = 256;

static REGEX_CACHE: LazyLock<RegexCache> = LazyLock::new(|| RegexCache::new(REGEX_CACHE_SIZE));

/// Compiled patterns keyed by source text, bounded like the AST cache
struct RegexCache {
    entries: DashMap<String, (Regex, u64)>,
    clock: AtomicU64,
    max_entries: usize,
}

impl RegexCache {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            clock: AtomicU64::new(0),
            max_entries: max_entries.max(1),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex> {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        if let Some(mut entry) = self.entries.get_mut(pattern) {
            entry.1 = tick;
            return Ok(entry.0.clone());
        }
        let regex = Regex::new(pattern).map_err(|e| {
            FhirPathError::evaluation_error(format!("invalid regular expression '{pattern}': {e}"))
        })?;
        if self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        self.entries.insert(pattern.to_string(), (regex.clone(), tick));
        Ok(regex)
    }

    fn evict_oldest(&self) {
        let mut ages: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|entry| (entry.value().1, entry.key().clone()))
            .collect();
        ages.sort_unstable_by_key(|(age, _)| *age);
        let count = (self.max_entries / 10).max(1);
        for (_, pattern) in ages.into_iter().take(count) {
            self.entries.remove(&pattern);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn compile_regex(pattern: &str) -> Result<Regex> {
    REGEX_CACHE.get_or_compile(pattern)
}

fn string_signature(
    name: &'static str,
    parameters: Vec<ParameterType>,
    return_type: ValueType,
) -> FunctionSignature {
    FunctionSignature::new(name, parameters, return_type, FunctionCategory::Scalar).scalar_input()
}

/// Apply `f` to the input string and one string argument; empty if either is missing
fn with_string_arg(
    name: &str,
    args: &[Collection],
    context: &OperationContext<'_>,
    f: impl FnOnce(&str, &str) -> Result<Collection>,
) -> Result<Collection> {
    let Some(input) = string_input(context.input, name)? else {
        return Ok(Collection::empty());
    };
    let Some(arg) = string_arg(args, 0, name)? else {
        return Ok(Collection::empty());
    };
    f(input, arg)
}

/// startsWith(prefix)
pub struct SimpleStartsWithFunction;

impl SyncOperation for SimpleStartsWithFunction {
    fn name(&self) -> &'static str {
        "startsWith"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            string_signature("startsWith", vec![ParameterType::String], ValueType::Boolean)
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        with_string_arg(self.name(), args, context, |input, prefix| {
            Ok(Collection::boolean(input.starts_with(prefix)))
        })
    }
}

/// endsWith(suffix)
pub struct SimpleEndsWithFunction;

impl SyncOperation for SimpleEndsWithFunction {
    fn name(&self) -> &'static str {
        "endsWith"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            string_signature("endsWith", vec![ParameterType::String], ValueType::Boolean)
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        with_string_arg(self.name(), args, context, |input, suffix| {
            Ok(Collection::boolean(input.ends_with(suffix)))
        })
    }
}

/// contains(substring)
pub struct SimpleContainsFunction;

impl SyncOperation for SimpleContainsFunction {
    fn name(&self) -> &'static str {
        "contains"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            string_signature("contains", vec![ParameterType::String], ValueType::Boolean)
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        with_string_arg(self.name(), args, context, |input, needle| {
            Ok(Collection::boolean(input.contains(needle)))
        })
    }
}

/// indexOf(substring): 0-based character index, -1 when absent
pub struct SimpleIndexOfFunction;

impl SyncOperation for SimpleIndexOfFunction {
    fn name(&self) -> &'static str {
        "indexOf"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            string_signature("indexOf", vec![ParameterType::String], ValueType::Integer)
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        with_string_arg(self.name(), args, context, |input, needle| {
            let index = match input.find(needle) {
                Some(byte_index) => input[..byte_index].chars().count() as i64,
                None => -1,
            };
            Ok(Collection::single(FhirPathValue::integer(index)))
        })
    }
}

/// length(): number of characters
pub struct SimpleLengthFunction;

impl SyncOperation for SimpleLengthFunction {
    fn name(&self) -> &'static str {
        "length"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> =
            LazyLock::new(|| string_signature("length", vec![], ValueType::Integer));
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        Ok(match string_input(context.input, self.name())? {
            Some(input) => Collection::single(FhirPathValue::integer(input.chars().count() as i64)),
            None => Collection::empty(),
        })
    }
}

/// upper()
pub struct SimpleUpperFunction;

impl SyncOperation for SimpleUpperFunction {
    fn name(&self) -> &'static str {
        "upper"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> =
            LazyLock::new(|| string_signature("upper", vec![], ValueType::String));
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        Ok(string_input(context.input, self.name())?
            .map(|s| FhirPathValue::string(s.to_uppercase()))
            .into_iter()
            .collect())
    }
}

/// lower()
pub struct SimpleLowerFunction;

impl SyncOperation for SimpleLowerFunction {
    fn name(&self) -> &'static str {
        "lower"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> =
            LazyLock::new(|| string_signature("lower", vec![], ValueType::String));
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        Ok(string_input(context.input, self.name())?
            .map(|s| FhirPathValue::string(s.to_lowercase()))
            .into_iter()
            .collect())
    }
}

/// substring(start [, length]): characters from `start`; empty when `start` is out of range
pub struct SimpleSubstringFunction;

impl SyncOperation for SimpleSubstringFunction {
    fn name(&self) -> &'static str {
        "substring"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            string_signature("substring", vec![ParameterType::Integer], ValueType::String)
                .with_optional(vec![ParameterType::Integer])
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let Some(input) = string_input(context.input, self.name())? else {
            return Ok(Collection::empty());
        };
        let Some(start) = integer_arg(args, 0, self.name())? else {
            return Ok(Collection::empty());
        };
        let char_count = input.chars().count();
        let start = match usize::try_from(start) {
            Ok(start) if start < char_count => start,
            _ => return Ok(Collection::empty()),
        };
        let length = match integer_arg(args, 1, self.name())? {
            Some(length) => usize::try_from(length).unwrap_or(0),
            None => char_count - start,
        };
        let result: String = input.chars().skip(start).take(length).collect();
        Ok(Collection::single(FhirPathValue::string(result)))
    }
}

/// matches(regex): whether the regex matches anywhere in the input
pub struct SimpleMatchesFunction;

impl SyncOperation for SimpleMatchesFunction {
    fn name(&self) -> &'static str {
        "matches"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            string_signature("matches", vec![ParameterType::String], ValueType::Boolean)
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        with_string_arg(self.name(), args, context, |input, pattern| {
            Ok(Collection::boolean(compile_regex(pattern)?.is_match(input)))
        })
    }
}

/// replace(pattern, substitution): literal replacement of every occurrence
pub struct SimpleReplaceFunction;

impl SyncOperation for SimpleReplaceFunction {
    fn name(&self) -> &'static str {
        "replace"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            string_signature(
                "replace",
                vec![ParameterType::String, ParameterType::String],
                ValueType::String,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let Some(substitution) = string_arg(args, 1, self.name())? else {
            return Ok(Collection::empty());
        };
        with_string_arg(self.name(), args, context, |input, pattern| {
            Ok(Collection::single(FhirPathValue::string(
                input.replace(pattern, substitution),
            )))
        })
    }
}

/// replaceMatches(regex, substitution): `$1`-style group references are expanded
pub struct SimpleReplaceMatchesFunction;

impl SyncOperation for SimpleReplaceMatchesFunction {
    fn name(&self) -> &'static str {
        "replaceMatches"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            string_signature(
                "replaceMatches",
                vec![ParameterType::String, ParameterType::String],
                ValueType::String,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let Some(substitution) = string_arg(args, 1, self.name())? else {
            return Ok(Collection::empty());
        };
        with_string_arg(self.name(), args, context, |input, pattern| {
            let regex = compile_regex(pattern)?;
            Ok(Collection::single(FhirPathValue::string(
                regex.replace_all(input, substitution).into_owned(),
            )))
        })
    }
}
