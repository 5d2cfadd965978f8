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

//! Collection functions: subsetting, counting and set operations

use std::sync::LazyLock;

use crate::core::{FhirPathError, Result};
use crate::evaluator::operators::{distinct_values, items_equal};
use crate::model::{Collection, FhirPathValue};
use crate::registry::signature::{FunctionCategory, FunctionSignature, ParameterType, ValueType};
use crate::registry::traits::{OperationContext, SyncOperation};

use super::integer_arg;

/// empty(): true if the input collection is empty
pub struct SimpleEmptyFunction;

impl SyncOperation for SimpleEmptyFunction {
    fn name(&self) -> &'static str {
        "empty"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("empty", ValueType::Boolean, FunctionCategory::Collection)
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let empty = context.input.iter().all(|item| !item.has_value());
        Ok(Collection::boolean(empty))
    }
}

/// first(): the first item, or empty
pub struct SimpleFirstFunction;

impl SyncOperation for SimpleFirstFunction {
    fn name(&self) -> &'static str {
        "first"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("first", ValueType::Any, FunctionCategory::Collection)
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        Ok(context.input.first().cloned().into_iter().collect())
    }
}

/// last(): the last item, or empty
pub struct SimpleLastFunction;

impl SyncOperation for SimpleLastFunction {
    fn name(&self) -> &'static str {
        "last"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("last", ValueType::Any, FunctionCategory::Collection)
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        Ok(context.input.as_slice().last().cloned().into_iter().collect())
    }
}

/// tail(): all items except the first
pub struct SimpleTailFunction;

impl SyncOperation for SimpleTailFunction {
    fn name(&self) -> &'static str {
        "tail"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("tail", ValueType::Collection, FunctionCategory::Collection)
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        Ok(context.input.iter().skip(1).cloned().collect())
    }
}

/// skip(num): all items after the first `num`
pub struct SimpleSkipFunction;

impl SyncOperation for SimpleSkipFunction {
    fn name(&self) -> &'static str {
        "skip"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "skip",
                vec![ParameterType::Integer],
                ValueType::Collection,
                FunctionCategory::Collection,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let Some(count) = integer_arg(args, 0, self.name())? else {
            return Ok(Collection::empty());
        };
        let count = usize::try_from(count).unwrap_or(0);
        Ok(context.input.iter().skip(count).cloned().collect())
    }
}

/// take(num): the first `num` items
pub struct SimpleTakeFunction;

impl SyncOperation for SimpleTakeFunction {
    fn name(&self) -> &'static str {
        "take"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "take",
                vec![ParameterType::Integer],
                ValueType::Collection,
                FunctionCategory::Collection,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let Some(count) = integer_arg(args, 0, self.name())? else {
            return Ok(Collection::empty());
        };
        let count = usize::try_from(count).unwrap_or(0);
        Ok(context.input.iter().take(count).cloned().collect())
    }
}

/// single(): the only item; more than one is an error
pub struct SimpleSingleFunction;

impl SyncOperation for SimpleSingleFunction {
    fn name(&self) -> &'static str {
        "single"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("single", ValueType::Any, FunctionCategory::Collection)
                .scalar_input()
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        Ok(context
            .input
            .singleton(self.name())?
            .cloned()
            .into_iter()
            .collect())
    }
}

/// count(): number of items
pub struct SimpleCountFunction;

impl SyncOperation for SimpleCountFunction {
    fn name(&self) -> &'static str {
        "count"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args("count", ValueType::Integer, FunctionCategory::Collection)
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let count = i64::try_from(context.input.len())
            .map_err(|_| FhirPathError::evaluation_error("collection too large to count"))?;
        Ok(Collection::single(FhirPathValue::integer(count)))
    }
}

/// distinct(): items with duplicates removed, first occurrence kept
pub struct SimpleDistinctFunction;

impl SyncOperation for SimpleDistinctFunction {
    fn name(&self) -> &'static str {
        "distinct"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args(
                "distinct",
                ValueType::Collection,
                FunctionCategory::Collection,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        Ok(distinct_values(context.input.iter().cloned()))
    }
}

/// isDistinct(): true if no two items are equal
pub struct SimpleIsDistinctFunction;

impl SyncOperation for SimpleIsDistinctFunction {
    fn name(&self) -> &'static str {
        "isDistinct"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::no_args(
                "isDistinct",
                ValueType::Boolean,
                FunctionCategory::Collection,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let items = context.input.as_slice();
        let distinct = items
            .iter()
            .enumerate()
            .all(|(i, item)| items[i + 1..].iter().all(|other| !items_equal(item, other)));
        Ok(Collection::boolean(distinct))
    }
}

/// union(other): merge with `other`, removing duplicates
pub struct SimpleUnionFunction;

impl SyncOperation for SimpleUnionFunction {
    fn name(&self) -> &'static str {
        "union"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "union",
                vec![ParameterType::Collection],
                ValueType::Collection,
                FunctionCategory::Collection,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let other = args.first().map(Collection::as_slice).unwrap_or_default();
        Ok(distinct_values(
            context.input.iter().chain(other.iter()).cloned(),
        ))
    }
}

/// combine(other): append `other`, keeping duplicates
pub struct SimpleCombineFunction;

impl SyncOperation for SimpleCombineFunction {
    fn name(&self) -> &'static str {
        "combine"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "combine",
                vec![ParameterType::Collection],
                ValueType::Collection,
                FunctionCategory::Collection,
            )
        });
        &SIGNATURE
    }

    fn execute(&self, args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let mut result = context.input.clone();
        if let Some(other) = args.first() {
            result.extend(other.iter().cloned());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::operations::test_support::run;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i64]) -> Vec<FhirPathValue> {
        values.iter().map(|v| FhirPathValue::integer(*v)).collect()
    }

    fn as_ints(collection: &Collection) -> Vec<i64> {
        collection.iter().filter_map(FhirPathValue::as_integer).collect()
    }

    #[test]
    fn test_tail_drops_first_item() {
        let result = run(&SimpleTailFunction, ints(&[1, 2, 3]), vec![]).unwrap();
        assert_eq!(as_ints(&result), vec![2, 3]);

        let result = run(&SimpleTailFunction, ints(&[1]), vec![]).unwrap();
        assert!(result.is_empty());

        let result = run(&SimpleTailFunction, vec![], vec![]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_first_last_on_empty() {
        assert!(run(&SimpleFirstFunction, vec![], vec![]).unwrap().is_empty());
        assert!(run(&SimpleLastFunction, vec![], vec![]).unwrap().is_empty());
        let result = run(&SimpleLastFunction, ints(&[4, 5]), vec![]).unwrap();
        assert_eq!(as_ints(&result), vec![5]);
    }

    #[test]
    fn test_skip_and_take() {
        let n = |v| vec![Collection::single(FhirPathValue::integer(v))];
        let skipped = run(&SimpleSkipFunction, ints(&[1, 2, 3]), n(2)).unwrap();
        assert_eq!(as_ints(&skipped), vec![3]);
        let taken = run(&SimpleTakeFunction, ints(&[1, 2, 3]), n(2)).unwrap();
        assert_eq!(as_ints(&taken), vec![1, 2]);
        let none = run(&SimpleTakeFunction, ints(&[1, 2, 3]), n(-1)).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_single_rejects_many() {
        let err = run(&SimpleSingleFunction, ints(&[1, 2]), vec![]).unwrap_err();
        assert_eq!(err, FhirPathError::singleton_expected("single", 2));
    }

    #[test]
    fn test_distinct_union_combine() {
        let result = run(&SimpleDistinctFunction, ints(&[1, 2, 1, 3, 2]), vec![]).unwrap();
        assert_eq!(as_ints(&result), vec![1, 2, 3]);

        let other = vec![Collection::from_vec(ints(&[3, 4]))];
        let union = run(&SimpleUnionFunction, ints(&[1, 3]), other.clone()).unwrap();
        assert_eq!(as_ints(&union), vec![1, 3, 4]);
        let combined = run(&SimpleCombineFunction, ints(&[1, 3]), other).unwrap();
        assert_eq!(as_ints(&combined), vec![1, 3, 3, 4]);

        let result = run(&SimpleIsDistinctFunction, ints(&[1, 2, 1]), vec![]).unwrap();
        assert_eq!(result.first().and_then(FhirPathValue::as_boolean), Some(false));
    }

    #[test]
    fn test_count_and_empty() {
        let result = run(&SimpleCountFunction, ints(&[7, 8]), vec![]).unwrap();
        assert_eq!(as_ints(&result), vec![2]);
        let result = run(&SimpleEmptyFunction, vec![], vec![]).unwrap();
        assert_eq!(result.first().and_then(FhirPathValue::as_boolean), Some(true));
    }
}
