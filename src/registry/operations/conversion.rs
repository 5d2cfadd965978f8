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

//! Conversion functions; inputs that cannot be converted yield empty

use std::str::FromStr;
use std::sync::LazyLock;

use rust_decimal::Decimal;

use crate::core::Result;
use crate::model::{Collection, FhirPathValue, PrimitiveValue};
use crate::registry::signature::{FunctionCategory, FunctionSignature, ValueType};
use crate::registry::traits::{OperationContext, SyncOperation};

fn conversion_signature(name: &'static str, return_type: ValueType) -> FunctionSignature {
    FunctionSignature::no_args(name, return_type, FunctionCategory::Scalar).scalar_input()
}

fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// toString(): textual form of a primitive
pub struct SimpleToStringFunction;

impl SyncOperation for SimpleToStringFunction {
    fn name(&self) -> &'static str {
        "toString"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> =
            LazyLock::new(|| conversion_signature("toString", ValueType::String));
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        Ok(context
            .input
            .singleton(self.name())?
            .and_then(FhirPathValue::to_fhirpath_string)
            .map(FhirPathValue::string)
            .into_iter()
            .collect())
    }
}

/// toInteger()
pub struct SimpleToIntegerFunction;

impl SyncOperation for SimpleToIntegerFunction {
    fn name(&self) -> &'static str {
        "toInteger"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> =
            LazyLock::new(|| conversion_signature("toInteger", ValueType::Integer));
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let converted = match context
            .input
            .singleton(self.name())?
            .and_then(FhirPathValue::as_primitive)
        {
            Some(PrimitiveValue::Integer(i)) => Some(*i),
            Some(PrimitiveValue::Boolean(b)) => Some(i64::from(*b)),
            Some(PrimitiveValue::String(s)) if is_integer_text(s) => s.parse::<i64>().ok(),
            _ => None,
        };
        Ok(converted.map(FhirPathValue::integer).into_iter().collect())
    }
}

/// toDecimal()
pub struct SimpleToDecimalFunction;

impl SyncOperation for SimpleToDecimalFunction {
    fn name(&self) -> &'static str {
        "toDecimal"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: LazyLock<FunctionSignature> =
            LazyLock::new(|| conversion_signature("toDecimal", ValueType::Decimal));
        &SIGNATURE
    }

    fn execute(&self, _args: &[Collection], context: &OperationContext<'_>) -> Result<Collection> {
        let converted = match context
            .input
            .singleton(self.name())?
            .and_then(FhirPathValue::as_primitive)
        {
            Some(PrimitiveValue::Decimal(d)) => Some(*d),
            Some(PrimitiveValue::Integer(i)) => Some(Decimal::from(*i)),
            Some(PrimitiveValue::Boolean(b)) => Some(Decimal::from(u8::from(*b))),
            Some(PrimitiveValue::String(s)) => {
                let (whole, fraction) = s.split_once('.').unwrap_or((s.as_str(), "0"));
                let valid = is_integer_text(whole)
                    && !fraction.is_empty()
                    && fraction.bytes().all(|b| b.is_ascii_digit());
                if valid { Decimal::from_str(s).ok() } else { None }
            }
            _ => None,
        };
        Ok(converted.map(FhirPathValue::decimal).into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementNode;
    use crate::registry::operations::test_support::run;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("42", Some(42))]
    #[case("-7", Some(-7))]
    #[case("4.2", None)]
    #[case("abc", None)]
    fn test_to_integer_from_string(#[case] input: &str, #[case] expected: Option<i64>) {
        let result = run(&SimpleToIntegerFunction, vec![FhirPathValue::string(input)], vec![]).unwrap();
        assert_eq!(result.first().and_then(FhirPathValue::as_integer), expected);
    }

    #[test]
    fn test_to_decimal() {
        let result = run(&SimpleToDecimalFunction, vec![FhirPathValue::string("1.50")], vec![]).unwrap();
        assert_eq!(result.to_strings(), vec!["1.50"]);
        let result = run(&SimpleToDecimalFunction, vec![FhirPathValue::string("1.")], vec![]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_to_string_skips_complex_values() {
        let result = run(&SimpleToStringFunction, vec![FhirPathValue::integer(5)], vec![]).unwrap();
        assert_eq!(result.to_strings(), vec!["5"]);
        let result = run(
            &SimpleToStringFunction,
            vec![ElementNode::new("HumanName").into_value()],
            vec![],
        )
        .unwrap();
        assert!(result.is_empty());
    }
}
