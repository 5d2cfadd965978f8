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

//! Operator layer
//!
//! Type-driven semantics for the binary and unary operators. Missing data is an
//! empty result, never an error: an empty operand, incomparable values,
//! division by zero and overflow all produce an empty collection. Operand types
//! an operator cannot handle at all are a `TypeMismatch`/`InvalidOperandTypes` error.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::core::{FhirPathError, Result};
use crate::model::quantity::decimals_equivalent;
use crate::model::{Collection, ComplexNode, FhirPathValue, PrimitiveValue, Quantity};

// ---------------------------------------------------------------------------
// Logic
// ---------------------------------------------------------------------------

/// Three-valued reading of a logic operand: empty is `None`, a single boolean is
/// itself, and any other single value is `true`
pub fn to_logic(collection: &Collection, context: &str) -> Result<Option<bool>> {
    Ok(collection
        .singleton(context)?
        .map(|value| value.as_boolean().unwrap_or(true)))
}

/// Three-valued `and`
pub fn and(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// Three-valued `or`
pub fn or(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// Three-valued `xor`
pub fn xor(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(a), Some(b)) => Some(a != b),
        _ => None,
    }
}

/// Three-valued `implies`
pub fn implies(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) => Some(true),
        (Some(true), right) => right,
        (None, Some(true)) => Some(true),
        (None, _) => None,
    }
}

/// Result of `and`/`or`/`implies` decided by the left operand alone
pub fn short_circuit(operator: BinaryOperator, left: &Collection) -> Result<Option<Collection>> {
    let decided = match operator {
        BinaryOperator::And => to_logic(left, operator.symbol())? == Some(false),
        BinaryOperator::Or => to_logic(left, operator.symbol())? == Some(true),
        BinaryOperator::Implies => to_logic(left, operator.symbol())? == Some(false),
        _ => return Ok(None),
    };
    Ok(decided.then(|| Collection::boolean(operator != BinaryOperator::And)))
}

/// Apply a binary operator to evaluated operands
pub fn binary(
    operator: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> Result<Collection> {
    use BinaryOperator as Op;
    let symbol = operator.symbol();
    match operator {
        Op::And | Op::Or | Op::Xor | Op::Implies => {
            let l = to_logic(left, symbol)?;
            let r = to_logic(right, symbol)?;
            let result = match operator {
                Op::And => and(l, r),
                Op::Or => or(l, r),
                Op::Xor => xor(l, r),
                _ => implies(l, r),
            };
            Ok(Collection::from_option_bool(result))
        }
        Op::Equal => Ok(Collection::from_option_bool(equals(left, right))),
        Op::NotEqual => Ok(Collection::from_option_bool(equals(left, right).map(|b| !b))),
        Op::Equivalent => Ok(Collection::boolean(equivalent(left, right))),
        Op::NotEquivalent => Ok(Collection::boolean(!equivalent(left, right))),
        Op::LessThan | Op::LessThanOrEqual | Op::GreaterThan | Op::GreaterThanOrEqual => {
            compare(operator, left, right)
        }
        Op::Add | Op::Subtract | Op::Multiply | Op::Divide | Op::IntegerDivide | Op::Modulo => {
            arithmetic(operator, left, right)
        }
        Op::Concatenate => concatenate(left, right),
        Op::Union => Ok(union(left, right)),
        Op::In => membership(left, right, symbol),
        Op::Contains => membership(right, left, symbol),
    }
}

// ---------------------------------------------------------------------------
// Equality
// ---------------------------------------------------------------------------

/// `=`: `None` (empty) when either side is empty or the items cannot be compared
pub fn equals(left: &Collection, right: &Collection) -> Option<bool> {
    if left.is_empty() || right.is_empty() {
        return None;
    }
    if left.len() != right.len() {
        return Some(false);
    }
    let mut unknown = false;
    for (a, b) in left.iter().zip(right.iter()) {
        match value_equals(a, b) {
            Some(false) => return Some(false),
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown { None } else { Some(true) }
}

/// Item equality; `None` when the two values cannot be compared
pub fn value_equals(a: &FhirPathValue, b: &FhirPathValue) -> Option<bool> {
    match (a, b) {
        (FhirPathValue::Complex(a), FhirPathValue::Complex(b)) => {
            Some(complex_matches(a.as_ref(), b.as_ref(), |x, y| {
                x.len() == y.len()
                    && x.iter().zip(y.iter()).all(|(x, y)| items_equal(x, y))
            }))
        }
        (FhirPathValue::Primitive(_), FhirPathValue::Primitive(_)) => {
            match (a.as_primitive(), b.as_primitive()) {
                (Some(a), Some(b)) => primitive_equals(a, b),
                _ => None,
            }
        }
        _ => Some(false),
    }
}

/// Whether two items are equal, treating incomparable as unequal
pub fn items_equal(a: &FhirPathValue, b: &FhirPathValue) -> bool {
    value_equals(a, b) == Some(true)
}

/// Values with duplicates removed, first occurrence kept
pub fn distinct_values(values: impl IntoIterator<Item = FhirPathValue>) -> Collection {
    let mut result: Vec<FhirPathValue> = Vec::new();
    for value in values {
        if !result.iter().any(|seen| items_equal(seen, &value)) {
            result.push(value);
        }
    }
    Collection::from_vec(result)
}

fn primitive_equals(a: &PrimitiveValue, b: &PrimitiveValue) -> Option<bool> {
    use PrimitiveValue as P;
    match (a, b) {
        (P::Boolean(a), P::Boolean(b)) => Some(a == b),
        (P::String(a), P::String(b)) => Some(a == b),
        (P::Quantity(a), P::Quantity(b)) => a.equals(b),
        (P::Time(a), P::Time(b)) => a.compare(b).map(|o| o == Ordering::Equal),
        _ => match numeric_pair(a, b) {
            Some(pair) => {
                let (a, b) = pair.as_decimal_pair();
                Some(a == b)
            }
            None => temporal_ordering(a, b).map(|o| o == Ordering::Equal),
        },
    }
}

/// Deep comparison of two complex nodes: same type, same fields, and
/// `children_match` for each field's children
fn complex_matches(
    a: &dyn ComplexNode,
    b: &dyn ComplexNode,
    children_match: impl Fn(&[FhirPathValue], &[FhirPathValue]) -> bool,
) -> bool {
    if a.type_name() != b.type_name() {
        return false;
    }
    let mut a_fields = a.field_names();
    let mut b_fields = b.field_names();
    a_fields.sort_unstable();
    b_fields.sort_unstable();
    a_fields == b_fields
        && a_fields
            .iter()
            .all(|field| children_match(&a.children(field), &b.children(field)))
}

// ---------------------------------------------------------------------------
// Equivalence
// ---------------------------------------------------------------------------

/// `~`: never empty. Two empty collections are equivalent; order does not matter.
pub fn equivalent(left: &Collection, right: &Collection) -> bool {
    slices_equivalent(left.as_slice(), right.as_slice())
}

fn slices_equivalent(left: &[FhirPathValue], right: &[FhirPathValue]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut used = vec![false; right.len()];
    left.iter().all(|a| {
        let found = right
            .iter()
            .enumerate()
            .find(|(i, b)| !used[*i] && value_equivalent(a, b))
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// Item equivalence
pub fn value_equivalent(a: &FhirPathValue, b: &FhirPathValue) -> bool {
    match (a, b) {
        (FhirPathValue::Complex(a), FhirPathValue::Complex(b)) => {
            complex_matches(a.as_ref(), b.as_ref(), slices_equivalent)
        }
        (FhirPathValue::Primitive(_), FhirPathValue::Primitive(_)) => {
            match (a.as_primitive(), b.as_primitive()) {
                (Some(a), Some(b)) => primitive_equivalent(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        _ => false,
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn primitive_equivalent(a: &PrimitiveValue, b: &PrimitiveValue) -> bool {
    use PrimitiveValue as P;
    match (a, b) {
        (P::Boolean(a), P::Boolean(b)) => a == b,
        (P::String(a), P::String(b)) => normalize_text(a) == normalize_text(b),
        (P::Quantity(a), P::Quantity(b)) => a.equivalent(b),
        (P::Date(a), P::Date(b)) => a.equivalent(b),
        (P::DateTime(a), P::DateTime(b)) => a.equivalent(b),
        (P::Date(a), P::DateTime(b)) => a.to_datetime().equivalent(b),
        (P::DateTime(a), P::Date(b)) => a.equivalent(&b.to_datetime()),
        (P::Time(a), P::Time(b)) => a.equivalent(b),
        _ => match numeric_pair(a, b) {
            Some(pair) => {
                let (a, b) = pair.as_decimal_pair();
                decimals_equivalent(a, b)
            }
            None => false,
        },
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// `<`, `<=`, `>`, `>=` on singleton operands
pub fn compare(
    operator: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> Result<Collection> {
    let symbol = operator.symbol();
    let (Some(a), Some(b)) = (left.singleton(symbol)?, right.singleton(symbol)?) else {
        return Ok(Collection::empty());
    };
    let ordering = match (a.as_primitive(), b.as_primitive()) {
        (Some(a), Some(b)) => primitive_ordering(a, b),
        _ => None,
    };
    let result = ordering.map(|ordering| match operator {
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    });
    Ok(Collection::from_option_bool(result))
}

fn primitive_ordering(a: &PrimitiveValue, b: &PrimitiveValue) -> Option<Ordering> {
    use PrimitiveValue as P;
    match (a, b) {
        (P::String(a), P::String(b)) => Some(a.cmp(b)),
        (P::Quantity(a), P::Quantity(b)) => a.compare(b),
        (P::Time(a), P::Time(b)) => a.compare(b),
        _ => match numeric_pair(a, b) {
            Some(pair) => {
                let (a, b) = pair.as_decimal_pair();
                Some(a.cmp(&b))
            }
            None => temporal_ordering(a, b),
        },
    }
}

fn temporal_ordering(a: &PrimitiveValue, b: &PrimitiveValue) -> Option<Ordering> {
    use PrimitiveValue as P;
    match (a, b) {
        (P::Date(a), P::Date(b)) => a.compare(b),
        (P::DateTime(a), P::DateTime(b)) => a.compare(b),
        (P::Date(a), P::DateTime(b)) => a.to_datetime().compare(b),
        (P::DateTime(a), P::Date(b)) => a.compare(&b.to_datetime()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum NumericPair {
    Integers(i64, i64),
    Decimals(Decimal, Decimal),
}

impl NumericPair {
    fn as_decimal_pair(self) -> (Decimal, Decimal) {
        match self {
            Self::Integers(a, b) => (Decimal::from(a), Decimal::from(b)),
            Self::Decimals(a, b) => (a, b),
        }
    }
}

fn numeric_pair(a: &PrimitiveValue, b: &PrimitiveValue) -> Option<NumericPair> {
    use PrimitiveValue as P;
    match (a, b) {
        (P::Integer(a), P::Integer(b)) => Some(NumericPair::Integers(*a, *b)),
        (P::Integer(a), P::Decimal(b)) => Some(NumericPair::Decimals(Decimal::from(*a), *b)),
        (P::Decimal(a), P::Integer(b)) => Some(NumericPair::Decimals(*a, Decimal::from(*b))),
        (P::Decimal(a), P::Decimal(b)) => Some(NumericPair::Decimals(*a, *b)),
        _ => None,
    }
}

fn invalid_operands(
    operator: BinaryOperator,
    a: &FhirPathValue,
    b: &FhirPathValue,
) -> FhirPathError {
    FhirPathError::InvalidOperandTypes {
        operator: operator.symbol().to_string(),
        left_type: a.qualified_type_name(),
        right_type: b.qualified_type_name(),
    }
}

/// `+ - * / div mod`
pub fn arithmetic(
    operator: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> Result<Collection> {
    let symbol = operator.symbol();
    let (Some(a), Some(b)) = (left.singleton(symbol)?, right.singleton(symbol)?) else {
        return Ok(Collection::empty());
    };
    let (Some(x), Some(y)) = (a.as_primitive(), b.as_primitive()) else {
        return Err(invalid_operands(operator, a, b));
    };

    let result = if let Some(pair) = numeric_pair(x, y) {
        numeric_arithmetic(operator, pair)
    } else if let (BinaryOperator::Add, PrimitiveValue::String(x), PrimitiveValue::String(y)) =
        (operator, x, y)
    {
        Some(PrimitiveValue::String(format!("{x}{y}")))
    } else {
        quantity_arithmetic(operator, x, y).ok_or_else(|| invalid_operands(operator, a, b))?
    };
    Ok(result.map(FhirPathValue::system).into_iter().collect())
}

fn numeric_arithmetic(operator: BinaryOperator, pair: NumericPair) -> Option<PrimitiveValue> {
    use BinaryOperator as Op;
    match (operator, pair) {
        (Op::Divide, pair) => {
            let (a, b) = pair.as_decimal_pair();
            a.checked_div(b).map(PrimitiveValue::Decimal)
        }
        (Op::IntegerDivide, NumericPair::Integers(a, b)) => {
            a.checked_div(b).map(PrimitiveValue::Integer)
        }
        (Op::IntegerDivide, NumericPair::Decimals(a, b)) => a
            .checked_div(b)
            .and_then(|q| q.trunc().to_i64())
            .map(PrimitiveValue::Integer),
        (op, NumericPair::Integers(a, b)) => match op {
            Op::Add => a.checked_add(b),
            Op::Subtract => a.checked_sub(b),
            Op::Multiply => a.checked_mul(b),
            Op::Modulo => a.checked_rem(b),
            _ => None,
        }
        .map(PrimitiveValue::Integer),
        (op, NumericPair::Decimals(a, b)) => match op {
            Op::Add => a.checked_add(b),
            Op::Subtract => a.checked_sub(b),
            Op::Multiply => a.checked_mul(b),
            Op::Modulo => a.checked_rem(b),
            _ => None,
        }
        .map(PrimitiveValue::Decimal),
    }
}

fn as_number(value: &PrimitiveValue) -> Option<Decimal> {
    match value {
        PrimitiveValue::Integer(i) => Some(Decimal::from(*i)),
        PrimitiveValue::Decimal(d) => Some(*d),
        _ => None,
    }
}

/// Quantity arithmetic; the outer `None` means the operand types are unsupported
fn quantity_arithmetic(
    operator: BinaryOperator,
    x: &PrimitiveValue,
    y: &PrimitiveValue,
) -> Option<Option<PrimitiveValue>> {
    use BinaryOperator as Op;
    use PrimitiveValue as P;
    let result = match (operator, x, y) {
        (Op::Add, P::Quantity(a), P::Quantity(b)) => a.checked_add(b),
        (Op::Subtract, P::Quantity(a), P::Quantity(b)) => a.checked_sub(b),
        (Op::Multiply, P::Quantity(q), n) | (Op::Multiply, n, P::Quantity(q)) => {
            q.checked_scale(as_number(n)?)
        }
        (Op::Divide, P::Quantity(q), n) => {
            let divisor = as_number(n)?;
            q.value
                .checked_div(divisor)
                .map(|value| Quantity::new(value, q.unit.clone()))
        }
        (Op::Add | Op::Subtract, P::Date(_) | P::DateTime(_), P::Quantity(q)) => {
            return temporal_arithmetic(operator, x, q);
        }
        _ => return None,
    };
    Some(result.map(P::Quantity))
}

/// Date or DateTime shifted by a calendar quantity; overflow is empty
fn temporal_arithmetic(
    operator: BinaryOperator,
    value: &PrimitiveValue,
    quantity: &Quantity,
) -> Option<Option<PrimitiveValue>> {
    let duration = quantity.calendar_duration()?;
    let duration = match operator {
        BinaryOperator::Subtract => duration.checked_neg(),
        _ => Some(duration),
    };
    let shifted = match value {
        PrimitiveValue::Date(date) => duration
            .and_then(|d| date.checked_add(d))
            .map(PrimitiveValue::Date),
        PrimitiveValue::DateTime(datetime) => duration
            .and_then(|d| datetime.checked_add(d))
            .map(PrimitiveValue::DateTime),
        _ => return None,
    };
    Some(shifted)
}

/// Unary `-` and `+`
pub fn unary(operator: UnaryOperator, operand: &Collection) -> Result<Collection> {
    let Some(value) = operand.singleton(operator.symbol())? else {
        return Ok(Collection::empty());
    };
    let result = match (operator, value.as_primitive()) {
        (
            UnaryOperator::Positive,
            Some(PrimitiveValue::Integer(_) | PrimitiveValue::Decimal(_) | PrimitiveValue::Quantity(_)),
        ) => return Ok(Collection::single(value.clone())),
        (UnaryOperator::Negate, Some(PrimitiveValue::Integer(i))) => {
            i.checked_neg().map(PrimitiveValue::Integer)
        }
        (UnaryOperator::Negate, Some(PrimitiveValue::Decimal(d))) => {
            Some(PrimitiveValue::Decimal(-*d))
        }
        (UnaryOperator::Negate, Some(PrimitiveValue::Quantity(q))) => {
            Some(PrimitiveValue::Quantity(Quantity::new(-q.value, q.unit.clone())))
        }
        _ => {
            return Err(FhirPathError::type_mismatch(
                "Integer, Decimal or Quantity",
                value.qualified_type_name(),
                Some(format!("unary '{}'", operator.symbol())),
            ));
        }
    };
    Ok(result.map(FhirPathValue::system).into_iter().collect())
}

// ---------------------------------------------------------------------------
// Strings and collections
// ---------------------------------------------------------------------------

fn concat_operand(collection: &Collection) -> Result<String> {
    match collection.singleton("&")? {
        None => Ok(String::new()),
        Some(value) => value.to_fhirpath_string().ok_or_else(|| {
            FhirPathError::type_mismatch(
                "String",
                value.qualified_type_name(),
                Some("'&'".to_string()),
            )
        }),
    }
}

/// `&`: joins the textual forms of both singletons; empty reads as `""`
pub fn concatenate(left: &Collection, right: &Collection) -> Result<Collection> {
    let joined = concat_operand(left)? + &concat_operand(right)?;
    Ok(Collection::single(FhirPathValue::string(joined)))
}

/// `in` (and `contains` with the operands swapped)
pub fn membership(
    element: &Collection,
    collection: &Collection,
    symbol: &str,
) -> Result<Collection> {
    let Some(item) = element.singleton(symbol)? else {
        return Ok(Collection::empty());
    };
    let found = collection.iter().any(|candidate| items_equal(item, candidate));
    Ok(Collection::boolean(found))
}

/// `|`: both sides merged with duplicates removed
pub fn union(left: &Collection, right: &Collection) -> Collection {
    distinct_values(left.iter().chain(right.iter()).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PrecisionDate, PrecisionDateTime};
    use crate::model::{ElementNode, PrimitiveNode};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::str::FromStr;

    fn one(value: FhirPathValue) -> Collection {
        Collection::single(value)
    }

    fn dec(text: &str) -> FhirPathValue {
        FhirPathValue::decimal(Decimal::from_str(text).unwrap())
    }

    fn date(text: &str) -> FhirPathValue {
        FhirPathValue::system(PrimitiveValue::Date(PrecisionDate::parse(text).unwrap()))
    }

    fn datetime(text: &str) -> FhirPathValue {
        FhirPathValue::system(PrimitiveValue::DateTime(PrecisionDateTime::parse(text).unwrap()))
    }

    #[rstest]
    #[case(Some(true), Some(true), Some(true))]
    #[case(Some(false), None, Some(false))]
    #[case(None, Some(false), Some(false))]
    #[case(None, Some(true), None)]
    #[case(None, None, None)]
    fn test_and_table(
        #[case] left: Option<bool>,
        #[case] right: Option<bool>,
        #[case] expected: Option<bool>,
    ) {
        assert_eq!(and(left, right), expected);
    }

    #[rstest]
    #[case(Some(true), None, Some(true))]
    #[case(Some(false), None, None)]
    #[case(Some(false), Some(false), Some(false))]
    fn test_or_table(
        #[case] left: Option<bool>,
        #[case] right: Option<bool>,
        #[case] expected: Option<bool>,
    ) {
        assert_eq!(or(left, right), expected);
    }

    #[test]
    fn test_short_circuit() {
        let f = one(FhirPathValue::boolean(false));
        let t = one(FhirPathValue::boolean(true));
        let and_result = short_circuit(BinaryOperator::And, &f).unwrap().unwrap();
        assert_eq!(and_result.first().and_then(FhirPathValue::as_boolean), Some(false));
        let or_result = short_circuit(BinaryOperator::Or, &t).unwrap().unwrap();
        assert_eq!(or_result.first().and_then(FhirPathValue::as_boolean), Some(true));
        let implies_result = short_circuit(BinaryOperator::Implies, &f).unwrap().unwrap();
        assert_eq!(implies_result.first().and_then(FhirPathValue::as_boolean), Some(true));
        assert!(short_circuit(BinaryOperator::And, &Collection::empty()).unwrap().is_none());
        assert!(short_circuit(BinaryOperator::Xor, &t).unwrap().is_none());
    }

    #[test]
    fn test_implies_and_xor() {
        assert_eq!(implies(Some(false), None), Some(true));
        assert_eq!(implies(None, Some(true)), Some(true));
        assert_eq!(implies(Some(true), None), None);
        assert_eq!(xor(Some(true), Some(false)), Some(true));
        assert_eq!(xor(Some(true), None), None);
    }

    #[test]
    fn test_equality_with_empty_and_sizes() {
        let a = one(FhirPathValue::integer(1));
        assert_eq!(equals(&a, &Collection::empty()), None);
        let two = Collection::from_vec(vec![FhirPathValue::integer(1), FhirPathValue::integer(2)]);
        assert_eq!(equals(&a, &two), Some(false));
        assert_eq!(equals(&a, &one(dec("1.0"))), Some(true));
        assert_eq!(equals(&a, &one(FhirPathValue::string("1"))), None);
    }

    #[test]
    fn test_date_precision_equality() {
        assert_eq!(equals(&one(date("2012-04")), &one(date("2012-04-15"))), None);
        assert_eq!(equals(&one(date("2012-04")), &one(date("2012-05-15"))), Some(false));
        assert_eq!(
            equals(&one(date("2012-04-15")), &one(datetime("2012-04-15T10:00"))),
            None
        );
    }

    #[test]
    fn test_equivalence() {
        assert!(equivalent(&Collection::empty(), &Collection::empty()));
        assert!(!equivalent(&one(FhirPathValue::integer(1)), &Collection::empty()));
        assert!(equivalent(
            &one(FhirPathValue::string("Hello  World")),
            &one(FhirPathValue::string("hello world"))
        ));
        assert!(equivalent(&one(dec("1.2")), &one(dec("1.24"))));
        assert!(!equivalent(&one(dec("1.2")), &one(dec("1.26"))));
        assert!(equivalent(&one(date("2012-04")), &one(date("2012-04-15"))));

        let left = Collection::from_vec(vec![FhirPathValue::integer(1), FhirPathValue::integer(2)]);
        let right = Collection::from_vec(vec![FhirPathValue::integer(2), FhirPathValue::integer(1)]);
        assert!(equivalent(&left, &right));
    }

    #[test]
    fn test_complex_equality_is_deep() {
        let name = |family: &str| ElementNode::new("HumanName").with_string("family", family).into_value();
        assert_eq!(value_equals(&name("Smith"), &name("Smith")), Some(true));
        assert_eq!(value_equals(&name("Smith"), &name("Jones")), Some(false));
        assert!(value_equivalent(&name("Smith"), &name("SMITH")));
    }

    #[test]
    fn test_fhir_primitive_compares_with_system_value() {
        let code = FhirPathValue::from(PrimitiveNode::fhir(
            "code",
            PrimitiveValue::String("final".to_string()),
        ));
        assert_eq!(value_equals(&code, &FhirPathValue::string("final")), Some(true));
    }

    #[test]
    fn test_comparison() {
        let result = compare(
            BinaryOperator::LessThan,
            &one(FhirPathValue::integer(1)),
            &one(dec("1.5")),
        )
        .unwrap();
        assert_eq!(result.first().and_then(FhirPathValue::as_boolean), Some(true));

        let result = compare(
            BinaryOperator::GreaterThan,
            &one(FhirPathValue::integer(1)),
            &one(FhirPathValue::string("a")),
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_arithmetic_edges() {
        let result = arithmetic(
            BinaryOperator::Divide,
            &one(FhirPathValue::integer(1)),
            &one(FhirPathValue::integer(0)),
        )
        .unwrap();
        assert!(result.is_empty());

        let result = arithmetic(
            BinaryOperator::Add,
            &one(FhirPathValue::integer(i64::MAX)),
            &one(FhirPathValue::integer(1)),
        )
        .unwrap();
        assert!(result.is_empty());

        let result = arithmetic(
            BinaryOperator::IntegerDivide,
            &one(FhirPathValue::integer(7)),
            &one(FhirPathValue::integer(2)),
        )
        .unwrap();
        assert_eq!(result.first().and_then(FhirPathValue::as_integer), Some(3));

        let err = arithmetic(
            BinaryOperator::Subtract,
            &one(FhirPathValue::string("a")),
            &one(FhirPathValue::integer(2)),
        )
        .unwrap_err();
        assert!(matches!(err, FhirPathError::InvalidOperandTypes { .. }));
    }

    #[test]
    fn test_concatenate_treats_empty_as_blank() {
        let result = concatenate(&one(FhirPathValue::string("TEST")), &one(FhirPathValue::string("."))).unwrap();
        assert_eq!(result.to_strings(), vec!["TEST."]);
        let result = concatenate(&Collection::empty(), &one(FhirPathValue::string("."))).unwrap();
        assert_eq!(result.to_strings(), vec!["."]);

        let patient = one(ElementNode::new("Patient").into_value());
        assert!(concatenate(&patient, &Collection::empty()).is_err());
    }

    #[test]
    fn test_membership_and_union() {
        let list = Collection::from_vec(vec![FhirPathValue::integer(1), FhirPathValue::integer(2)]);
        let result = membership(&one(FhirPathValue::integer(2)), &list, "in").unwrap();
        assert_eq!(result.first().and_then(FhirPathValue::as_boolean), Some(true));
        assert!(membership(&Collection::empty(), &list, "in").unwrap().is_empty());

        let merged = union(&list, &one(FhirPathValue::integer(2)));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_unary_minus() {
        let result = unary(UnaryOperator::Negate, &one(FhirPathValue::integer(5))).unwrap();
        assert_eq!(result.first().and_then(FhirPathValue::as_integer), Some(-5));
        assert!(unary(UnaryOperator::Negate, &one(FhirPathValue::string("x"))).is_err());
    }
}
