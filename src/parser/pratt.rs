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

//! Pratt parser for FHIRPath expressions
//!
//! Precedence, tightest first: invocation (`.`, `[]`), unary `+`/`-`,
//! multiplicative, additive (`+ - &`), type (`is`, `as`), union `|`,
//! inequality, equality/equivalence, membership (`in`, `contains`), `and`,
//! `or`/`xor`, `implies`. Everything is left-associative except `implies`.

use rust_decimal::Decimal;

use super::tokenizer::{Spanned, Token, TokenBuffer, Tokenizer};
use crate::ast::{
    BinaryOperator, ExpressionNode, LiteralValue, TypeSpecifier, UnaryOperator, VariableKind,
};
use crate::core::stack::ensure_sufficient_stack;
use crate::core::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use crate::core::{FhirPathError, Result, SourceLocation};
use crate::model::quantity::is_calendar_unit;

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Lowest precedence - implies (right associative)
    Implies = 1,
    /// Logical OR and XOR
    Or = 2,
    /// Logical AND
    And = 3,
    /// Membership operators (in, contains)
    Membership = 4,
    /// Equality operators (=, !=, ~, !~)
    Equality = 5,
    /// Inequality operators (<, >, <=, >=)
    Inequality = 6,
    /// Union operator (|)
    Union = 7,
    /// Type operators (is, as)
    Type = 8,
    /// Additive operators (+, -, &)
    Additive = 9,
    /// Multiplicative operators (*, /, div, mod)
    Multiplicative = 10,
    /// Unary operators (+, -)
    Unary = 11,
    /// Invocation/Indexing (., [])
    Invocation = 12,
}

impl Precedence {
    /// Get the next higher precedence level for left-associative operators
    pub const fn next_level(self) -> Self {
        match self {
            Precedence::Implies => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Membership,
            Precedence::Membership => Precedence::Equality,
            Precedence::Equality => Precedence::Inequality,
            Precedence::Inequality => Precedence::Union,
            Precedence::Union => Precedence::Type,
            Precedence::Type => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            Precedence::Unary => Precedence::Invocation,
            Precedence::Invocation => Precedence::Invocation,
        }
    }

    /// Check if this precedence is right associative
    pub const fn is_right_associative(self) -> bool {
        matches!(self, Precedence::Implies)
    }

    fn of_operator(op: BinaryOperator) -> Self {
        match op.precedence() {
            10 => Precedence::Multiplicative,
            9 => Precedence::Additive,
            7 => Precedence::Union,
            6 => Precedence::Inequality,
            5 => Precedence::Equality,
            4 => Precedence::Membership,
            3 => Precedence::And,
            2 => Precedence::Or,
            _ => Precedence::Implies,
        }
    }
}

fn token_to_binary_op(token: &Token<'_>) -> Option<BinaryOperator> {
    let op = match token {
        Token::Plus => BinaryOperator::Add,
        Token::Minus => BinaryOperator::Subtract,
        Token::Multiply => BinaryOperator::Multiply,
        Token::Divide => BinaryOperator::Divide,
        Token::Div => BinaryOperator::IntegerDivide,
        Token::Mod => BinaryOperator::Modulo,
        Token::Ampersand => BinaryOperator::Concatenate,
        Token::Union => BinaryOperator::Union,
        Token::LessThan => BinaryOperator::LessThan,
        Token::LessThanOrEqual => BinaryOperator::LessThanOrEqual,
        Token::GreaterThan => BinaryOperator::GreaterThan,
        Token::GreaterThanOrEqual => BinaryOperator::GreaterThanOrEqual,
        Token::Equal => BinaryOperator::Equal,
        Token::NotEqual => BinaryOperator::NotEqual,
        Token::Equivalent => BinaryOperator::Equivalent,
        Token::NotEquivalent => BinaryOperator::NotEquivalent,
        Token::In => BinaryOperator::In,
        Token::Contains => BinaryOperator::Contains,
        Token::And => BinaryOperator::And,
        Token::Or => BinaryOperator::Or,
        Token::Xor => BinaryOperator::Xor,
        Token::Implies => BinaryOperator::Implies,
        _ => return None,
    };
    Some(op)
}

/// Deepest nesting accepted when no limit is configured
pub const DEFAULT_MAX_PARSE_DEPTH: usize = 1024;

/// Pratt parser over a pre-tokenized expression
pub struct PrattParser<'input> {
    input: &'input str,
    tokens: TokenBuffer<'input>,
    index: usize,
    depth: usize,
    max_depth: usize,
}

impl<'input> PrattParser<'input> {
    /// Tokenize `input` and prepare a parser over it
    pub fn new(input: &'input str) -> Result<Self> {
        let tokens = Tokenizer::new(input).tokenize_all()?;
        Ok(Self {
            input,
            tokens,
            index: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_PARSE_DEPTH,
        })
    }

    /// Limit how deeply subexpressions, operator chains and invocation
    /// chains may nest
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Fail once `extra` more levels below the current one would pass the limit
    fn check_depth(&self, extra: usize, position: usize) -> Result<()> {
        if self.depth.saturating_add(extra) > self.max_depth {
            return Err(FhirPathError::parse_error(
                position,
                format!("expression nesting too deep (limit {})", self.max_depth),
            ));
        }
        Ok(())
    }

    fn current(&self) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.index)
    }

    fn peek(&self, offset: usize) -> Option<&Token<'input>> {
        self.tokens.get(self.index + offset).map(|t| &t.value)
    }

    fn advance(&mut self) -> Option<Spanned<Token<'input>>> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn location(&self, position: usize) -> SourceLocation {
        SourceLocation::from_offset(self.input, position)
    }

    /// Error pointing at the current token, or at end of input
    fn error_here(&self, expected: &str) -> FhirPathError {
        match self.current() {
            Some(token) => FhirPathError::parse_error(
                token.start,
                format!("expected {expected}, found '{}'", token.value.describe()),
            ),
            None => FhirPathError::parse_error(
                self.input.len(),
                format!("expected {expected}, found end of expression"),
            ),
        }
    }

    fn expect(&mut self, expected: Token<'input>, what: &str) -> Result<Spanned<Token<'input>>> {
        match self.current() {
            Some(token) if token.value == expected => {
                let token = token.clone();
                self.index += 1;
                Ok(token)
            }
            _ => Err(self.error_here(what)),
        }
    }

    /// Parse a complete expression, rejecting trailing tokens
    pub fn parse(&mut self) -> Result<ExpressionNode> {
        let expression = self.parse_expression(Precedence::Implies)?;
        if self.current().is_some() {
            return Err(self.error_here("operator or end of expression"));
        }
        Ok(expression)
    }

    fn parse_expression(&mut self, min_precedence: Precedence) -> Result<ExpressionNode> {
        let position = self.current().map_or(self.input.len(), |t| t.start);
        self.check_depth(1, position)?;
        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.parse_binary(min_precedence));
        self.depth -= 1;
        result
    }

    fn parse_binary(&mut self, min_precedence: Precedence) -> Result<ExpressionNode> {
        let mut left = self.parse_unary()?;
        let mut chained = 0;

        while let Some(current) = self.current() {
            let start = current.start;
            let type_operator = match current.value {
                Token::Is => Some(true),
                Token::As => Some(false),
                _ => None,
            };

            if let Some(is_check) = type_operator {
                if Precedence::Type < min_precedence {
                    break;
                }
                chained += 1;
                self.check_depth(chained, start)?;
                self.advance();
                let target_type = self.parse_type_specifier()?;
                left = if is_check {
                    ExpressionNode::type_check(left, target_type)
                } else {
                    ExpressionNode::type_cast(left, target_type)
                }
                .with_location(self.location(start));
                continue;
            }

            let Some(op) = token_to_binary_op(&current.value) else {
                break;
            };
            let precedence = Precedence::of_operator(op);
            if precedence < min_precedence {
                break;
            }
            chained += 1;
            self.check_depth(chained, start)?;
            self.advance();
            let next_min = if precedence.is_right_associative() {
                precedence
            } else {
                precedence.next_level()
            };
            let right = self.parse_expression(next_min)?;
            left = ExpressionNode::binary_op(left, op, right).with_location(self.location(start));
        }

        Ok(left)
    }

    /// Prefix `+`/`-` runs are collected in a loop and applied innermost first
    fn parse_unary(&mut self) -> Result<ExpressionNode> {
        let mut prefixes = Vec::new();
        while let Some(current) = self.current() {
            let start = current.start;
            let operator = match current.value {
                Token::Minus => UnaryOperator::Negate,
                Token::Plus => UnaryOperator::Positive,
                _ => break,
            };
            prefixes.push((operator, start));
            self.check_depth(prefixes.len(), start)?;
            self.advance();
        }

        let primary = self.parse_primary()?;
        let mut operand = self.parse_postfix(primary)?;
        for (operator, start) in prefixes.into_iter().rev() {
            operand = ExpressionNode::unary_op(operator, operand).with_location(self.location(start));
        }
        Ok(operand)
    }

    /// `Name` or `System.Name` / `FHIR.Name`
    fn parse_type_specifier(&mut self) -> Result<TypeSpecifier> {
        let first = match self.current().and_then(|t| t.value.as_member_name()) {
            Some(name) => name,
            None => return Err(self.error_here("type name")),
        };
        self.advance();

        let qualified = matches!(first, "System" | "FHIR") && self.peek(0) == Some(&Token::Dot);
        if qualified {
            self.advance();
            let name = match self.current().and_then(|t| t.value.as_member_name()) {
                Some(name) => name,
                None => return Err(self.error_here("type name after namespace")),
            };
            self.advance();
            return Ok(TypeSpecifier::qualified(first, name));
        }
        Ok(TypeSpecifier::new(first))
    }

    fn parse_arguments(&mut self) -> Result<Vec<ExpressionNode>> {
        self.expect(Token::LeftParen, "'('")?;
        let mut arguments = Vec::new();
        if self.peek(0) == Some(&Token::RightParen) {
            self.advance();
            return Ok(arguments);
        }
        loop {
            arguments.push(self.parse_expression(Precedence::Implies)?);
            match self.peek(0) {
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::RightParen) => {
                    self.advance();
                    return Ok(arguments);
                }
                _ => return Err(self.error_here("',' or ')'")),
            }
        }
    }

    fn parse_postfix(&mut self, mut left: ExpressionNode) -> Result<ExpressionNode> {
        let mut chained = 0;
        while let Some(current) = self.current() {
            let start = current.start;
            if matches!(current.value, Token::Dot | Token::LeftBracket) {
                chained += 1;
                self.check_depth(chained, start)?;
            }
            match current.value {
                Token::Dot => {
                    self.advance();
                    let name = match self.current().and_then(|t| t.value.as_member_name()) {
                        Some(name) => name,
                        None => return Err(self.error_here("member name after '.'")),
                    };
                    let name_start = self.current().map_or(start, |t| t.start);
                    self.advance();
                    left = if self.peek(0) == Some(&Token::LeftParen) {
                        let arguments = self.parse_arguments()?;
                        ExpressionNode::method_call(left, name, arguments)
                    } else {
                        ExpressionNode::property_access(left, name)
                    }
                    .with_location(self.location(name_start));
                }
                Token::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression(Precedence::Implies)?;
                    self.expect(Token::RightBracket, "']'")?;
                    left = ExpressionNode::index_access(left, index)
                        .with_location(self.location(start));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    /// A number optionally followed by a unit makes a quantity
    fn parse_number_literal(&mut self, value: Decimal, integer: Option<i64>) -> Result<LiteralValue> {
        let unit = match self.peek(0) {
            Some(Token::String(unit)) => Some(unescape_string(unit, self.tokens[self.index].start)?),
            Some(Token::Identifier(word)) if is_calendar_unit(word) => Some(word.to_string()),
            _ => None,
        };
        if let Some(unit) = unit {
            self.advance();
            return Ok(LiteralValue::Quantity { value, unit });
        }
        Ok(match integer {
            Some(i) => LiteralValue::Integer(i),
            None => LiteralValue::Decimal(value),
        })
    }

    fn parse_primary(&mut self) -> Result<ExpressionNode> {
        let Some(token) = self.advance() else {
            return Err(self.error_here("expression"));
        };
        let start = token.start;
        let location = self.location(start);

        let node = match token.value {
            Token::Integer(i) => {
                let literal = self.parse_number_literal(Decimal::from(i), Some(i))?;
                ExpressionNode::literal(literal)
            }
            Token::Decimal(text) => {
                let value = text.parse::<Decimal>().map_err(|_| {
                    FhirPathError::parse_error(start, format!("invalid decimal literal '{text}'"))
                })?;
                let literal = self.parse_number_literal(value, None)?;
                ExpressionNode::literal(literal)
            }
            Token::String(body) => {
                ExpressionNode::literal(LiteralValue::String(unescape_string(body, start)?))
            }
            Token::True => ExpressionNode::literal(LiteralValue::Boolean(true)),
            Token::False => ExpressionNode::literal(LiteralValue::Boolean(false)),
            Token::Date(text) => {
                let date = PrecisionDate::parse(text).ok_or_else(|| {
                    FhirPathError::parse_error(start, format!("invalid date literal '@{text}'"))
                })?;
                ExpressionNode::literal(LiteralValue::Date(date))
            }
            Token::DateTime(text) => {
                let datetime = PrecisionDateTime::parse(text).ok_or_else(|| {
                    FhirPathError::parse_error(
                        start,
                        format!("invalid datetime literal '@{text}'"),
                    )
                })?;
                ExpressionNode::literal(LiteralValue::DateTime(datetime))
            }
            Token::Time(text) => {
                let time = PrecisionTime::parse(text).ok_or_else(|| {
                    FhirPathError::parse_error(start, format!("invalid time literal '@T{text}'"))
                })?;
                ExpressionNode::literal(LiteralValue::Time(time))
            }
            Token::Dollar(name) => {
                if !matches!(name, "this" | "index" | "total") {
                    return Err(FhirPathError::parse_error(
                        start,
                        format!("unknown special variable '${name}'"),
                    ));
                }
                ExpressionNode::variable(name, VariableKind::Special)
            }
            Token::Percent => {
                let name = match self.advance() {
                    Some(Spanned {
                        value: Token::String(body),
                        start,
                        ..
                    }) => unescape_string(body, start)?,
                    Some(next) => match next.value.as_member_name() {
                        Some(name) => name.to_string(),
                        None => {
                            return Err(FhirPathError::parse_error(
                                next.start,
                                format!(
                                    "expected variable name after '%', found '{}'",
                                    next.value.describe()
                                ),
                            ));
                        }
                    },
                    None => return Err(self.error_here("variable name after '%'")),
                };
                ExpressionNode::variable(name, VariableKind::Environment)
            }
            Token::LeftParen => {
                let inner = self.parse_expression(Precedence::Implies)?;
                self.expect(Token::RightParen, "')'")?;
                return Ok(inner);
            }
            Token::LeftBrace => {
                self.expect(Token::RightBrace, "'}'")?;
                ExpressionNode::literal(LiteralValue::Empty)
            }
            Token::DelimitedIdentifier(name) => ExpressionNode::identifier(name),
            other => match other.as_member_name() {
                Some(name) if self.peek(0) == Some(&Token::LeftParen) => {
                    let arguments = self.parse_arguments()?;
                    ExpressionNode::function_call(name, arguments)
                }
                Some(name) if matches!(other, Token::Identifier(_)) => {
                    ExpressionNode::identifier(name)
                }
                _ => {
                    return Err(FhirPathError::parse_error(
                        start,
                        format!("unexpected token '{}'", other.describe()),
                    ));
                }
            },
        };

        Ok(node.with_location(location))
    }
}

/// Resolve escape sequences in a string literal body starting at byte `position`
pub(crate) fn unescape_string(body: &str, position: usize) -> Result<String> {
    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('f') => result.push('\u{000C}'),
            Some('\\') => result.push('\\'),
            Some('\'') => result.push('\''),
            Some('"') => result.push('"'),
            Some('`') => result.push('`'),
            Some('/') => result.push('/'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => result.push(c),
                    None => {
                        return Err(FhirPathError::parse_error(
                            position,
                            format!("invalid unicode escape '\\u{hex}'"),
                        ));
                    }
                }
            }
            Some(other) => {
                return Err(FhirPathError::parse_error(
                    position,
                    format!("invalid escape sequence '\\{other}'"),
                ));
            }
            None => {
                return Err(FhirPathError::parse_error(
                    position,
                    "dangling '\\' at end of string literal",
                ));
            }
        }
    }

    Ok(result)
}

/// Parse FHIRPath expression text into an AST
pub fn parse_expression(input: &str) -> Result<ExpressionNode> {
    PrattParser::new(input)?.parse()
}

/// Parse with an explicit nesting limit
pub fn parse_expression_with_depth(input: &str, max_depth: usize) -> Result<ExpressionNode> {
    PrattParser::new(input)?.with_max_depth(max_depth).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parsed(input: &str) -> String {
        parse_expression(input).unwrap().to_string()
    }

    #[rstest]
    #[case("1 + 2 * 3", "(1 + (2 * 3))")]
    #[case("a and b or c", "((a and b) or c)")]
    #[case("a or b and c", "(a or (b and c))")]
    #[case("a implies b implies c", "(a implies (b implies c))")]
    #[case("a = b and c ~ d", "((a = b) and (c ~ d))")]
    #[case("a < b = c > d", "((a < b) = (c > d))")]
    #[case("name.family & '.'", "(name.family & '.')")]
    #[case("a | b = c", "((a | b) = c)")]
    #[case("x is Quantity | y", "((x is Quantity) | y)")]
    #[case("a in b and c contains d", "((a in b) and (c contains d))")]
    #[case("-a.b", "-a.b")]
    #[case("1 - 2 - 3", "((1 - 2) - 3)")]
    fn test_precedence_and_associativity(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parsed(input), expected);
    }

    #[test]
    fn test_invocation_chain() {
        let expr = parse_expression("Observation.specimen.resolve().receivedTime").unwrap();
        match &expr {
            ExpressionNode::PropertyAccess(node) => {
                assert_eq!(node.property, "receivedTime");
                assert!(matches!(node.object.as_ref(), ExpressionNode::MethodCall(m) if m.method == "resolve"));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_keywords_as_member_names() {
        assert_eq!(parsed("name.given.contains('x')"), "name.given.contains('x')");
        assert_eq!(parsed("value.as(String)"), "value.as(String)");
        assert_eq!(parsed("value.is(FHIR.string)"), "value.is(FHIR.string)");
    }

    #[test]
    fn test_literals() {
        assert_eq!(parsed("@2012-04-15"), "@2012-04-15");
        assert_eq!(parsed("@2012-04-15T"), "@2012-04-15T");
        assert_eq!(parsed("@T10:30"), "@T10:30");
        assert_eq!(parsed("5 'mg'"), "5 'mg'");
        assert_eq!(parsed("4 days"), "4 days");
        assert_eq!(parsed("{}"), "{}");
        assert_eq!(parsed("'a\\u0042c'"), "'aBc'");
        assert_eq!(parsed("%`vs-name` | %'other'"), "(%`vs-name` | %other)");
    }

    #[test]
    fn test_type_operators() {
        let expr = parse_expression("value as System.String").unwrap();
        match expr {
            ExpressionNode::TypeCast(node) => {
                assert_eq!(node.target_type, TypeSpecifier::qualified("System", "String"));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_whitespace_and_comments_do_not_change_ast() {
        let compact = parse_expression("Patient.name.where(use='official').given[0]").unwrap();
        let spaced = parse_expression(
            "Patient . name\n  .where( use = 'official' ) // pick official\n  .given [ 0 ]",
        )
        .unwrap();
        assert_eq!(compact.to_string(), spaced.to_string());
    }

    #[test]
    fn test_locations_are_recorded() {
        let expr = parse_expression("name.\n  first()").unwrap();
        let location = expr.location().unwrap();
        assert_eq!(location.line, 2);
        assert_eq!(location.column, 3);
    }

    fn assert_too_deep(result: Result<ExpressionNode>) {
        match result {
            Err(FhirPathError::ParseError { message, .. }) => {
                assert!(message.contains("nesting too deep"), "{message}")
            }
            other => panic!("expected nesting error, got {other:?}"),
        }
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let depth = 10_000;
        let nested = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_too_deep(parse_expression(&nested));

        let negations = format!("{}1", "-".repeat(100_000));
        assert_too_deep(parse_expression(&negations));

        let sum = format!("1{}", " + 1".repeat(depth));
        assert_too_deep(parse_expression(&sum));

        let chain = format!("a{}", ".b".repeat(depth));
        assert_too_deep(parse_expression(&chain));

        let calls = format!("{}a{}", "where(".repeat(depth), ")".repeat(depth));
        assert_too_deep(parse_expression(&calls));
    }

    #[test]
    fn test_nesting_within_limit_parses() {
        let nested = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(parsed(&nested), "1");
        assert_eq!(parsed("--1"), "--1");

        assert!(parse_expression_with_depth("((1))", 3).is_ok());
        assert_too_deep(parse_expression_with_depth("(((1)))", 3));
        assert_too_deep(parse_expression_with_depth("1 + 2 + 3 + 4", 3));
    }

    #[rstest]
    #[case("Patient.name.", 13)]
    #[case("(1 + 2", 6)]
    #[case("a b", 2)]
    #[case("where(", 6)]
    #[case("$foo", 0)]
    #[case("'bad \\q'", 0)]
    #[case("@2012-13-01", 0)]
    fn test_syntax_errors_report_position(#[case] input: &str, #[case] position: usize) {
        match parse_expression(input) {
            Err(FhirPathError::ParseError { position: actual, .. }) => {
                assert_eq!(actual, position)
            }
            other => panic!("expected parse error for {input:?}, got {other:?}"),
        }
    }
}
