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

//! Byte-level tokenizer for FHIRPath expressions
//!
//! Tokens borrow from the input text. String bodies keep their escape sequences;
//! the parser resolves them so that escape errors can point at the literal.

use smallvec::SmallVec;

use crate::core::{FhirPathError, Result};

/// A token produced by the tokenizer
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'input> {
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Decimal literal as string slice, parsed on demand (e.g., 3.14)
    Decimal(&'input str),
    /// String literal body between single quotes, escapes unresolved
    String(&'input str),
    /// Date literal without the `@` (e.g., 2023-01-01)
    Date(&'input str),
    /// DateTime literal without the `@` (e.g., 2023-01-01T12:00:00Z, 2023-01-01T)
    DateTime(&'input str),
    /// Time literal without the `@T` (e.g., 12:00:00)
    Time(&'input str),

    /// Plain identifier (e.g., name)
    Identifier(&'input str),
    /// Backtick-delimited identifier body (e.g., `given name`)
    DelimitedIdentifier(&'input str),
    /// Special variable without the `$` (this, index, total)
    Dollar(&'input str),

    /// Addition operator (+)
    Plus,
    /// Subtraction operator (-)
    Minus,
    /// Multiplication operator (*)
    Multiply,
    /// Division operator (/)
    Divide,
    /// Modulo operator (mod keyword)
    Mod,
    /// Integer division operator (div keyword)
    Div,
    /// Equality operator (=)
    Equal,
    /// Inequality operator (!=)
    NotEqual,
    /// Less than operator (<)
    LessThan,
    /// Less than or equal operator (<=)
    LessThanOrEqual,
    /// Greater than operator (>)
    GreaterThan,
    /// Greater than or equal operator (>=)
    GreaterThanOrEqual,
    /// Equivalence operator (~)
    Equivalent,
    /// Non-equivalence operator (!~)
    NotEquivalent,
    /// Logical AND operator (and keyword)
    And,
    /// Logical OR operator (or keyword)
    Or,
    /// Logical XOR operator (xor keyword)
    Xor,
    /// Logical implication operator (implies keyword)
    Implies,
    /// Union operator (|)
    Union,
    /// Membership operator (in keyword)
    In,
    /// Contains operator (contains keyword)
    Contains,
    /// Ampersand operator (&) for string concatenation
    Ampersand,
    /// Type checking operator (is keyword)
    Is,
    /// Type casting operator (as keyword)
    As,
    /// Boolean literal true
    True,
    /// Boolean literal false
    False,

    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left square bracket [
    LeftBracket,
    /// Right square bracket ]
    RightBracket,
    /// Left curly brace {
    LeftBrace,
    /// Right curly brace }
    RightBrace,
    /// Dot operator (.)
    Dot,
    /// Comma separator (,)
    Comma,
    /// Percent sign (%) introducing an environment variable
    Percent,
}

impl<'input> Token<'input> {
    /// Get keyword from string
    #[inline]
    pub fn from_keyword(s: &str) -> Option<Token<'input>> {
        match s {
            "true" => Some(Token::True),
            "false" => Some(Token::False),
            "and" => Some(Token::And),
            "or" => Some(Token::Or),
            "xor" => Some(Token::Xor),
            "implies" => Some(Token::Implies),
            "is" => Some(Token::Is),
            "as" => Some(Token::As),
            "in" => Some(Token::In),
            "contains" => Some(Token::Contains),
            "div" => Some(Token::Div),
            "mod" => Some(Token::Mod),
            _ => None,
        }
    }

    /// The name a keyword or identifier token carries when it is used as a member
    /// or function name after a dot (e.g., `.contains('x')`, `.as(String)`)
    pub fn as_member_name(&self) -> Option<&'input str> {
        match self {
            Token::Identifier(name) | Token::DelimitedIdentifier(name) => Some(name),
            Token::True => Some("true"),
            Token::False => Some("false"),
            Token::And => Some("and"),
            Token::Or => Some("or"),
            Token::Xor => Some("xor"),
            Token::Implies => Some("implies"),
            Token::Is => Some("is"),
            Token::As => Some("as"),
            Token::In => Some("in"),
            Token::Contains => Some("contains"),
            Token::Div => Some("div"),
            Token::Mod => Some("mod"),
            _ => None,
        }
    }

    /// Short description used in parse error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Integer(i) => i.to_string(),
            Token::Decimal(d) => d.to_string(),
            Token::String(s) => format!("'{s}'"),
            Token::Date(d) | Token::DateTime(d) => format!("@{d}"),
            Token::Time(t) => format!("@T{t}"),
            Token::Identifier(name) => name.to_string(),
            Token::DelimitedIdentifier(name) => format!("`{name}`"),
            Token::Dollar(name) => format!("${name}"),
            other => format!("{other:?}"),
        }
    }
}

/// A token with its byte span in the input
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    /// The value
    pub value: T,
    /// Start position in the input
    pub start: usize,
    /// End position in the input
    pub end: usize,
}

impl<T> Spanned<T> {
    /// Create a new spanned value
    pub fn new(value: T, start: usize, end: usize) -> Self {
        Self { value, start, end }
    }
}

/// Token buffer; most expressions fit on the stack
pub type TokenBuffer<'input> = SmallVec<[Spanned<Token<'input>>; 32]>;

/// Tokenizer for FHIRPath expressions
#[derive(Clone)]
pub struct Tokenizer<'input> {
    input: &'input str,
    bytes: &'input [u8],
    pos: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a new tokenizer
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    #[inline]
    fn slice(&self, start: usize, end: usize) -> &'input str {
        self.input.get(start..end).unwrap_or("")
    }

    #[inline]
    fn is_id_start(ch: u8) -> bool {
        ch.is_ascii_alphabetic() || ch == b'_'
    }

    #[inline]
    fn is_id_continue(ch: u8) -> bool {
        ch.is_ascii_alphanumeric() || ch == b'_'
    }

    fn consume_while(&mut self, predicate: impl Fn(u8) -> bool) {
        while self.pos < self.bytes.len() && predicate(self.bytes[self.pos]) {
            self.pos += 1;
        }
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            self.consume_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'));
            match (self.peek_byte(0), self.peek_byte(1)) {
                (Some(b'/'), Some(b'/')) => {
                    self.consume_while(|b| b != b'\n');
                }
                (Some(b'/'), Some(b'*')) => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match (self.peek_byte(0), self.peek_byte(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => {
                                return Err(FhirPathError::parse_error(
                                    start,
                                    "unterminated block comment",
                                ));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Token<'input>> {
        let start = self.pos;
        self.consume_while(|b| b.is_ascii_digit());

        let is_decimal = self.peek_byte(0) == Some(b'.')
            && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit());
        if is_decimal {
            self.pos += 1;
            self.consume_while(|b| b.is_ascii_digit());
            return Ok(Token::Decimal(self.slice(start, self.pos)));
        }

        let text = self.slice(start, self.pos);
        text.parse::<i64>().map(Token::Integer).map_err(|_| {
            FhirPathError::parse_error(start, format!("integer literal '{text}' out of range"))
        })
    }

    /// Scan a quoted body, returning the slice between the delimiters
    fn parse_quoted(&mut self, quote: u8, what: &str) -> Result<&'input str> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;
        while let Some(byte) = self.peek_byte(0) {
            if byte == quote {
                let body = self.slice(start, self.pos);
                self.pos += 1;
                return Ok(body);
            }
            self.pos += if byte == b'\\' { 2 } else { 1 };
        }
        Err(FhirPathError::parse_error(open, format!("unterminated {what}")))
    }

    fn scan_time_body(&mut self) {
        self.consume_while(|b| b.is_ascii_digit() || b == b':' || b == b'.');
    }

    /// Scan an optional `Z` or `±HH:MM` suffix
    fn scan_timezone(&mut self) {
        match self.peek_byte(0) {
            Some(b'Z') => self.pos += 1,
            Some(b'+') | Some(b'-') => {
                let offset = &self.bytes[self.pos + 1..];
                let is_offset = offset.len() >= 5
                    && offset[0].is_ascii_digit()
                    && offset[1].is_ascii_digit()
                    && offset[2] == b':'
                    && offset[3].is_ascii_digit()
                    && offset[4].is_ascii_digit();
                if is_offset {
                    self.pos += 6;
                }
            }
            _ => {}
        }
    }

    /// Scan `@date`, `@dateTime` or `@Ttime`
    fn parse_temporal_literal(&mut self) -> Result<Token<'input>> {
        let at = self.pos;
        self.pos += 1;

        if self.peek_byte(0) == Some(b'T') {
            self.pos += 1;
            let start = self.pos;
            self.scan_time_body();
            if start == self.pos {
                return Err(FhirPathError::parse_error(at, "empty time literal"));
            }
            return Ok(Token::Time(self.slice(start, self.pos)));
        }

        let start = self.pos;
        self.consume_while(|b| b.is_ascii_digit() || b == b'-');
        if start == self.pos {
            return Err(FhirPathError::parse_error(at, "empty date literal"));
        }
        if self.peek_byte(0) != Some(b'T') {
            return Ok(Token::Date(self.slice(start, self.pos)));
        }

        self.pos += 1;
        self.scan_time_body();
        self.scan_timezone();
        Ok(Token::DateTime(self.slice(start, self.pos)))
    }

    /// Produce the next token, or `None` at end of input
    pub fn next_token(&mut self) -> Result<Option<Spanned<Token<'input>>>> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(byte) = self.peek_byte(0) else {
            return Ok(None);
        };

        let second = self.peek_byte(1);
        let (token, width) = match (byte, second) {
            (b'.', _) => (Token::Dot, 1),
            (b',', _) => (Token::Comma, 1),
            (b'(', _) => (Token::LeftParen, 1),
            (b')', _) => (Token::RightParen, 1),
            (b'[', _) => (Token::LeftBracket, 1),
            (b']', _) => (Token::RightBracket, 1),
            (b'{', _) => (Token::LeftBrace, 1),
            (b'}', _) => (Token::RightBrace, 1),
            (b'+', _) => (Token::Plus, 1),
            (b'-', _) => (Token::Minus, 1),
            (b'*', _) => (Token::Multiply, 1),
            (b'/', _) => (Token::Divide, 1),
            (b'&', _) => (Token::Ampersand, 1),
            (b'|', _) => (Token::Union, 1),
            (b'%', _) => (Token::Percent, 1),
            (b'=', _) => (Token::Equal, 1),
            (b'~', _) => (Token::Equivalent, 1),
            (b'!', Some(b'=')) => (Token::NotEqual, 2),
            (b'!', Some(b'~')) => (Token::NotEquivalent, 2),
            (b'<', Some(b'=')) => (Token::LessThanOrEqual, 2),
            (b'<', _) => (Token::LessThan, 1),
            (b'>', Some(b'=')) => (Token::GreaterThanOrEqual, 2),
            (b'>', _) => (Token::GreaterThan, 1),
            _ => {
                let token = match byte {
                    b'0'..=b'9' => self.parse_number()?,
                    b'\'' => Token::String(self.parse_quoted(b'\'', "string literal")?),
                    b'`' => Token::DelimitedIdentifier(
                        self.parse_quoted(b'`', "delimited identifier")?,
                    ),
                    b'@' => self.parse_temporal_literal()?,
                    b'$' => {
                        self.pos += 1;
                        let name_start = self.pos;
                        self.consume_while(Self::is_id_continue);
                        if name_start == self.pos {
                            return Err(FhirPathError::parse_error(
                                start,
                                "expected variable name after '$'",
                            ));
                        }
                        Token::Dollar(self.slice(name_start, self.pos))
                    }
                    ch if Self::is_id_start(ch) => {
                        self.consume_while(Self::is_id_continue);
                        let word = self.slice(start, self.pos);
                        Token::from_keyword(word).unwrap_or(Token::Identifier(word))
                    }
                    _ => {
                        let ch = self
                            .input
                            .get(start..)
                            .and_then(|rest| rest.chars().next())
                            .unwrap_or('?');
                        return Err(FhirPathError::parse_error(
                            start,
                            format!("unexpected character '{ch}'"),
                        ));
                    }
                };
                return Ok(Some(Spanned::new(token, start, self.pos)));
            }
        };

        self.pos += width;
        Ok(Some(Spanned::new(token, start, self.pos)))
    }

    /// Tokenize the whole input
    pub fn tokenize_all(&mut self) -> Result<TokenBuffer<'input>> {
        let mut tokens = TokenBuffer::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

/// Convenience function to tokenize a string
pub fn tokenize(input: &str) -> Result<TokenBuffer<'_>> {
    Tokenizer::new(input).tokenize_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(input: &str) -> Vec<Token<'_>> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.value)
            .collect()
    }

    #[test]
    fn test_tokenizer_basic() {
        assert_eq!(
            values("Patient.name.family & '.'"),
            vec![
                Token::Identifier("Patient"),
                Token::Dot,
                Token::Identifier("name"),
                Token::Dot,
                Token::Identifier("family"),
                Token::Ampersand,
                Token::String("."),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            values("= != ~ !~ < <= > >= | & + - * /"),
            vec![
                Token::Equal,
                Token::NotEqual,
                Token::Equivalent,
                Token::NotEquivalent,
                Token::LessThan,
                Token::LessThanOrEqual,
                Token::GreaterThan,
                Token::GreaterThanOrEqual,
                Token::Union,
                Token::Ampersand,
                Token::Plus,
                Token::Minus,
                Token::Multiply,
                Token::Divide,
            ]
        );
        assert_eq!(
            values("a and b or c xor d implies e div 2 mod 3"),
            vec![
                Token::Identifier("a"),
                Token::And,
                Token::Identifier("b"),
                Token::Or,
                Token::Identifier("c"),
                Token::Xor,
                Token::Identifier("d"),
                Token::Implies,
                Token::Identifier("e"),
                Token::Div,
                Token::Integer(2),
                Token::Mod,
                Token::Integer(3),
            ]
        );
    }

    #[test]
    fn test_temporal_literals() {
        assert_eq!(
            values("@2012-04-15 ~ @2012-04-15T10:00:00"),
            vec![
                Token::Date("2012-04-15"),
                Token::Equivalent,
                Token::DateTime("2012-04-15T10:00:00"),
            ]
        );
        assert_eq!(
            values("@2012-04-15T10:00:00.123+02:00"),
            vec![Token::DateTime("2012-04-15T10:00:00.123+02:00")]
        );
        assert_eq!(values("@2012T"), vec![Token::DateTime("2012T")]);
        assert_eq!(values("@T14:30"), vec![Token::Time("14:30")]);
    }

    #[test]
    fn test_comments_and_spans() {
        let tokens = tokenize("name // trailing\n /* block */ .given").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].start, 0);
        assert_eq!(tokens[0].end, 4);
        assert_eq!(tokens[1].value, Token::Dot);
        assert_eq!(tokens[2].value, Token::Identifier("given"));
    }

    #[test]
    fn test_numbers_and_variables() {
        assert_eq!(
            values("3.14 42 $this %resource `given name`"),
            vec![
                Token::Decimal("3.14"),
                Token::Integer(42),
                Token::Dollar("this"),
                Token::Percent,
                Token::Identifier("resource"),
                Token::DelimitedIdentifier("given name"),
            ]
        );
        // A dot not followed by a digit stays a separate token.
        assert_eq!(
            values("1.exists()"),
            vec![
                Token::Integer(1),
                Token::Dot,
                Token::Identifier("exists"),
                Token::LeftParen,
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_lexical_errors_carry_position() {
        let err = tokenize("name = 'open").unwrap_err();
        assert_eq!(err, FhirPathError::parse_error(7, "unterminated string literal"));

        let err = tokenize("a # b").unwrap_err();
        assert!(matches!(err, FhirPathError::ParseError { position: 2, .. }));

        let err = tokenize("99999999999999999999").unwrap_err();
        assert!(err.is_parse_error());
    }
}
