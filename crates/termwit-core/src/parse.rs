//! Text syntax for polynomials and exponential closed forms.
//!
//! Grammar: sums and differences of products and quotients of powers, where a
//! power is an atom raised to a natural number or, for a positive constant
//! base, to the iteration variable `n`. Division is only allowed by constants.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use crate::errors::{ErrorInfo, TermwitError};
use crate::expr::Expr;
use crate::poly::{Poly, Rational};
use crate::symbol::{Domain, Symbol, ITER_VAR};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Rational),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn parse_error(code: &str, message: impl Into<String>, input: &str) -> TermwitError {
    TermwitError::Parse(ErrorInfo::new(code, message).with_context("input", input))
}

fn tokenize(input: &str) -> Result<Vec<Token>, TermwitError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        match ch {
            ' ' | '\t' | '\n' | '\r' => idx += 1,
            '+' => {
                tokens.push(Token::Plus);
                idx += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                idx += 1;
            }
            '*' if chars.get(idx + 1) == Some(&'*') => {
                tokens.push(Token::Caret);
                idx += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                idx += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                idx += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                idx += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                idx += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                idx += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = idx;
                while idx < chars.len() && (chars[idx].is_ascii_digit() || chars[idx] == '.') {
                    idx += 1;
                }
                let text: String = chars[start..idx].iter().collect();
                tokens.push(Token::Number(parse_number(&text, input)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = idx;
                while idx < chars.len() && (chars[idx].is_alphanumeric() || chars[idx] == '_') {
                    idx += 1;
                }
                tokens.push(Token::Ident(chars[start..idx].iter().collect()));
            }
            other => {
                return Err(parse_error(
                    "unexpected-character",
                    format!("unexpected character '{other}'"),
                    input,
                ))
            }
        }
    }
    Ok(tokens)
}

fn parse_number(text: &str, input: &str) -> Result<Rational, TermwitError> {
    let invalid = || parse_error("invalid-number", format!("invalid number '{text}'"), input);
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    if fraction.contains('.') || (whole.is_empty() && fraction.is_empty()) {
        return Err(invalid());
    }
    let digits = format!("{whole}{fraction}");
    let numer: BigInt = digits.parse().map_err(|_| invalid())?;
    let denom = num_traits::pow(BigInt::from(10u32), fraction.len());
    Ok(Rational::new(numer, denom))
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    input: &'a str,
    domains: &'a BTreeMap<String, Domain>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, code: &str, message: impl Into<String>) -> TermwitError {
        TermwitError::Parse(
            ErrorInfo::new(code, message)
                .with_context("input", self.input)
                .with_context("token", self.pos.to_string()),
        )
    }

    fn expression(&mut self) -> Result<Expr, TermwitError> {
        let mut value = self.term()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Plus => {
                    self.pos += 1;
                    value = value + self.term()?;
                }
                Token::Minus => {
                    self.pos += 1;
                    value = value - self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<Expr, TermwitError> {
        let mut value = self.unary()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Star => {
                    self.pos += 1;
                    value = &value * &self.unary()?;
                }
                Token::Slash => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    let constant = divisor
                        .as_poly()
                        .and_then(|poly| poly.constant_value())
                        .ok_or_else(|| {
                            self.error("non-constant-division", "division by a non-constant")
                        })?;
                    if constant.is_zero() {
                        return Err(self.error("division-by-zero", "division by zero"));
                    }
                    value = value.scale(&constant.recip());
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<Expr, TermwitError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, TermwitError> {
        let base = self.atom()?;
        if self.peek() != Some(&Token::Caret) {
            return Ok(base);
        }
        self.pos += 1;
        match self.next() {
            Some(Token::Number(exp)) => {
                if !exp.is_integer() || exp.is_negative() {
                    return Err(self.error("bad-exponent", "exponents must be natural numbers"));
                }
                let exp = exp
                    .to_integer()
                    .try_into()
                    .map_err(|_| self.error("bad-exponent", "exponent too large"))?;
                Ok(base.pow(exp))
            }
            Some(Token::Ident(name)) if name == ITER_VAR => {
                let constant = base
                    .as_poly()
                    .and_then(|poly| poly.constant_value())
                    .ok_or_else(|| {
                        self.error("bad-exponential", "only constant bases may be raised to n")
                    })?;
                Expr::exponential(constant).map_err(|_| {
                    self.error("bad-exponential", "exponential bases must be positive")
                })
            }
            _ => Err(self.error(
                "bad-exponent",
                "expected a natural number or 'n' after '^'",
            )),
        }
    }

    fn atom(&mut self) -> Result<Expr, TermwitError> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Expr::constant(value)),
            Some(Token::Ident(name)) => {
                let sym = if name == ITER_VAR {
                    Symbol::iteration()
                } else {
                    let domain = self.domains.get(&name).copied().unwrap_or(Domain::Real);
                    Symbol::with_domain(name, domain)
                };
                Ok(Expr::from(Poly::var(sym)))
            }
            Some(Token::LParen) => {
                let inner = self.expression()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("unbalanced-parentheses", "expected ')'")),
                }
            }
            Some(token) => Err(self.error(
                "unexpected-token",
                format!("unexpected token {token:?}"),
            )),
            None => Err(self.error("unexpected-end", "unexpected end of input")),
        }
    }
}

/// Parses an expression that may contain exponentials in `n`. Every symbol
/// other than `n` is an unconstrained real.
pub fn parse_expr(input: &str) -> Result<Expr, TermwitError> {
    parse_expr_with_domains(input, &BTreeMap::new())
}

/// Like [`parse_expr`], but symbols listed in `domains` take that domain.
pub fn parse_expr_with_domains(
    input: &str,
    domains: &BTreeMap<String, Domain>,
) -> Result<Expr, TermwitError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(parse_error("empty-expression", "expression is empty", input));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        input,
        domains,
    };
    let value = parser.expression()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("trailing-input", "unexpected trailing input"));
    }
    Ok(value)
}

/// Parses a plain polynomial; exponentials are rejected.
pub fn parse_poly(input: &str) -> Result<Poly, TermwitError> {
    parse_poly_with_domains(input, &BTreeMap::new())
}

/// Like [`parse_poly`], but symbols listed in `domains` take that domain.
pub fn parse_poly_with_domains(
    input: &str,
    domains: &BTreeMap<String, Domain>,
) -> Result<Poly, TermwitError> {
    parse_expr_with_domains(input, domains)?.as_poly().ok_or_else(|| {
        parse_error(
            "not-polynomial",
            "expected a polynomial without exponentials",
            input,
        )
    })
}

/// Parses a rational constant such as `3`, `-1/2` or `0.25`.
pub fn parse_rational(input: &str) -> Result<Rational, TermwitError> {
    parse_poly(input)?
        .constant_value()
        .ok_or_else(|| parse_error("not-constant", "expected a rational constant", input))
}

/// Accepts either a string or a bare YAML/JSON number and returns its text.
pub(crate) fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct TextVisitor;

    impl<'de> serde::de::Visitor<'de> for TextVisitor {
        type Value = String;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("an expression string or a number")
        }

        fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<String, E> {
            if value.is_finite() {
                Ok(value.to_string())
            } else {
                Err(E::custom("non-finite numbers are not rationals"))
            }
        }
    }

    deserializer.deserialize_any(TextVisitor)
}

/// Serde adapter storing a [`Rational`] as text, for `#[serde(with = ...)]`.
pub mod rational_serde {
    use serde::{Deserializer, Serializer};

    use crate::poly::Rational;

    /// Writes the canonical `p/q` rendering.
    pub fn serialize<S: Serializer>(value: &Rational, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Reads a rational from text or a plain number.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Rational, D::Error> {
        let text = super::deserialize_text(deserializer)?;
        super::parse_rational(&text).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for lists of rationals.
pub mod rational_vec_serde {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::poly::Rational;

    #[derive(Deserialize)]
    struct Item(#[serde(with = "super::rational_serde")] Rational);

    /// Writes every element as text.
    pub fn serialize<S: Serializer>(values: &[Rational], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&value.to_string())?;
        }
        seq.end()
    }

    /// Reads a list whose elements are text or plain numbers.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Rational>, D::Error> {
        let items = Vec::<Item>::deserialize(deserializer)?;
        Ok(items.into_iter().map(|Item(value)| value).collect())
    }
}
