//! Loop guards: constants, atoms and their conjunctions or disjunctions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use termwit_core::errors::{ErrorInfo, TermwitError};
use termwit_core::Domain;

use crate::atom::Atom;

/// Boolean loop condition. Only single atoms are analysed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// `true` or `false`.
    Const(bool),
    /// A single comparison.
    Atom(Atom),
    /// Every operand holds.
    And(Vec<Guard>),
    /// Some operand holds.
    Or(Vec<Guard>),
}

/// Splits on `separator` wherever it occurs outside parentheses.
fn split_top_level<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut idx = 0;
    while idx < text.len() {
        let rest = &text[idx..];
        if depth == 0 && rest.starts_with(separator) {
            parts.push(&text[start..idx]);
            idx += separator.len();
            start = idx;
            continue;
        }
        match rest.chars().next() {
            Some('(') => depth += 1,
            Some(')') => depth -= 1,
            _ => {}
        }
        idx += rest.chars().next().map_or(1, char::len_utf8);
    }
    parts.push(&text[start..]);
    parts
}

/// Drops parentheses that enclose the whole text.
fn strip_enclosing(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with('(') || !trimmed.ends_with(')') {
        return trimmed;
    }
    let mut depth = 0i32;
    for (idx, ch) in trimmed.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && idx + 1 < trimmed.len() {
            return trimmed;
        }
    }
    strip_enclosing(&trimmed[1..trimmed.len() - 1])
}

impl Guard {
    /// Parses a guard using `&&`, `||`, parentheses, `true` and `false`.
    pub fn parse(text: &str) -> Result<Self, TermwitError> {
        Self::parse_with_domains(text, &BTreeMap::new())
    }

    /// Like [`Guard::parse`], giving the listed symbols their domains.
    pub fn parse_with_domains(
        text: &str,
        domains: &BTreeMap<String, Domain>,
    ) -> Result<Self, TermwitError> {
        let text = strip_enclosing(text);
        if text.is_empty() {
            return Err(TermwitError::Parse(ErrorInfo::new(
                "empty-guard",
                "guard is empty",
            )));
        }
        for (separator, build) in [
            ("||", Guard::Or as fn(Vec<Guard>) -> Guard),
            ("&&", Guard::And as fn(Vec<Guard>) -> Guard),
        ] {
            let parts = split_top_level(text, separator);
            if parts.len() > 1 {
                let operands = parts
                    .into_iter()
                    .map(|part| Self::parse_with_domains(part, domains))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(build(operands));
            }
        }
        match text {
            "true" => Ok(Guard::Const(true)),
            "false" => Ok(Guard::Const(false)),
            _ => Atom::parse_with_domains(text, domains).map(Guard::Atom),
        }
    }

    /// Re-tags parameter symbols throughout the guard.
    pub fn assign_domains(&self, domains: &BTreeMap<String, Domain>) -> Self {
        match self {
            Guard::Const(value) => Guard::Const(*value),
            Guard::Atom(atom) => Guard::Atom(atom.assign_domains(domains)),
            Guard::And(operands) => {
                Guard::And(operands.iter().map(|g| g.assign_domains(domains)).collect())
            }
            Guard::Or(operands) => {
                Guard::Or(operands.iter().map(|g| g.assign_domains(domains)).collect())
            }
        }
    }

    /// The guard's only atom; compound and constant guards are unsupported
    /// input.
    pub fn single_atom(&self) -> Result<&Atom, TermwitError> {
        match self {
            Guard::Atom(atom) => Ok(atom),
            Guard::Const(value) => Err(TermwitError::Input(
                ErrorInfo::new("constant-guard", "constant guards are not analysed")
                    .with_context("guard", value.to_string()),
            )),
            Guard::And(_) | Guard::Or(_) => Err(TermwitError::Input(
                ErrorInfo::new(
                    "multi-atom-guard",
                    "only guards made of a single comparison are supported",
                )
                .with_context("guard", self.to_string()),
            )),
        }
    }
}

fn write_operands(f: &mut fmt::Formatter<'_>, operands: &[Guard], separator: &str) -> fmt::Result {
    for (idx, operand) in operands.iter().enumerate() {
        if idx > 0 {
            write!(f, " {separator} ")?;
        }
        match operand {
            Guard::And(_) | Guard::Or(_) => write!(f, "({operand})")?,
            _ => write!(f, "{operand}")?,
        }
    }
    Ok(())
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Const(value) => write!(f, "{value}"),
            Guard::Atom(atom) => write!(f, "{atom}"),
            Guard::And(operands) => write_operands(f, operands, "&&"),
            Guard::Or(operands) => write_operands(f, operands, "||"),
        }
    }
}

impl Serialize for Guard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Guard {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Guard::parse(&text).map_err(serde::de::Error::custom)
    }
}
