//! Relational atoms and their reduction to a polynomial plus exit flags.
//!
//! A loop guarded by `lhs op rhs` keeps running while the atom holds. The
//! normalizer moves everything to one side so that the loop exits exactly when
//! the resulting polynomial `P` becomes zero and/or negative.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use termwit_core::errors::{ErrorInfo, TermwitError};
use termwit_core::{parse_poly_with_domains, Domain, Poly};
use tracing::trace;

/// Comparison operator of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelOp {
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `!=`, representable but never normalized.
    Ne,
}

impl RelOp {
    /// Every operator, two-character spellings first so scanning is greedy.
    pub const ALL: [RelOp; 6] = [
        RelOp::Ge,
        RelOp::Le,
        RelOp::Eq,
        RelOp::Ne,
        RelOp::Gt,
        RelOp::Lt,
    ];

    /// Source spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelOp::Gt => ">",
            RelOp::Lt => "<",
            RelOp::Ge => ">=",
            RelOp::Le => "<=",
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
        }
    }
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelOp {
    type Err = TermwitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s.trim())
            .ok_or_else(|| {
                TermwitError::Parse(
                    ErrorInfo::new("unknown-operator", "not a comparison operator")
                        .with_context("operator", s),
                )
            })
    }
}

/// `lhs op rhs` over polynomials in program symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    /// Left-hand side.
    pub lhs: Poly,
    /// Comparison.
    pub op: RelOp,
    /// Right-hand side.
    pub rhs: Poly,
}

/// Position and operator of every top-level comparison in `text`.
fn find_operators(text: &str) -> Vec<(usize, RelOp)> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut idx = 0;
    while idx < bytes.len() {
        let rest = &text[idx..];
        match RelOp::ALL.into_iter().find(|op| rest.starts_with(op.as_str())) {
            Some(op) => {
                found.push((idx, op));
                idx += op.as_str().len();
            }
            None => idx += rest.chars().next().map_or(1, char::len_utf8),
        }
    }
    found
}

impl Atom {
    /// Creates an atom.
    pub fn new(lhs: Poly, op: RelOp, rhs: Poly) -> Self {
        Self { lhs, op, rhs }
    }

    /// Parses `lhs op rhs` with every symbol an unconstrained real.
    pub fn parse(text: &str) -> Result<Self, TermwitError> {
        Self::parse_with_domains(text, &BTreeMap::new())
    }

    /// Parses `lhs op rhs`, giving the listed symbols their domains.
    pub fn parse_with_domains(
        text: &str,
        domains: &BTreeMap<String, Domain>,
    ) -> Result<Self, TermwitError> {
        let operators = find_operators(text);
        let (idx, op) = match operators.as_slice() {
            [single] => *single,
            [] => {
                return Err(TermwitError::Parse(
                    ErrorInfo::new("missing-operator", "atom has no comparison operator")
                        .with_context("input", text),
                ))
            }
            _ => {
                return Err(TermwitError::Parse(
                    ErrorInfo::new("chained-comparison", "atom has more than one comparison")
                        .with_context("input", text)
                        .with_hint("split chained comparisons into a conjunction"),
                ))
            }
        };
        let lhs = parse_poly_with_domains(&text[..idx], domains)?;
        let rhs = parse_poly_with_domains(&text[idx + op.as_str().len()..], domains)?;
        Ok(Self { lhs, op, rhs })
    }

    /// Re-tags parameter symbols on both sides.
    pub fn assign_domains(&self, domains: &BTreeMap<String, Domain>) -> Self {
        Self {
            lhs: self.lhs.assign_domains(domains),
            op: self.op,
            rhs: self.rhs.assign_domains(domains),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Atom {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Atom::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Guard reduced to `P` and the conditions under which the loop exits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedAtom {
    /// Oriented polynomial.
    pub poly: Poly,
    /// The loop exits once `P` is zero.
    pub terminates_on_zero: bool,
    /// The loop exits once `P` is negative.
    pub terminates_on_negative: bool,
}

impl NormalizedAtom {
    /// Restates the normal form as an atom against zero, `None` when neither
    /// flag is set.
    pub fn as_atom(&self) -> Option<Atom> {
        let zero = Poly::zero();
        match (self.terminates_on_zero, self.terminates_on_negative) {
            (true, true) => Some(Atom::new(self.poly.clone(), RelOp::Gt, zero)),
            (false, true) => Some(Atom::new(self.poly.clone(), RelOp::Ge, zero)),
            (true, false) => Some(Atom::new(zero, RelOp::Eq, self.poly.clone())),
            (false, false) => None,
        }
    }
}

/// Orients an atom so the loop exits when `P` leaves the positive (or
/// non-negative) region.
///
/// | op   | P         | zero | negative |
/// |------|-----------|------|----------|
/// | `>`  | lhs - rhs | yes  | yes      |
/// | `<`  | rhs - lhs | yes  | yes      |
/// | `>=` | lhs - rhs | no   | yes      |
/// | `<=` | rhs - lhs | no   | yes      |
/// | `==` | rhs - lhs | yes  | no       |
pub fn normalize(atom: &Atom) -> Result<NormalizedAtom, TermwitError> {
    let forward = || &atom.lhs - &atom.rhs;
    let backward = || &atom.rhs - &atom.lhs;
    let (poly, terminates_on_zero, terminates_on_negative) = match atom.op {
        RelOp::Gt => (forward(), true, true),
        RelOp::Lt => (backward(), true, true),
        RelOp::Ge => (forward(), false, true),
        RelOp::Le => (backward(), false, true),
        RelOp::Eq => (backward(), true, false),
        RelOp::Ne => {
            return Err(TermwitError::Input(
                ErrorInfo::new("unsupported-operator", "'!=' guards cannot be normalized")
                    .with_context("atom", atom.to_string()),
            ))
        }
    };
    trace!(%atom, %poly, terminates_on_zero, terminates_on_negative, "normalized atom");
    Ok(NormalizedAtom {
        poly,
        terminates_on_zero,
        terminates_on_negative,
    })
}
