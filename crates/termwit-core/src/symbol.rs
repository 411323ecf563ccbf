//! Named symbols with sign domains.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the iteration variable.
pub const ITER_VAR: &str = "n";

/// Sign domain of a symbol, used by the syntactic sign checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    /// Any real value.
    Real,
    /// Real values `>= 0`.
    NonNegative,
    /// Real values `> 0`.
    Positive,
}

/// Symbol appearing in polynomials and closed forms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol {
    name: String,
    domain: Domain,
}

impl Symbol {
    /// Creates an unconstrained real symbol.
    pub fn real(name: impl Into<String>) -> Self {
        Self::with_domain(name, Domain::Real)
    }

    /// Creates a symbol with an explicit domain.
    pub fn with_domain(name: impl Into<String>, domain: Domain) -> Self {
        Self {
            name: name.into(),
            domain,
        }
    }

    /// Returns the iteration variable `n` (non-negative).
    pub fn iteration() -> Self {
        Self::with_domain(ITER_VAR, Domain::NonNegative)
    }

    /// Returns the symbol name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the symbol domain.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Returns true for the iteration variable.
    pub fn is_iteration(&self) -> bool {
        self.name == ITER_VAR && self.domain == Domain::NonNegative
    }

    /// Returns true when the symbol can never be negative.
    pub fn is_nonnegative(&self) -> bool {
        matches!(self.domain, Domain::NonNegative | Domain::Positive)
    }

    /// Returns true when the symbol is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.domain == Domain::Positive
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Hands out fresh positive symbols that cannot clash with parsed names.
#[derive(Debug, Clone, Default)]
pub struct FreshSymbols {
    counter: u64,
}

impl FreshSymbols {
    /// Returns the next fresh positive symbol (`__a1`, `__a2`, ...).
    pub fn next_positive(&mut self) -> Symbol {
        self.counter += 1;
        Symbol::with_domain(format!("__a{}", self.counter), Domain::Positive)
    }
}
