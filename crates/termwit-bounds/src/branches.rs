//! Loop-structure inputs consumed by bound synthesis: recurrence branches,
//! random-variable distributions, closed forms and initial values.

use std::collections::{BTreeMap, BTreeSet};

use num_traits::One;
use serde::{Deserialize, Serialize};
use termwit_core::errors::{ErrorInfo, TermwitError};
use termwit_core::parse::rational_serde;
use termwit_core::{Expr, Monomial, Poly, Rational, Symbol};

use crate::distribution::Distribution;

/// One update branch `m_{n+1} = coefficient * m_n + inhomogeneous`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Multiplicative recurrence coefficient.
    #[serde(with = "rational_serde")]
    pub coefficient: Rational,
    /// Additive part, evaluated on the state before the update.
    pub inhomogeneous: Poly,
}

impl Branch {
    /// Creates a branch.
    pub fn new(coefficient: Rational, inhomogeneous: Poly) -> Self {
        Self {
            coefficient,
            inhomogeneous,
        }
    }
}

fn branch_error(code: &str, message: &str, key: &str, value: String) -> TermwitError {
    TermwitError::Input(ErrorInfo::new(code, message).with_context(key, value))
}

/// Monomial to its possible update branches. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchMap {
    entries: BTreeMap<Monomial, Vec<Branch>>,
}

impl BranchMap {
    /// Builds a map, rejecting empty branch lists.
    pub fn new(entries: BTreeMap<Monomial, Vec<Branch>>) -> Result<Self, TermwitError> {
        if let Some((monomial, _)) = entries.iter().find(|(_, branches)| branches.is_empty()) {
            return Err(branch_error(
                "empty-branches",
                "a monomial needs at least one branch",
                "monomial",
                monomial.to_string(),
            ));
        }
        Ok(Self { entries })
    }

    /// Builds a map from polynomial keys; every key must be a bare monomial
    /// with coefficient `1`.
    pub fn from_polys(
        entries: impl IntoIterator<Item = (Poly, Vec<Branch>)>,
    ) -> Result<Self, TermwitError> {
        let mut map = BTreeMap::new();
        for (key, branches) in entries {
            let monomial = bare_monomial(&key).ok_or_else(|| {
                branch_error(
                    "bad-branch-key",
                    "branch keys must be monomials",
                    "key",
                    key.to_string(),
                )
            })?;
            map.insert(monomial, branches);
        }
        Self::new(map)
    }

    /// Branches of a monomial.
    pub fn get(&self, monomial: &Monomial) -> Option<&[Branch]> {
        self.entries.get(monomial).map(Vec::as_slice)
    }

    /// Number of branches of a single symbol, `0` when it has none.
    pub fn branch_count(&self, sym: &Symbol) -> usize {
        self.get(&Monomial::var_pow(sym.clone(), 1))
            .map_or(0, <[Branch]>::len)
    }

    /// Iterates over entries in monomial order.
    pub fn iter(&self) -> impl Iterator<Item = (&Monomial, &[Branch])> {
        self.entries
            .iter()
            .map(|(monomial, branches)| (monomial, branches.as_slice()))
    }

    /// Symbols occurring in any key.
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        self.entries
            .keys()
            .flat_map(|monomial| monomial.powers().map(|(sym, _)| sym.clone()))
            .collect()
    }

    /// True when some entry lists more than one branch.
    pub fn is_probabilistic(&self) -> bool {
        self.entries.values().any(|branches| branches.len() > 1)
    }
}

/// The monomial of a single-term polynomial with unit coefficient.
pub fn bare_monomial(poly: &Poly) -> Option<Monomial> {
    let mut terms = poly.terms();
    let (monomial, coeff) = terms.next()?;
    if terms.next().is_some() || !coeff.is_one() {
        return None;
    }
    Some(monomial.clone())
}

/// Random-variable symbol to its distribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistAssignments {
    entries: BTreeMap<Symbol, Distribution>,
}

impl DistAssignments {
    /// Builds the map after validating every distribution.
    pub fn new(entries: BTreeMap<Symbol, Distribution>) -> Result<Self, TermwitError> {
        for dist in entries.values() {
            dist.validate()?;
        }
        Ok(Self { entries })
    }

    /// Distribution of a symbol.
    pub fn get(&self, sym: &Symbol) -> Option<&Distribution> {
        self.entries.get(sym)
    }

    /// True when `sym` is a random variable.
    pub fn contains(&self, sym: &Symbol) -> bool {
        self.entries.contains_key(sym)
    }

    /// Iterates over assignments in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Distribution)> {
        self.entries.iter()
    }

    /// True when no random variables are assigned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Solved closed form of a program symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedForm {
    /// Value as a function of `n`.
    pub expr: Expr,
    /// False when the solver only produced an approximation.
    #[serde(default = "default_exact")]
    pub exact: bool,
}

fn default_exact() -> bool {
    true
}

impl ClosedForm {
    /// An exact closed form.
    pub fn exact(expr: Expr) -> Self {
        Self { expr, exact: true }
    }
}

/// Supplier of closed forms, typically a recurrence solver.
pub trait ClosedFormSource {
    /// Closed form of `sym`, if one was derived.
    fn closed_form(&self, sym: &Symbol) -> Option<ClosedForm>;

    /// Every symbol with a closed form.
    fn symbols(&self) -> BTreeSet<Symbol>;
}

/// Map-backed [`ClosedFormSource`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosedForms {
    entries: BTreeMap<Symbol, ClosedForm>,
}

impl ClosedForms {
    /// Wraps a symbol to closed form map.
    pub fn new(entries: BTreeMap<Symbol, ClosedForm>) -> Self {
        Self { entries }
    }

    /// Adds or replaces a closed form.
    pub fn insert(&mut self, sym: Symbol, form: ClosedForm) {
        self.entries.insert(sym, form);
    }
}

impl ClosedFormSource for ClosedForms {
    fn closed_form(&self, sym: &Symbol) -> Option<ClosedForm> {
        self.entries.get(sym).cloned()
    }

    fn symbols(&self) -> BTreeSet<Symbol> {
        self.entries.keys().cloned().collect()
    }
}

/// Values of program symbols before the first iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitialValues {
    entries: BTreeMap<Symbol, Poly>,
}

impl InitialValues {
    /// Wraps a symbol to value map.
    pub fn new(entries: BTreeMap<Symbol, Poly>) -> Self {
        Self { entries }
    }

    /// Initial value of a symbol.
    pub fn get(&self, sym: &Symbol) -> Option<&Poly> {
        self.entries.get(sym)
    }

    /// Initial value of a monomial, when every factor is known.
    pub fn of_monomial(&self, monomial: &Monomial) -> Option<Poly> {
        let mut value = Poly::one();
        for (sym, power) in monomial.powers() {
            value = &value * &self.entries.get(sym)?.pow(power);
        }
        Some(value)
    }

    /// Iterates over known values.
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Poly)> {
        self.entries.iter()
    }
}

/// Borrowed view of everything bound synthesis and simulation read about a
/// loop.
#[derive(Clone, Copy)]
pub struct LoopModel<'a> {
    /// Recurrence branches per monomial.
    pub branches: &'a BranchMap,
    /// Random-variable distributions.
    pub distributions: &'a DistAssignments,
    /// Closed forms of deterministic symbols.
    pub closed_forms: &'a dyn ClosedFormSource,
    /// Values before the first iteration.
    pub initial_values: &'a InitialValues,
}

impl<'a> LoopModel<'a> {
    /// True when `sym` is a loop variable or random variable rather than a
    /// free parameter.
    pub fn is_program_symbol(&self, sym: &Symbol) -> bool {
        self.branches.symbols().contains(sym)
            || self.distributions.contains(sym)
            || self.initial_values.get(sym).is_some()
            || self.closed_forms.closed_form(sym).is_some()
    }
}
