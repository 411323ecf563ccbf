//! Classification of the reduced guard expression into a termination
//! witness.
//!
//! An expression whose only symbol is `n` is scanned exactly: its sign over the
//! naturals can only change next to a real root, so checking `0` and the
//! integers around every root finds the first exit. Anything mentioning
//! parameters is decided asymptotically from its dominant coefficient.

use num_traits::{Signed, Zero};
use termwit_core::errors::TermwitError;
use termwit_core::roots::{self, sign_change_candidates, RootInterval};
use termwit_core::{get_sign, rational, EngineConfig, Expr, Poly, Rational, Symbol};
use tracing::{debug, trace};

use crate::atom::NormalizedAtom;
use crate::witness::{ExactWitness, Witness};

/// Termination condition `P` with the exit flags of its guard.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialTerminationCondition {
    expr: Expr,
    terminates_on_zero: bool,
    terminates_on_negative: bool,
}

impl PolynomialTerminationCondition {
    /// Creates a condition over `expr`.
    pub fn new(expr: Expr, terminates_on_zero: bool, terminates_on_negative: bool) -> Self {
        Self {
            expr,
            terminates_on_zero,
            terminates_on_negative,
        }
    }

    /// Uses the flags of a normalized atom for an already substituted `expr`.
    pub fn with_flags(expr: Expr, normalized: &NormalizedAtom) -> Self {
        Self::new(
            expr,
            normalized.terminates_on_zero,
            normalized.terminates_on_negative,
        )
    }

    /// The expression being classified.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Derives a witness. Budget and unsupported-shape errors are returned
    /// so the caller can decide how to downgrade them.
    pub fn witness(&self, config: &EngineConfig) -> Result<Witness, TermwitError> {
        let iter = Symbol::iteration();
        if let Some(poly) = self.expr.as_poly() {
            if poly.free_symbols().iter().all(|sym| *sym == iter) {
                return self.exact_witness(&poly, config).map(Witness::Exact);
            }
        }
        Ok(self.asymptotic_witness())
    }

    fn exact_witness(&self, poly: &Poly, config: &EngineConfig) -> Result<ExactWitness, TermwitError> {
        let iter = Symbol::iteration();
        let coeffs = poly.univariate_coeffs(&iter).unwrap_or_default();
        let intervals =
            roots::isolate_roots(&coeffs, config.max_root_degree, config.root_tolerance)?;
        let roots: Vec<f64> = intervals.iter().map(RootInterval::approximate).collect();
        debug!(%poly, ?roots, "exact scan");
        let first_exit = sign_change_candidates(&intervals)
            .into_iter()
            .find(|candidate| {
                let value = roots::eval(&coeffs, &Rational::from_integer(candidate.clone()));
                trace!(%candidate, %value, "candidate value");
                (value.is_negative() && self.terminates_on_negative)
                    || (value.is_zero() && self.terminates_on_zero)
            });
        Ok(ExactWitness {
            poly: poly.clone(),
            roots,
            first_exit,
            terminates_on_zero: self.terminates_on_zero,
            terminates_on_negative: self.terminates_on_negative,
        })
    }

    fn asymptotic_witness(&self) -> Witness {
        if !self.terminates_on_negative {
            return Witness::undetermined(
                "a guard that only exits on zero cannot be decided asymptotically",
            );
        }
        let terms = self.expr.growth_terms();
        let Some(dominant) = terms.first() else {
            return Witness::undetermined("the guard expression is identically zero");
        };
        debug!(expr = %self.expr, leading = %dominant.coeff, "asymptotic analysis");
        match get_sign(&dominant.coeff) {
            None => Witness::undetermined(format!(
                "the sign of the dominant coefficient {} is unknown",
                dominant.coeff
            )),
            Some(false) => Witness::AsymptoticTerminating {
                expr: self.expr.clone(),
                leading_coefficient: dominant.coeff.clone(),
            },
            Some(true) => self.constant_growth_witness(),
        }
    }

    /// Looks for a symbol that only occurs in the constant term and can drive
    /// it to `+inf`.
    fn constant_growth_witness(&self) -> Witness {
        let constant = self.expr.constant_term();
        let others: Vec<Poly> = self
            .expr
            .growth_terms()
            .into_iter()
            .filter(|term| !(term.degree == 0 && term.base == rational(1)))
            .map(|term| term.coeff)
            .collect();
        trace!(%constant, "constant term");
        let found = constant.free_symbols().into_iter().find(|sym| {
            if others.iter().any(|coeff| coeff.contains(sym)) {
                return false;
            }
            let degree = constant.degree_in(sym);
            let leading = constant.leading_coeff_in(sym);
            // Odd powers of an unconstrained symbol reach +inf from either side.
            if degree % 2 == 1 && !sym.is_nonnegative() {
                get_sign(&leading).is_some()
            } else {
                degree > 0 && get_sign(&leading) == Some(true)
            }
        });
        match found {
            Some(symbol) => Witness::AsymptoticConstantGrowth {
                expr: self.expr.clone(),
                symbol,
            },
            None => Witness::undetermined(
                "the guard is eventually positive but no parameter provably keeps it so",
            ),
        }
    }
}
