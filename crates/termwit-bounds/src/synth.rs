//! Recursive synthesis of `(lower, upper)` bounds for polynomials over loop
//! variables under nondeterministic and probabilistic updates.
//!
//! Recurrence candidates come from closed-form solutions; only those that
//! pass the inductive step check hold at every iteration and reach the
//! dominance oracle.

use std::collections::{BTreeMap, BTreeSet};

use num_traits::{Signed, Zero};
use serde::Serialize;
use termwit_core::errors::{ErrorInfo, TermwitError};
use termwit_core::{
    always_nonnegative, peak_on_naturals, possible_signs, rational, EngineConfig, Expr,
    FreshSymbols, Monomial, Poly, Rational, Symbol,
};
use termwit_dominance::DominanceOracle;
use tracing::{debug, trace};

use crate::branches::{Branch, LoopModel};
use crate::distribution::Support;
use crate::induction::{
    pair_holds, surviving_lowers, surviving_uppers, Candidate, StartRange, Step,
};
use crate::recurrence::solve_linear;

/// Lower and upper bound of a quantity as functions of `n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundPair {
    /// Bound from below.
    pub lower: Expr,
    /// Bound from above.
    pub upper: Expr,
}

impl BoundPair {
    /// A pair whose bounds coincide.
    pub fn exact(value: Expr) -> Self {
        Self {
            lower: value.clone(),
            upper: value,
        }
    }

    /// True when both bounds are the same expression.
    pub fn is_exact(&self) -> bool {
        self.lower == self.upper
    }

    /// Whether `value` lies between the bounds at iteration `n`; `None` when a
    /// bound mentions a symbol missing from `values`.
    pub fn contains(
        &self,
        n: u64,
        value: &Rational,
        values: &BTreeMap<Symbol, Rational>,
    ) -> Option<bool> {
        let lower = self.lower.eval(n, values)?;
        let upper = self.upper.eval(n, values)?;
        Some(&lower <= value && value <= &upper)
    }
}

fn unsupported(code: &str, message: &str) -> TermwitError {
    TermwitError::Unsupported(ErrorInfo::new(code, message))
}

fn budget(code: &str, message: &str, limit: usize) -> TermwitError {
    TermwitError::Budget(ErrorInfo::new(code, message).with_context("limit", limit.to_string()))
}

/// Bound synthesizer for one analysis run; results are memoised per
/// monomial.
pub struct BoundSynthesizer<'a, O: DominanceOracle> {
    model: LoopModel<'a>,
    oracle: O,
    config: EngineConfig,
    memo: BTreeMap<Monomial, BoundPair>,
    in_progress: BTreeSet<Monomial>,
    fresh: FreshSymbols,
}

impl<'a, O: DominanceOracle> BoundSynthesizer<'a, O> {
    /// Creates a synthesizer over the given loop model.
    pub fn new(model: LoopModel<'a>, oracle: O, config: &EngineConfig) -> Self {
        Self {
            model,
            oracle,
            config: config.clone(),
            memo: BTreeMap::new(),
            in_progress: BTreeSet::new(),
            fresh: FreshSymbols::default(),
        }
    }

    /// Monomials whose bounds have been computed so far.
    pub fn cached_monomials(&self) -> impl Iterator<Item = &Monomial> {
        self.memo.keys()
    }

    /// Bounds an arbitrary polynomial over loop variables and parameters.
    pub fn bound_poly(&mut self, poly: &Poly) -> Result<BoundPair, TermwitError> {
        let mut lower = Expr::zero();
        let mut upper = Expr::zero();
        for (monomial, coeff) in self.split_parameters(poly) {
            let pair = self.bound_monomial(&monomial)?;
            let (lo, hi) = route(&Expr::from(coeff), &pair, &monomial)?;
            lower = lower + lo;
            upper = upper + hi;
        }
        debug!(%poly, %lower, %upper, "bounded polynomial");
        Ok(BoundPair { lower, upper })
    }

    /// Groups terms by their loop-variable monomial; the remaining factors,
    /// parameters and `n`, form the coefficient.
    fn split_parameters(&self, poly: &Poly) -> BTreeMap<Monomial, Poly> {
        let mut groups: BTreeMap<Monomial, Poly> = BTreeMap::new();
        for (monomial, coeff) in poly.terms() {
            let (program, rest): (Vec<_>, Vec<_>) = monomial
                .powers()
                .map(|(sym, power)| (sym.clone(), power))
                .partition(|(sym, _)| !sym.is_iteration() && self.model.is_program_symbol(sym));
            let factor = Poly::term(coeff.clone(), Monomial::from_powers(rest));
            let entry = groups.entry(Monomial::from_powers(program)).or_default();
            *entry = &*entry + &factor;
        }
        groups.retain(|_, coeff| !coeff.is_zero());
        groups
    }

    /// Bounds a single monomial over loop and random variables.
    pub fn bound_monomial(&mut self, monomial: &Monomial) -> Result<BoundPair, TermwitError> {
        let (random, remainder): (Vec<_>, Vec<_>) = monomial
            .powers()
            .map(|(sym, power)| (sym.clone(), power))
            .partition(|(sym, _)| self.model.distributions.contains(sym));
        let mut pair = self.bound_remainder(&Monomial::from_powers(remainder))?;
        for (rv, power) in random {
            pair = self.widen(pair, &rv, power)?;
        }
        Ok(pair)
    }

    fn bound_remainder(&mut self, monomial: &Monomial) -> Result<BoundPair, TermwitError> {
        if monomial.is_one() {
            return Ok(BoundPair::exact(Expr::from(Poly::one())));
        }
        if let Some(pair) = self.memo.get(monomial) {
            return Ok(pair.clone());
        }
        let has_closed_forms = monomial
            .powers()
            .all(|(sym, _)| self.model.closed_forms.closed_form(sym).is_some());
        let branch_map = self.model.branches;
        let pair = match branch_map.get(monomial) {
            _ if self.is_deterministic(monomial) && has_closed_forms => {
                self.substitute_closed_forms(monomial)?
            }
            Some(branches) => self.bound_recurrence(monomial, branches)?,
            None if self.is_deterministic(monomial) => self.substitute_closed_forms(monomial)?,
            None => {
                return Err(TermwitError::Internal(
                    ErrorInfo::new(
                        "missing-branch",
                        "a branching monomial has no entry in the branch map",
                    )
                    .with_context("monomial", monomial.to_string()),
                ))
            }
        };
        debug!(%monomial, lower = %pair.lower, upper = %pair.upper, "bounded monomial");
        self.memo.insert(monomial.clone(), pair.clone());
        Ok(pair)
    }

    fn is_deterministic(&self, monomial: &Monomial) -> bool {
        monomial.powers().all(|(sym, _)| {
            self.model.branches.branch_count(sym) <= 1 && !self.model.distributions.contains(sym)
        })
    }

    fn substitute_closed_forms(&self, monomial: &Monomial) -> Result<BoundPair, TermwitError> {
        let mut replacements = BTreeMap::new();
        for (sym, _) in monomial.powers() {
            if let Some(form) = self.model.closed_forms.closed_form(sym) {
                if !form.exact {
                    return Err(TermwitError::Unsupported(
                        ErrorInfo::new("inexact-closed-form", "closed form is not exact")
                            .with_context("symbol", sym.to_string()),
                    ));
                }
                replacements.insert(sym.clone(), form.expr);
            }
        }
        let value = Expr::from(Poly::term(rational(1), monomial.clone()))
            .subs_all(&replacements);
        Ok(BoundPair::exact(value))
    }

    fn bound_recurrence(
        &mut self,
        monomial: &Monomial,
        branches: &[Branch],
    ) -> Result<BoundPair, TermwitError> {
        if self.in_progress.len() >= self.config.max_bound_depth {
            return Err(budget(
                "bound-depth",
                "bound recursion exceeded the configured depth",
                self.config.max_bound_depth,
            ));
        }
        if !self.in_progress.insert(monomial.clone()) {
            return Err(TermwitError::Unsupported(
                ErrorInfo::new("cyclic-recurrence", "monomial depends on itself additively")
                    .with_context("monomial", monomial.to_string()),
            ));
        }
        let result = self.solve_recurrence(monomial, branches);
        self.in_progress.remove(monomial);
        result
    }

    fn solve_recurrence(
        &mut self,
        monomial: &Monomial,
        branches: &[Branch],
    ) -> Result<BoundPair, TermwitError> {
        if branches.is_empty() {
            return Err(unsupported("empty-branches", "no branches to bound"));
        }
        let mut steps = Vec::with_capacity(branches.len());
        for branch in branches {
            let pair = self.bound_poly(&branch.inhomogeneous)?;
            steps.push(Step {
                coefficient: branch.coefficient.clone(),
                lower: pair.lower,
                upper: pair.upper,
            });
        }

        let initial = self.model.initial_values.of_monomial(monomial);
        let (maybe_pos, maybe_neg) = trajectory_signs(initial.as_ref(), &steps);
        trace!(%monomial, maybe_pos, maybe_neg, "trajectory signs");

        // An unknown start becomes a fresh `a` with `-a <= x_0 <= a`.
        let (start, upper_starts, lower_starts, magnitude_starts) = match initial {
            Some(value) => {
                let starts = distinct_polys([value.clone(), -&value, Poly::zero()]);
                let magnitudes = distinct_polys([value.clone(), -&value]);
                (StartRange::exact(value), starts.clone(), starts, magnitudes)
            }
            None => {
                let ceiling = Poly::var(self.fresh.next_positive());
                let floor = -&ceiling;
                let range = StartRange {
                    floor: floor.clone(),
                    ceiling: ceiling.clone(),
                };
                (range, vec![ceiling.clone()], vec![floor], vec![ceiling])
            }
        };

        let coefficients: BTreeSet<Rational> = steps
            .iter()
            .map(|step| step.coefficient.abs())
            .chain(std::iter::once(Rational::zero()))
            .collect();
        let forcing_uppers: Vec<Expr> = steps.iter().map(|step| step.upper.clone()).collect();
        let forcing_lowers: Vec<Expr> = steps.iter().map(|step| step.lower.clone()).collect();
        let upper_forcings = self.forcings(&forcing_uppers, Side::Upper)?;
        let lower_forcings = self.forcings(&forcing_lowers, Side::Lower)?;

        let mut upper_candidates = self.candidates(&coefficients, &upper_forcings, &upper_starts)?;
        let mut lower_candidates = self.candidates(&coefficients, &lower_forcings, &lower_starts)?;
        let flips = steps.iter().any(Step::flips_sign);
        if flips {
            // |x_n| <= m(n) with m driven by the larger of U_i and -L_i.
            let reaches: Vec<Expr> = forcing_uppers
                .iter()
                .cloned()
                .chain(forcing_lowers.iter().map(|lower| -lower))
                .collect();
            let magnitude_forcings = self.forcings(&reaches, Side::Upper)?;
            let magnitudes =
                self.candidates(&coefficients, &magnitude_forcings, &magnitude_starts)?;
            for magnitude in magnitudes {
                let mirrored = -&magnitude;
                if !lower_candidates.contains(&mirrored) {
                    lower_candidates.push(mirrored);
                }
                if !upper_candidates.contains(&magnitude) {
                    upper_candidates.push(magnitude);
                }
            }
        }

        let mut uppers: Vec<Candidate> =
            upper_candidates.into_iter().map(Candidate::inductive).collect();
        let mut lowers: Vec<Candidate> =
            lower_candidates.into_iter().map(Candidate::inductive).collect();
        if !maybe_pos {
            uppers.push(Candidate::zero_by_sign());
        }
        if !maybe_neg {
            lowers.push(Candidate::zero_by_sign());
        }
        let uppers = surviving_uppers(uppers, &start, &steps);
        let lowers = surviving_lowers(lowers, &start, &steps);
        debug!(%monomial, uppers = uppers.len(), lowers = lowers.len(), "inductive candidates");
        if uppers.is_empty() || lowers.is_empty() {
            return Err(TermwitError::Unsupported(
                ErrorInfo::new(
                    "no-inductive-bound",
                    "no bound candidate holds at every iteration",
                )
                .with_context("monomial", monomial.to_string()),
            ));
        }
        if !flips {
            let upper_exprs: Vec<Expr> = uppers.into_iter().map(|c| c.expr).collect();
            let lower_exprs: Vec<Expr> = lowers.into_iter().map(|c| c.expr).collect();
            return Ok(BoundPair {
                upper: self.oracle.dominated(&upper_exprs)?,
                lower: self.oracle.dominating(&lower_exprs)?,
            });
        }
        self.tightest_pair(monomial, &lowers, &uppers, &steps)
    }

    /// Narrowest pair, by eventual width, that also survives the
    /// sign-flipping branches.
    fn tightest_pair(
        &self,
        monomial: &Monomial,
        lowers: &[Candidate],
        uppers: &[Candidate],
        steps: &[Step],
    ) -> Result<BoundPair, TermwitError> {
        if lowers.len() * uppers.len() > self.config.max_candidates {
            return Err(budget(
                "bound-candidates",
                "too many bound candidates",
                self.config.max_candidates,
            ));
        }
        let mut pairs = Vec::new();
        for upper in uppers {
            for lower in lowers {
                if pair_holds(lower, upper, steps) {
                    pairs.push(BoundPair {
                        lower: lower.expr.clone(),
                        upper: upper.expr.clone(),
                    });
                }
            }
        }
        let widths: Vec<Expr> = pairs.iter().map(|pair| &pair.upper - &pair.lower).collect();
        if widths.is_empty() {
            return Err(TermwitError::Unsupported(
                ErrorInfo::new(
                    "no-inductive-bound",
                    "no bound pair survives the sign-flipping branches",
                )
                .with_context("monomial", monomial.to_string()),
            ));
        }
        let narrowest = self.oracle.dominated(&widths)?;
        let position = widths.iter().position(|width| *width == narrowest).unwrap_or(0);
        Ok(pairs.swap_remove(position))
    }

    /// Forcing terms to drive candidates with: each branch's own bound and,
    /// when one exists, a pointwise envelope of all of them.
    fn forcings(&self, bounds: &[Expr], side: Side) -> Result<Vec<Expr>, TermwitError> {
        let mut forcings = Vec::with_capacity(bounds.len() + 1);
        if let Some(envelope) = self.envelope(bounds, side)? {
            forcings.push(envelope);
        }
        for bound in bounds {
            if !forcings.contains(bound) {
                forcings.push(bound.clone());
            }
        }
        Ok(forcings)
    }

    /// Closed forms driven by every coefficient, forcing and start. Zero
    /// coefficients also contribute the steady `forcing(n - 1)`.
    fn candidates(
        &self,
        coefficients: &BTreeSet<Rational>,
        forcings: &[Expr],
        starts: &[Poly],
    ) -> Result<Vec<Expr>, TermwitError> {
        let count = (coefficients.len() * starts.len() + 1) * forcings.len();
        if count > self.config.max_candidates {
            return Err(budget(
                "bound-candidates",
                "too many bound candidates",
                self.config.max_candidates,
            ));
        }
        let mut candidates = Vec::with_capacity(count);
        for forcing in forcings {
            for coefficient in coefficients {
                if coefficient.is_zero() {
                    candidates.push(forcing.shift(-1));
                }
                for start in starts {
                    let candidate = solve_linear(coefficient, forcing, start)?;
                    trace!(%coefficient, %forcing, %start, %candidate, "bound candidate");
                    if !candidates.contains(&candidate) {
                        candidates.push(candidate);
                    }
                }
            }
        }
        Ok(candidates)
    }

    /// An expression that bounds every candidate pointwise from `side`.
    ///
    /// Prefers the eventually extremal candidate, then any candidate that
    /// dominates the rest at every `n`, then the eventual choice moved by
    /// the largest gap it leaves at small `n`. `None` when the gap cannot
    /// be computed.
    fn envelope(&self, candidates: &[Expr], side: Side) -> Result<Option<Expr>, TermwitError> {
        if candidates.is_empty() {
            return Ok(None);
        }
        // Lower envelopes are upper envelopes of the negated candidates.
        let oriented: Vec<Expr> = match side {
            Side::Upper => candidates.to_vec(),
            Side::Lower => candidates.iter().map(|candidate| -candidate).collect(),
        };
        let eventual = self.oracle.dominating(&oriented)?;
        let covers = |top: &Expr| {
            oriented
                .iter()
                .all(|other| always_nonnegative(&(top - other)))
        };
        let chosen = if covers(&eventual) {
            Some(eventual)
        } else if let Some(top) = oriented.iter().find(|top| covers(*top)) {
            Some(top.clone())
        } else {
            let mut lift = Rational::zero();
            let mut computable = true;
            for other in &oriented {
                match peak_on_naturals(&(other - &eventual)) {
                    Some(gap) => lift = lift.max(gap),
                    None => computable = false,
                }
            }
            computable.then(|| eventual + Expr::constant(lift))
        };
        trace!(?side, chosen = ?chosen.as_ref().map(ToString::to_string), "pointwise envelope");
        Ok(chosen.map(|expr| match side {
            Side::Upper => expr,
            Side::Lower => -expr,
        }))
    }

    /// Multiplies a bound pair by `rv^power` for every value `rv` can take.
    fn widen(&self, pair: BoundPair, rv: &Symbol, power: u32) -> Result<BoundPair, TermwitError> {
        let Some(dist) = self.model.distributions.get(rv) else {
            return Ok(pair);
        };
        let mut factors: BTreeSet<Rational> = BTreeSet::new();
        match dist.support() {
            Support::Finite(values) => {
                factors.extend(values.iter().map(|value| rational_power(value, power)));
            }
            Support::Interval(low, high) => {
                factors.insert(rational_power(&low, power));
                factors.insert(rational_power(&high, power));
                let zero = rational(0);
                if low < zero && high > zero && power % 2 == 0 {
                    factors.insert(zero);
                }
            }
            Support::Unbounded => {
                return Err(TermwitError::Unsupported(
                    ErrorInfo::new(
                        "unbounded-support",
                        "random variable has unbounded support",
                    )
                    .with_context("symbol", rv.to_string()),
                ))
            }
        }
        if factors.len() * 2 > self.config.max_candidates {
            return Err(budget(
                "bound-candidates",
                "too many bound candidates",
                self.config.max_candidates,
            ));
        }
        let mut candidates = Vec::with_capacity(factors.len() * 2);
        for factor in &factors {
            candidates.push(pair.lower.scale(factor));
            candidates.push(pair.upper.scale(factor));
        }
        let lower = self.envelope(&candidates, Side::Lower)?;
        let upper = self.envelope(&candidates, Side::Upper)?;
        match (lower, upper) {
            (Some(lower), Some(upper)) => Ok(BoundPair { lower, upper }),
            _ => Err(TermwitError::Unsupported(
                ErrorInfo::new(
                    "no-pointwise-envelope",
                    "scaled bounds have no envelope valid at every iteration",
                )
                .with_context("symbol", rv.to_string()),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Lower,
    Upper,
}

/// Whether the trajectory can turn positive or negative. A sign-flipping
/// coefficient carries either possibility over to the other sign.
fn trajectory_signs(initial: Option<&Poly>, steps: &[Step]) -> (bool, bool) {
    let (mut maybe_pos, mut maybe_neg) = match initial {
        Some(value) => possible_signs(&Expr::from(value)),
        None => (true, true),
    };
    maybe_pos |= steps.iter().any(|step| possible_signs(&step.upper).0);
    maybe_neg |= steps.iter().any(|step| possible_signs(&step.lower).1);
    if steps.iter().any(Step::flips_sign) {
        let either = maybe_pos || maybe_neg;
        maybe_pos = either;
        maybe_neg = either;
    }
    (maybe_pos, maybe_neg)
}

fn distinct_polys<const N: usize>(polys: [Poly; N]) -> Vec<Poly> {
    let mut distinct = Vec::with_capacity(N);
    for poly in polys {
        if !distinct.contains(&poly) {
            distinct.push(poly);
        }
    }
    distinct
}

fn rational_power(value: &Rational, power: u32) -> Rational {
    termwit_core::poly::rational_pow(value, i64::from(power))
}

/// Routes a monomial's bounds through its coefficient: a coefficient that is
/// never negative keeps the orientation, one that is never positive swaps it.
fn route(
    coeff: &Expr,
    pair: &BoundPair,
    monomial: &Monomial,
) -> Result<(Expr, Expr), TermwitError> {
    if pair.is_exact() {
        let value = coeff * &pair.lower;
        return Ok((value.clone(), value));
    }
    match possible_signs(coeff) {
        (_, false) => Ok((coeff * &pair.lower, coeff * &pair.upper)),
        (false, true) => Ok((coeff * &pair.upper, coeff * &pair.lower)),
        (true, true) => Err(TermwitError::Unsupported(
            ErrorInfo::new(
                "unsigned-coefficient",
                "coefficient of a bounded monomial has no provable sign",
            )
            .with_context("monomial", monomial.to_string())
            .with_context("coefficient", coeff.to_string()),
        )),
    }
}
