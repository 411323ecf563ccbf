//! Inductive checks that a bound pair encloses every trajectory of a
//! branching recurrence `x_{n+1} = c_i * x_n + f_i(n)`.
//!
//! A pair `(l, u)` is accepted when it encloses `x_0` and every branch maps
//! the box `[l(n), u(n)]` into `[l(n+1), u(n+1)]` for all `n >= 0`, given
//! `L_i(n) <= f_i(n) <= U_i(n)`. Each obligation is an exponential
//! polynomial that must be provably non-negative on the naturals.

use num_traits::Signed;
use termwit_core::{always_nonnegative, Expr, Poly, Rational};
use tracing::trace;

/// One branch of a recurrence with the bounds of its inhomogeneous part.
#[derive(Debug, Clone)]
pub(crate) struct Step {
    pub coefficient: Rational,
    pub lower: Expr,
    pub upper: Expr,
}

impl Step {
    pub fn flips_sign(&self) -> bool {
        self.coefficient.is_negative()
    }

    /// `u(n+1) >= c * x + U(n)` for every `x` in `[l(n), u(n)]`.
    pub fn keeps_upper(&self, upper: &Expr, lower: &Expr) -> bool {
        let worst = if self.flips_sign() { lower } else { upper };
        let slack = &upper.shift(1) - &(&worst.scale(&self.coefficient) + &self.upper);
        let holds = always_nonnegative(&slack);
        trace!(coefficient = %self.coefficient, %upper, %slack, holds, "upper step");
        holds
    }

    /// `l(n+1) <= c * x + L(n)` for every `x` in `[l(n), u(n)]`.
    pub fn keeps_lower(&self, lower: &Expr, upper: &Expr) -> bool {
        let worst = if self.flips_sign() { upper } else { lower };
        let slack = &(&worst.scale(&self.coefficient) + &self.lower) - &lower.shift(1);
        let holds = always_nonnegative(&slack);
        trace!(coefficient = %self.coefficient, %lower, %slack, holds, "lower step");
        holds
    }
}

/// Where the first iterate may lie: `floor <= x_0 <= ceiling`.
#[derive(Debug, Clone)]
pub(crate) struct StartRange {
    pub floor: Poly,
    pub ceiling: Poly,
}

impl StartRange {
    pub fn exact(value: Poly) -> Self {
        Self {
            floor: value.clone(),
            ceiling: value,
        }
    }

    pub fn below(&self, upper: &Expr) -> bool {
        always_nonnegative(&Expr::from(&upper.at_iteration(0) - &self.ceiling))
    }

    pub fn above(&self, lower: &Expr) -> bool {
        always_nonnegative(&Expr::from(&self.floor - &lower.at_iteration(0)))
    }
}

/// Bound candidate; `by_sign` marks a zero bound justified by the sign of
/// the whole trajectory rather than by induction.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub expr: Expr,
    pub by_sign: bool,
}

impl Candidate {
    pub fn inductive(expr: Expr) -> Self {
        Self {
            expr,
            by_sign: false,
        }
    }

    pub fn zero_by_sign() -> Self {
        Self {
            expr: Expr::zero(),
            by_sign: true,
        }
    }
}

/// Upper candidates that enclose the start and survive every branch that
/// keeps the sign of `x`; sign-flipping branches need the partner bound and
/// are left to [`pair_holds`].
pub(crate) fn surviving_uppers(
    candidates: Vec<Candidate>,
    start: &StartRange,
    steps: &[Step],
) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|candidate| {
            candidate.by_sign
                || (start.below(&candidate.expr)
                    && steps
                        .iter()
                        .filter(|step| !step.flips_sign())
                        .all(|step| step.keeps_upper(&candidate.expr, &candidate.expr)))
        })
        .collect()
}

/// Lower counterpart of [`surviving_uppers`].
pub(crate) fn surviving_lowers(
    candidates: Vec<Candidate>,
    start: &StartRange,
    steps: &[Step],
) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|candidate| {
            candidate.by_sign
                || (start.above(&candidate.expr)
                    && steps
                        .iter()
                        .filter(|step| !step.flips_sign())
                        .all(|step| step.keeps_lower(&candidate.expr, &candidate.expr)))
        })
        .collect()
}

/// Checks the sign-flipping branches, which couple the two bounds.
pub(crate) fn pair_holds(lower: &Candidate, upper: &Candidate, steps: &[Step]) -> bool {
    steps.iter().filter(|step| step.flips_sign()).all(|step| {
        (upper.by_sign || step.keeps_upper(&upper.expr, &lower.expr))
            && (lower.by_sign || step.keeps_lower(&lower.expr, &upper.expr))
    })
}
