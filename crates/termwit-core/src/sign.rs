//! Sign and real-zero reasoning over symbolic polynomials.
//!
//! Every query answers `Some(_)` only when the answer is provable; unknown
//! results are propagated as `None` and never defaulted either way.

use std::collections::BTreeMap;

use num_traits::{One, Signed, Zero};
use tracing::trace;

use crate::errors::{ErrorInfo, TermwitError};
use crate::expr::Expr;
use crate::poly::{rational, rational_pow, Monomial, Poly, Rational};
use crate::roots;
use crate::symbol::Symbol;

/// Highest degree for which symbolic (non-numeric) coefficients are examined.
pub const MAX_SYMBOLIC_ROOT_DEGREE: u32 = 4;

/// Highest degree handed to exact Sturm counting inside sign queries.
pub const MAX_NUMERIC_ROOT_DEGREE: u32 = 64;

/// Tolerance used when sign queries need approximate root positions.
const SIGN_ROOT_TOLERANCE: f64 = 1e-9;

/// Iterations scanned while looking for the point past which an exponential
/// polynomial is ruled by its dominant term.
const NATURAL_SCAN_LIMIT: i64 = 1024;

/// Sign derivable from symbol domains alone: `Some(true)` when every term is
/// non-negative and one is strictly positive, `Some(false)` symmetrically.
pub fn syntactic_sign(poly: &Poly) -> Option<bool> {
    if poly.is_zero() {
        return None;
    }
    let mut all_nonnegative = true;
    let mut all_nonpositive = true;
    let mut some_positive = false;
    let mut some_negative = false;
    for (monomial, coeff) in poly.terms() {
        if !monomial.is_nonnegative() {
            return None;
        }
        if coeff.is_positive() {
            all_nonpositive = false;
            some_positive |= monomial.is_positive();
        } else {
            all_nonnegative = false;
            some_negative |= monomial.is_positive();
        }
    }
    if all_nonnegative && some_positive {
        Some(true)
    } else if all_nonpositive && some_negative {
        Some(false)
    } else {
        None
    }
}

fn is_provably_nonzero(poly: &Poly) -> bool {
    match poly.constant_value() {
        Some(value) => !value.is_zero(),
        None => syntactic_sign(poly).is_some(),
    }
}

/// Whether `poly`, read as a polynomial in `sym`, has a real zero.
///
/// Definite for rational univariate polynomials (exact Sturm counting) and for
/// symbolic coefficients when the roots resolve: odd degree with a provably
/// non-zero leading coefficient always has one; a quadratic decides through the
/// sign of its discriminant. Anything else is `None`.
pub fn has_real_zero(poly: &Poly, sym: &Symbol) -> Option<bool> {
    if poly.is_zero() {
        return Some(true);
    }
    let degree = poly.degree_in(sym);
    if degree == 0 {
        return match poly.constant_value() {
            Some(_) => Some(false),
            None => None,
        };
    }
    if let Some(coeffs) = poly.univariate_coeffs(sym) {
        return roots::count_real_roots(&coeffs, MAX_NUMERIC_ROOT_DEGREE)
            .ok()
            .map(|count| count > 0);
    }
    if degree > MAX_SYMBOLIC_ROOT_DEGREE {
        return None;
    }
    let coeffs = poly.coeffs_in(sym);
    if !is_provably_nonzero(&coeffs[0]) {
        return None;
    }
    if degree % 2 == 1 {
        return Some(true);
    }
    if degree == 2 {
        let (a, b, c) = (&coeffs[0], &coeffs[1], &coeffs[2]);
        let discriminant = &(b * b) - &(a * c).scale(&rational(4));
        if discriminant.is_zero() {
            return Some(true);
        }
        return match syntactic_sign(&discriminant) {
            Some(true) => Some(true),
            Some(false) => Some(false),
            None => None,
        };
    }
    None
}

/// Tries every free symbol and returns the first definite answer.
pub fn has_real_zero_for_any(poly: &Poly) -> Option<bool> {
    for sym in poly.free_symbols() {
        if let Some(answer) = has_real_zero(poly, &sym) {
            trace!(%poly, %sym, answer, "real zero query resolved");
            return Some(answer);
        }
    }
    None
}

/// Global sign of a polynomial: `Some(true)` when always positive,
/// `Some(false)` when always negative, `None` when mixed or unknown.
pub fn get_sign(poly: &Poly) -> Option<bool> {
    let sign = checked_sign(poly);
    debug_assert!(sign.is_ok(), "{sign:?}");
    sign.ok().flatten()
}

/// [`get_sign`] that reports an inconsistent zero analysis as an internal
/// error instead of folding it into "unknown".
pub fn checked_sign(poly: &Poly) -> Result<Option<bool>, TermwitError> {
    if let Some(value) = poly.constant_value() {
        if value.is_zero() {
            return Ok(None);
        }
        return Ok(Some(value.is_positive()));
    }
    if let Some(sign) = syntactic_sign(poly) {
        return Ok(Some(sign));
    }
    if has_real_zero_for_any(poly) != Some(false) {
        return Ok(None);
    }
    // A zero-free polynomial keeps one sign over the admissible region, so
    // any admissible point decides.
    let Some(value) = poly.eval(&reference_point(poly)) else {
        return Ok(None);
    };
    if value.is_zero() {
        return Err(TermwitError::Internal(
            ErrorInfo::new(
                "zero-free-vanished",
                "zero-free polynomial vanished at its reference point",
            )
            .with_context("poly", poly.to_string()),
        ));
    }
    Ok(Some(value.is_positive()))
}

/// Admissible assignment used to read off the sign of a zero-free
/// polynomial: positive symbols at `1`, every other symbol at `0`.
fn reference_point(poly: &Poly) -> BTreeMap<Symbol, Rational> {
    poly.free_symbols()
        .into_iter()
        .map(|sym| {
            let value = if sym.is_positive() {
                Rational::one()
            } else {
                Rational::zero()
            };
            (sym, value)
        })
        .collect()
}

/// Conservative `(maybe_positive, maybe_negative)` over `n >= 0` and every
/// admissible parameter value.
pub fn possible_signs(expr: &Expr) -> (bool, bool) {
    if expr.is_zero() {
        return (false, false);
    }
    let mut all_nonnegative = true;
    let mut all_nonpositive = true;
    for (_, poly) in expr.parts() {
        for (monomial, coeff) in poly.terms() {
            if !monomial.is_nonnegative() {
                all_nonnegative = false;
                all_nonpositive = false;
            } else if coeff.is_positive() {
                all_nonpositive = false;
            } else {
                all_nonnegative = false;
            }
        }
    }
    if all_nonnegative {
        return (true, false);
    }
    if all_nonpositive {
        return (false, true);
    }
    if let Some(poly) = expr.as_poly() {
        let iter = Symbol::iteration();
        if !poly.contains(&iter) {
            return match get_sign(&poly) {
                Some(true) => (true, false),
                Some(false) => (false, true),
                None => (true, true),
            };
        }
        if let Some(coeffs) = poly.univariate_coeffs(&iter) {
            if let Ok(profile) =
                roots::integer_sign_profile(&coeffs, MAX_NUMERIC_ROOT_DEGREE, SIGN_ROOT_TOLERANCE)
            {
                return profile;
            }
        }
    }
    (true, true)
}

/// Whether `expr` is provably `>= 0` at every `n >= 0` and every admissible
/// parameter value.
///
/// Terms are grouped by their parameter monomial. Every monomial must be
/// non-negative and every group, now a plain exponential polynomial in `n`,
/// is checked exactly: iterations before its dominant term takes over are
/// evaluated one by one.
pub fn always_nonnegative(expr: &Expr) -> bool {
    if !possible_signs(expr).1 {
        return true;
    }
    let Some(groups) = parameter_groups(expr) else {
        return false;
    };
    groups
        .iter()
        .all(|(monomial, numeric)| monomial.is_nonnegative() && numeric_nonnegative(numeric))
}

/// A value `P >= 0` with `expr(n) <= P` for every `n >= 0`. Only defined for
/// parameter-free expressions that are eventually negative (or zero).
pub fn peak_on_naturals(expr: &Expr) -> Option<Rational> {
    if expr.is_zero() {
        return Some(Rational::zero());
    }
    if !expr.parameters().is_empty() {
        return None;
    }
    let threshold = positive_from(&-expr)?;
    let values = BTreeMap::new();
    let mut peak = Rational::zero();
    for n in 0..threshold {
        let value = expr.eval(n, &values)?;
        if value > peak {
            peak = value;
        }
    }
    Some(peak)
}

fn parameter_groups(expr: &Expr) -> Option<BTreeMap<Monomial, Expr>> {
    let iter = Symbol::iteration();
    let mut groups: BTreeMap<Monomial, Expr> = BTreeMap::new();
    for (base, poly) in expr.parts() {
        let exponential = Expr::exponential(base.clone()).ok()?;
        for (monomial, coeff) in poly.terms() {
            let in_n = Poly::term(
                coeff.clone(),
                Monomial::var_pow(iter.clone(), monomial.degree_in(&iter)),
            );
            let term = &Expr::from(in_n) * &exponential;
            let group = groups.entry(monomial.without(&iter)).or_default();
            *group = &*group + &term;
        }
    }
    Some(groups)
}

fn numeric_nonnegative(expr: &Expr) -> bool {
    if expr.is_zero() {
        return true;
    }
    let Some(threshold) = positive_from(expr) else {
        return false;
    };
    let values = BTreeMap::new();
    (0..threshold).all(|n| {
        expr.eval(n, &values)
            .is_some_and(|value| !value.is_negative())
    })
}

/// First `N` with `expr(n) > 0` for every `n >= N`, for a parameter-free
/// expression whose dominant coefficient is positive.
///
/// At `N` every lower term is at most `1 / (m + 1)` of the dominant one
/// (`m` lower terms) and its ratio to the dominant term is non-increasing
/// from there on.
fn positive_from(expr: &Expr) -> Option<u64> {
    let terms = expr
        .growth_terms()
        .into_iter()
        .map(|term| {
            let coeff = term.coeff.constant_value()?;
            Some((term.base, i64::from(term.degree), coeff))
        })
        .collect::<Option<Vec<_>>>()?;
    let ((lead_base, lead_degree, lead_coeff), rest) = terms.split_first()?;
    if !lead_coeff.is_positive() {
        return None;
    }
    if rest.is_empty() {
        return Some(u64::from(*lead_degree > 0));
    }
    let share = lead_coeff / rational(i64::try_from(rest.len()).ok()? + 1);
    let mut lead_power = lead_base.clone();
    let mut powers: Vec<Rational> = rest.iter().map(|(base, _, _)| base.clone()).collect();
    for n in 1..=NATURAL_SCAN_LIMIT {
        let point = rational(n);
        let next = rational(n + 1);
        let lead = &share * rational_pow(&point, *lead_degree) * &lead_power;
        let settled = rest.iter().zip(&powers).all(|((base, degree, coeff), power)| {
            let excess = degree - lead_degree;
            let shrinking = excess <= 0
                || rational_pow(&next, excess) * base <= rational_pow(&point, excess) * lead_base;
            shrinking && coeff.abs() * rational_pow(&point, *degree) * power <= lead
        });
        if settled {
            trace!(%expr, n, "dominant term settled");
            return u64::try_from(n).ok();
        }
        lead_power *= lead_base;
        for (power, (base, _, _)) in powers.iter_mut().zip(rest) {
            *power *= base;
        }
    }
    None
}
