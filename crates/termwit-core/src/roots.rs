//! Exact real-root reasoning for univariate rational polynomials.
//!
//! Coefficient slices are dense and ordered from the highest degree down,
//! matching [`crate::poly::Poly::univariate_coeffs`].

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::errors::{ErrorInfo, TermwitError};
use crate::poly::{rational, Rational};

/// Number of bisection steps after which isolation gives up on a root.
const MAX_BISECTIONS: usize = 1 << 16;

fn trim(coeffs: &[Rational]) -> Vec<Rational> {
    let start = coeffs
        .iter()
        .position(|coeff| !coeff.is_zero())
        .unwrap_or(coeffs.len());
    coeffs[start..].to_vec()
}

/// Degree after dropping leading zeros; `None` for the zero polynomial.
pub fn degree(coeffs: &[Rational]) -> Option<usize> {
    let trimmed = trim(coeffs);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.len() - 1)
    }
}

/// Horner evaluation.
pub fn eval(coeffs: &[Rational], x: &Rational) -> Rational {
    coeffs
        .iter()
        .fold(Rational::zero(), |acc, coeff| acc * x + coeff)
}

fn derivative(coeffs: &[Rational]) -> Vec<Rational> {
    let degree = coeffs.len().saturating_sub(1);
    coeffs
        .iter()
        .take(degree)
        .enumerate()
        .map(|(idx, coeff)| coeff * rational((degree - idx) as i64))
        .collect()
}

/// Polynomial long division over Q, returning `(quotient, remainder)`.
fn div_rem(num: &[Rational], den: &[Rational]) -> (Vec<Rational>, Vec<Rational>) {
    let den = trim(den);
    let mut rem = trim(num);
    if den.is_empty() || rem.len() < den.len() {
        return (Vec::new(), rem);
    }
    let mut quotient = vec![Rational::zero(); rem.len() - den.len() + 1];
    while !rem.is_empty() && rem.len() >= den.len() {
        let factor = &rem[0] / &den[0];
        let shift = rem.len() - den.len();
        let qlen = quotient.len();
        quotient[qlen - 1 - shift] = factor.clone();
        for (idx, coeff) in den.iter().enumerate() {
            rem[idx] -= coeff * &factor;
        }
        rem = trim(&rem);
    }
    (quotient, rem)
}

fn gcd(lhs: &[Rational], rhs: &[Rational]) -> Vec<Rational> {
    let mut a = trim(lhs);
    let mut b = trim(rhs);
    while !b.is_empty() {
        let (_, rem) = div_rem(&a, &b);
        a = b;
        b = rem;
    }
    if let Some(lead) = a.first().cloned() {
        for coeff in &mut a {
            *coeff /= &lead;
        }
    }
    a
}

/// Divides out repeated factors so every real root is simple.
fn square_free(coeffs: &[Rational]) -> Vec<Rational> {
    let p = trim(coeffs);
    if p.len() <= 2 {
        return p;
    }
    let g = gcd(&p, &derivative(&p));
    if g.len() <= 1 {
        return p;
    }
    div_rem(&p, &g).0
}

fn sturm_sequence(coeffs: &[Rational]) -> Vec<Vec<Rational>> {
    let mut sequence = vec![trim(coeffs)];
    let first_derivative = trim(&derivative(&sequence[0]));
    if first_derivative.is_empty() {
        return sequence;
    }
    sequence.push(first_derivative);
    loop {
        let len = sequence.len();
        let (_, rem) = div_rem(&sequence[len - 2], &sequence[len - 1]);
        if rem.is_empty() {
            break;
        }
        sequence.push(rem.into_iter().map(|coeff| -coeff).collect());
    }
    sequence
}

fn count_sign_changes(signs: impl Iterator<Item = i8>) -> usize {
    let mut changes = 0;
    let mut previous = 0i8;
    for sign in signs.filter(|sign| *sign != 0) {
        if previous != 0 && sign != previous {
            changes += 1;
        }
        previous = sign;
    }
    changes
}

fn sign_of(value: &Rational) -> i8 {
    if value.is_positive() {
        1
    } else if value.is_negative() {
        -1
    } else {
        0
    }
}

fn changes_at(sequence: &[Vec<Rational>], x: &Rational) -> usize {
    count_sign_changes(sequence.iter().map(|poly| sign_of(&eval(poly, x))))
}

fn changes_at_infinity(sequence: &[Vec<Rational>], positive: bool) -> usize {
    count_sign_changes(sequence.iter().map(|poly| {
        let lead = sign_of(&poly[0]);
        let degree = poly.len() - 1;
        if positive || degree % 2 == 0 {
            lead
        } else {
            -lead
        }
    }))
}

fn check_degree(coeffs: &[Rational], max_degree: u32) -> Result<(), TermwitError> {
    let degree = degree(coeffs).unwrap_or(0);
    if degree > max_degree as usize {
        return Err(TermwitError::Budget(
            ErrorInfo::new("root-degree", "polynomial degree exceeds the root-finding budget")
                .with_context("degree", degree.to_string())
                .with_context("max_degree", max_degree.to_string()),
        ));
    }
    Ok(())
}

/// Counts the distinct real roots. The zero polynomial is rejected.
pub fn count_real_roots(coeffs: &[Rational], max_degree: u32) -> Result<usize, TermwitError> {
    check_degree(coeffs, max_degree)?;
    let p = square_free(coeffs);
    if p.is_empty() {
        return Err(TermwitError::Input(ErrorInfo::new(
            "zero-polynomial",
            "the zero polynomial has infinitely many roots",
        )));
    }
    let sequence = sturm_sequence(&p);
    Ok(changes_at_infinity(&sequence, false) - changes_at_infinity(&sequence, true))
}

/// Cauchy bound: every real root lies in `(-bound, bound)`.
fn root_bound(coeffs: &[Rational]) -> Rational {
    let lead = coeffs[0].abs();
    let max_ratio = coeffs
        .iter()
        .skip(1)
        .map(|coeff| coeff.abs() / &lead)
        .fold(Rational::zero(), |acc, value| if value > acc { value } else { acc });
    max_ratio + Rational::one()
}

/// Exact isolating interval `[lo, hi]` of one real root. Both ends
/// coincide when the root was hit exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootInterval {
    /// Lower end.
    pub lo: Rational,
    /// Upper end.
    pub hi: Rational,
}

impl RootInterval {
    /// Midpoint as an `f64`, for display.
    pub fn approximate(&self) -> f64 {
        ((&self.lo + &self.hi) / rational(2))
            .to_f64()
            .unwrap_or(f64::NAN)
    }
}

/// Isolates every distinct real root in an interval narrower than
/// `tolerance` (capped at 1), in increasing order.
pub fn isolate_roots(
    coeffs: &[Rational],
    max_degree: u32,
    tolerance: f64,
) -> Result<Vec<RootInterval>, TermwitError> {
    check_degree(coeffs, max_degree)?;
    let p = square_free(coeffs);
    if p.len() <= 1 {
        return Ok(Vec::new());
    }
    let tolerance = Rational::from_float(tolerance.abs().clamp(f64::EPSILON, 1.0))
        .unwrap_or_else(|| Rational::new(BigInt::one(), BigInt::from(1_000_000_000u64)));
    let sequence = sturm_sequence(&p);
    let bound = root_bound(&p);
    let lower = -bound.clone();
    let mut pending = vec![(
        lower.clone(),
        bound.clone(),
        changes_at(&sequence, &lower),
        changes_at(&sequence, &bound),
    )];
    let mut roots = Vec::new();
    let mut steps = 0usize;
    while let Some((lo, hi, v_lo, v_hi)) = pending.pop() {
        let count = v_lo.saturating_sub(v_hi);
        if count == 0 {
            continue;
        }
        steps += 1;
        if steps > MAX_BISECTIONS {
            return Err(TermwitError::Budget(ErrorInfo::new(
                "root-bisection",
                "root isolation did not converge within the bisection budget",
            )));
        }
        if count == 1 {
            if eval(&p, &hi).is_zero() {
                roots.push(RootInterval {
                    lo: hi.clone(),
                    hi,
                });
                continue;
            }
            if &hi - &lo < tolerance {
                roots.push(RootInterval { lo, hi });
                continue;
            }
        }
        let mid = (&lo + &hi) / rational(2);
        let v_mid = changes_at(&sequence, &mid);
        pending.push((lo, mid.clone(), v_lo, v_mid));
        pending.push((mid, hi, v_mid, v_hi));
    }
    roots.sort_by(|lhs, rhs| lhs.lo.cmp(&rhs.lo));
    Ok(roots)
}

/// Every distinct real root as an `f64` approximation within `tolerance`,
/// increasing.
pub fn real_roots(
    coeffs: &[Rational],
    max_degree: u32,
    tolerance: f64,
) -> Result<Vec<f64>, TermwitError> {
    Ok(isolate_roots(coeffs, max_degree, tolerance)?
        .iter()
        .map(RootInterval::approximate)
        .collect())
}

/// Sorted, de-duplicated non-negative integers at which the sign of a
/// polynomial over the naturals can first change: `0` plus `floor(r)` and
/// `floor(r) + 1` for every real root `r`. Every integer between
/// `floor(lo)` and `floor(hi) + 1` of an isolating interval is included.
pub fn sign_change_candidates(roots: &[RootInterval]) -> Vec<BigInt> {
    let mut candidates = vec![BigInt::zero()];
    for root in roots {
        let mut value = root.lo.floor().to_integer().max(BigInt::zero());
        let high = root.hi.floor().to_integer() + 1;
        while value <= high {
            candidates.push(value.clone());
            value += 1;
        }
    }
    candidates.sort_unstable();
    candidates.dedup();
    candidates
}

/// Whether the polynomial takes a positive and/or a negative value at some
/// non-negative integer.
pub fn integer_sign_profile(
    coeffs: &[Rational],
    max_degree: u32,
    tolerance: f64,
) -> Result<(bool, bool), TermwitError> {
    let roots = isolate_roots(coeffs, max_degree, tolerance)?;
    let mut maybe_positive = false;
    let mut maybe_negative = false;
    for candidate in sign_change_candidates(&roots) {
        let value = eval(coeffs, &Rational::from_integer(candidate));
        maybe_positive |= value.is_positive();
        maybe_negative |= value.is_negative();
    }
    Ok((maybe_positive, maybe_negative))
}
