//! Closed-form solutions of first-order linear recurrences
//! `x_{n+1} = c * x_n + F(n)` with an exponential-polynomial `F`.

use num_bigint::BigInt;
use num_integer::binomial;
use num_traits::{One, Signed, Zero};
use termwit_core::errors::{ErrorInfo, TermwitError};
use termwit_core::{Expr, Monomial, Poly, Rational, Symbol};

fn choose(l: usize, i: usize) -> Rational {
    Rational::from_integer(binomial(BigInt::from(l), BigInt::from(i)))
}

fn indicator(hit: bool) -> Rational {
    if hit {
        Rational::one()
    } else {
        Rational::zero()
    }
}

/// Coefficients `q_0..=q_j` of `Q` with `b*Q(n+1) - c*Q(n) = n^j`, `b != c`.
fn shifted_coefficients(c: &Rational, b: &Rational, j: usize) -> Vec<Rational> {
    let mut q = vec![Rational::zero(); j + 1];
    let gap = b - c;
    for i in (0..=j).rev() {
        let higher: Rational = (i + 1..=j).map(|l| &q[l] * choose(l, i)).sum();
        q[i] = (indicator(i == j) - b * higher) / &gap;
    }
    q
}

/// Coefficients `q_0..=q_{j+1}` of `Q` with `b*(Q(n+1) - Q(n)) = n^j` and
/// `q_0 = 0`.
fn resonant_coefficients(b: &Rational, j: usize) -> Vec<Rational> {
    let mut q = vec![Rational::zero(); j + 2];
    for i in (0..=j).rev() {
        let higher: Rational = (i + 2..=j + 1).map(|l| &q[l] * choose(l, i)).sum();
        q[i + 1] = (indicator(i == j) / b - higher) / Rational::from_integer(BigInt::from(i + 1));
    }
    q
}

/// Particular solution of `P(n+1) = c*P(n) + n^j * b^n`.
fn particular_term(c: &Rational, b: &Rational, j: usize) -> Result<Expr, TermwitError> {
    let q = if b == c {
        resonant_coefficients(b, j)
    } else {
        shifted_coefficients(c, b, j)
    };
    let iter = Symbol::iteration();
    let poly = Poly::from_terms(
        q.into_iter()
            .enumerate()
            .map(|(power, coeff)| (Monomial::var_pow(iter.clone(), power as u32), coeff)),
    );
    Ok(&Expr::from(poly) * &Expr::exponential(b.clone())?)
}

/// A particular solution of `P(n+1) = c*P(n) + F(n)` for `c > 0`.
pub fn particular_solution(coefficient: &Rational, forcing: &Expr) -> Result<Expr, TermwitError> {
    let iter = Symbol::iteration();
    let mut solution = Expr::zero();
    for (base, poly) in forcing.parts() {
        let coeffs = poly.coeffs_in(&iter);
        let degree = coeffs.len() - 1;
        for (idx, coeff) in coeffs.into_iter().enumerate() {
            if coeff.is_zero() {
                continue;
            }
            let term = particular_term(coefficient, base, degree - idx)?;
            solution = solution + &Expr::from(coeff) * &term;
        }
    }
    Ok(solution)
}

/// Solves `x_{n+1} = coefficient * x_n + forcing(n)` with `x_0 = start`.
///
/// A zero coefficient has no exponential-polynomial solution through an
/// arbitrary start; the result is `forcing(n - 1)` moved by the constant
/// `start - forcing(-1)`, which equals `start` at `n = 0` and trails the
/// recurrence by that constant afterwards. Negative coefficients are
/// rejected; callers bound them through their magnitude.
pub fn solve_linear(
    coefficient: &Rational,
    forcing: &Expr,
    start: &Poly,
) -> Result<Expr, TermwitError> {
    if coefficient.is_negative() {
        return Err(TermwitError::Unsupported(
            ErrorInfo::new(
                "negative-coefficient",
                "recurrences with negative coefficients oscillate and are not bounded",
            )
            .with_context("coefficient", coefficient.to_string()),
        ));
    }
    if coefficient.is_zero() {
        let offset = start - &forcing.at_iteration(-1);
        return Ok(forcing.shift(-1) + Expr::from(offset));
    }
    let particular = particular_solution(coefficient, forcing)?;
    let amplitude = start - &particular.at_iteration(0);
    let homogeneous = &Expr::from(amplitude) * &Expr::exponential(coefficient.clone())?;
    Ok(homogeneous + particular)
}
