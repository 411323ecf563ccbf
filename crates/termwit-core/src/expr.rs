//! Exponential polynomials in the iteration variable.
//!
//! An [`Expr`] is a finite sum `Σ_b p_b · b^n` where every base `b` is a
//! positive rational and every `p_b` is a [`Poly`] that may mention `n` and
//! program parameters. Closed forms and synthesized bounds live here; a plain
//! polynomial is the part with base `1`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{ErrorInfo, TermwitError};
use crate::poly::{rational, rational_pow, Monomial, Poly, Rational};
use crate::symbol::{Domain, Symbol};

/// Dominant `(base, degree)` term of an expression together with its
/// coefficient over the remaining symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthTerm {
    /// Exponential base.
    pub base: Rational,
    /// Power of `n` multiplying the exponential.
    pub degree: u32,
    /// Coefficient, free of `n`.
    pub coeff: Poly,
}

/// Sum of polynomial multiples of positive exponentials in `n`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Expr {
    parts: BTreeMap<Rational, Poly>,
}

impl Expr {
    /// The zero expression.
    pub fn zero() -> Self {
        Self::default()
    }

    /// A constant expression.
    pub fn constant(value: Rational) -> Self {
        Self::from(Poly::constant(value))
    }

    /// `base^n` for a positive rational base.
    pub fn exponential(base: Rational) -> Result<Self, TermwitError> {
        if !base.is_positive() {
            return Err(TermwitError::Unsupported(
                ErrorInfo::new("non-positive-base", "exponential bases must be positive")
                    .with_context("base", base.to_string()),
            ));
        }
        Ok(Self::scaled_exponential(base, Poly::one()))
    }

    fn scaled_exponential(base: Rational, poly: Poly) -> Self {
        let mut parts = BTreeMap::new();
        if !poly.is_zero() {
            parts.insert(base, poly);
        }
        Self { parts }
    }

    fn add_part(&mut self, base: Rational, poly: Poly) {
        if poly.is_zero() {
            return;
        }
        let combined = match self.parts.remove(&base) {
            Some(existing) => existing + poly,
            None => poly,
        };
        if !combined.is_zero() {
            self.parts.insert(base, combined);
        }
    }

    /// Returns true for the zero expression.
    pub fn is_zero(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns true when no exponential other than `1^n` occurs.
    pub fn is_polynomial(&self) -> bool {
        self.parts.keys().all(|base| base.is_one())
    }

    /// Returns the polynomial view when [`Expr::is_polynomial`] holds.
    pub fn as_poly(&self) -> Option<Poly> {
        if !self.is_polynomial() {
            return None;
        }
        Some(self.parts.values().next().cloned().unwrap_or_default())
    }

    /// Iterates over `(base, polynomial)` parts in increasing base order.
    pub fn parts(&self) -> impl Iterator<Item = (&Rational, &Poly)> {
        self.parts.iter()
    }

    /// Symbols occurring in any part (the iteration variable included).
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        self.parts
            .values()
            .flat_map(|poly| poly.free_symbols())
            .collect()
    }

    /// Symbols other than the iteration variable.
    pub fn parameters(&self) -> BTreeSet<Symbol> {
        self.free_symbols()
            .into_iter()
            .filter(|sym| !sym.is_iteration())
            .collect()
    }

    /// Multiplies by a rational scalar.
    pub fn scale(&self, factor: &Rational) -> Expr {
        let mut result = Expr::zero();
        for (base, poly) in &self.parts {
            result.add_part(base.clone(), poly.scale(factor));
        }
        result
    }

    /// Raises the expression to a non-negative integer power.
    pub fn pow(&self, exp: u32) -> Expr {
        let mut result = Expr::from(Poly::one());
        for _ in 0..exp {
            result = &result * self;
        }
        result
    }

    /// Rewrites `n` to `n + offset`.
    pub fn shift(&self, offset: i64) -> Expr {
        let iter = Symbol::iteration();
        let shifted = Poly::var(iter.clone()) + Poly::integer(offset);
        let mut result = Expr::zero();
        for (base, poly) in &self.parts {
            let factor = rational_pow(base, offset);
            result.add_part(base.clone(), poly.subs(&iter, &shifted).scale(&factor));
        }
        result
    }

    /// Simultaneously substitutes expressions for symbols. Substituting for
    /// the iteration variable is not supported and leaves it untouched.
    pub fn subs_all(&self, replacements: &BTreeMap<Symbol, Expr>) -> Expr {
        let mut result = Expr::zero();
        for (base, poly) in &self.parts {
            let exponential = Expr::scaled_exponential(base.clone(), Poly::one());
            for (monomial, coeff) in poly.terms() {
                let mut product = Expr::constant(coeff.clone());
                let mut kept = Vec::new();
                for (sym, power) in monomial.powers() {
                    match replacements.get(sym) {
                        Some(replacement) if !sym.is_iteration() => {
                            product = &product * &replacement.pow(power);
                        }
                        _ => kept.push((sym.clone(), power)),
                    }
                }
                let rest = Expr::from(Poly::term(Rational::one(), Monomial::from_powers(kept)));
                result = result + &(&product * &rest) * &exponential;
            }
        }
        result
    }

    /// Re-tags parameter symbols with the domains named in `domains`.
    pub fn assign_domains(&self, domains: &BTreeMap<String, Domain>) -> Expr {
        let mut result = Expr::zero();
        for (base, poly) in &self.parts {
            result.add_part(base.clone(), poly.assign_domains(domains));
        }
        result
    }

    /// Value at a fixed iteration `k`, as a polynomial in the parameters.
    pub fn at_iteration(&self, k: i64) -> Poly {
        let iter = Symbol::iteration();
        let point = Poly::integer(k);
        let mut total = Poly::zero();
        for (base, poly) in &self.parts {
            total = total + poly.subs(&iter, &point).scale(&rational_pow(base, k));
        }
        total
    }

    /// Evaluates at iteration `n` with the given parameter values.
    pub fn eval(&self, n: u64, values: &BTreeMap<Symbol, Rational>) -> Option<Rational> {
        let mut assignment = values.clone();
        let n_value = rational(i64::try_from(n).ok()?);
        assignment.insert(Symbol::iteration(), n_value);
        let mut total = Rational::zero();
        for (base, poly) in &self.parts {
            let exp = i64::try_from(n).ok()?;
            total += poly.eval(&assignment)? * rational_pow(base, exp);
        }
        Some(total)
    }

    /// All `(base, degree, coefficient)` triples with a non-zero coefficient,
    /// ordered from the eventually dominant term downwards.
    pub fn growth_terms(&self) -> Vec<GrowthTerm> {
        let iter = Symbol::iteration();
        let mut terms = Vec::new();
        for (base, poly) in self.parts.iter().rev() {
            let coeffs = poly.coeffs_in(&iter);
            let degree = coeffs.len() - 1;
            for (idx, coeff) in coeffs.into_iter().enumerate() {
                if coeff.is_zero() {
                    continue;
                }
                terms.push(GrowthTerm {
                    base: base.clone(),
                    degree: (degree - idx) as u32,
                    coeff,
                });
            }
        }
        terms
    }

    /// The eventually dominant term, or `None` for zero.
    pub fn dominant_term(&self) -> Option<GrowthTerm> {
        self.growth_terms().into_iter().next()
    }

    /// Coefficient of `n^0 · 1^n`, the part that does not grow with `n`.
    pub fn constant_term(&self) -> Poly {
        let iter = Symbol::iteration();
        self.parts
            .get(&Rational::one())
            .map(|poly| {
                poly.coeffs_in(&iter)
                    .pop()
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

fn format_base(base: &Rational) -> String {
    if base.is_integer() {
        base.to_string()
    } else {
        format!("({base})")
    }
}

fn format_part(base: &Rational, poly: &Poly, parenthesize: bool) -> String {
    if base.is_one() {
        return if parenthesize && poly.num_terms() > 1 {
            format!("({poly})")
        } else {
            poly.to_string()
        };
    }
    let power = format!("{}^n", format_base(base));
    match poly.constant_value() {
        Some(value) if value.is_one() => power,
        Some(value) if (-&value).is_one() => format!("-{power}"),
        Some(value) => format!("{value}*{power}"),
        None => format!("({poly})*{power}"),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            return f.write_str("0");
        }
        let parenthesize = self.parts.len() > 1;
        for (idx, (base, poly)) in self.parts.iter().rev().enumerate() {
            let part = format_part(base, poly, parenthesize);
            match (idx, part.strip_prefix('-')) {
                (0, _) => f.write_str(&part)?,
                (_, Some(rest)) => write!(f, " - {rest}")?,
                (_, None) => write!(f, " + {part}")?,
            }
        }
        Ok(())
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = crate::parse::deserialize_text(deserializer)?;
        crate::parse::parse_expr(&text).map_err(serde::de::Error::custom)
    }
}

impl From<Poly> for Expr {
    fn from(poly: Poly) -> Self {
        Expr::scaled_exponential(Rational::one(), poly)
    }
}

impl From<&Poly> for Expr {
    fn from(poly: &Poly) -> Self {
        Expr::from(poly.clone())
    }
}

impl Add<&Expr> for &Expr {
    type Output = Expr;

    fn add(self, rhs: &Expr) -> Expr {
        let mut result = self.clone();
        for (base, poly) in &rhs.parts {
            result.add_part(base.clone(), poly.clone());
        }
        result
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        &self + &rhs
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        self.scale(&-Rational::one())
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        -&self
    }
}

impl Sub<&Expr> for &Expr {
    type Output = Expr;

    fn sub(self, rhs: &Expr) -> Expr {
        self + &(-rhs)
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        &self - &rhs
    }
}

impl Mul<&Expr> for &Expr {
    type Output = Expr;

    fn mul(self, rhs: &Expr) -> Expr {
        let mut result = Expr::zero();
        for (lhs_base, lhs_poly) in &self.parts {
            for (rhs_base, rhs_poly) in &rhs.parts {
                result.add_part(lhs_base * rhs_base, lhs_poly * rhs_poly);
            }
        }
        result
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        &self * &rhs
    }
}
