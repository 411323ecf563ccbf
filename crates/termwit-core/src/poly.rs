//! Sparse multivariate polynomials over the rationals.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::symbol::{Domain, Symbol};

/// Exact rational scalar used throughout the engine.
pub type Rational = BigRational;

/// Builds a rational from an integer.
pub fn rational(value: i64) -> Rational {
    Rational::from_integer(BigInt::from(value))
}

/// Builds the rational `numer / denom`. `denom` must be non-zero.
pub fn ratio(numer: i64, denom: i64) -> Rational {
    Rational::new(BigInt::from(numer), BigInt::from(denom))
}

/// Raises a rational to an integer power (negative powers invert).
pub fn rational_pow(base: &Rational, exp: i64) -> Rational {
    let mut result = Rational::one();
    for _ in 0..exp.unsigned_abs() {
        result *= base;
    }
    if exp < 0 {
        result.recip()
    } else {
        result
    }
}

/// Product of symbol powers; the empty product is the unit monomial.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Monomial {
    powers: BTreeMap<Symbol, u32>,
}

impl Monomial {
    /// Returns the unit monomial `1`.
    pub fn one() -> Self {
        Self::default()
    }

    /// Returns `sym^power`.
    pub fn var_pow(sym: Symbol, power: u32) -> Self {
        let mut powers = BTreeMap::new();
        if power > 0 {
            powers.insert(sym, power);
        }
        Self { powers }
    }

    /// Builds a monomial from `(symbol, power)` pairs, merging repeats.
    pub fn from_powers(pairs: impl IntoIterator<Item = (Symbol, u32)>) -> Self {
        let mut powers = BTreeMap::new();
        for (sym, power) in pairs {
            if power > 0 {
                *powers.entry(sym).or_insert(0) += power;
            }
        }
        Self { powers }
    }

    /// Returns true for the unit monomial.
    pub fn is_one(&self) -> bool {
        self.powers.is_empty()
    }

    /// Iterates over `(symbol, power)` pairs in symbol order.
    pub fn powers(&self) -> impl Iterator<Item = (&Symbol, u32)> {
        self.powers.iter().map(|(sym, power)| (sym, *power))
    }

    /// Power of `sym` in the monomial.
    pub fn degree_in(&self, sym: &Symbol) -> u32 {
        self.powers.get(sym).copied().unwrap_or(0)
    }

    /// Sum of all exponents.
    pub fn total_degree(&self) -> u32 {
        self.powers.values().sum()
    }

    /// Returns the monomial with `sym` removed.
    pub fn without(&self, sym: &Symbol) -> Self {
        let mut powers = self.powers.clone();
        powers.remove(sym);
        Self { powers }
    }

    /// Returns the product of two monomials.
    pub fn mul(&self, other: &Monomial) -> Monomial {
        let mut powers = self.powers.clone();
        for (sym, power) in &other.powers {
            *powers.entry(sym.clone()).or_insert(0) += power;
        }
        Monomial { powers }
    }

    /// True when the monomial is `>= 0` for every admissible assignment.
    pub fn is_nonnegative(&self) -> bool {
        self.powers
            .iter()
            .all(|(sym, power)| power % 2 == 0 || sym.is_nonnegative())
    }

    /// True when the monomial is `> 0` for every admissible assignment.
    pub fn is_positive(&self) -> bool {
        self.powers.keys().all(Symbol::is_positive)
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.powers.is_empty() {
            return f.write_str("1");
        }
        for (idx, (sym, power)) in self.powers.iter().enumerate() {
            if idx > 0 {
                f.write_str("*")?;
            }
            if *power == 1 {
                write!(f, "{sym}")?;
            } else {
                write!(f, "{sym}^{power}")?;
            }
        }
        Ok(())
    }
}

/// Sparse polynomial: monomial to non-zero rational coefficient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Poly {
    terms: BTreeMap<Monomial, Rational>,
}

impl Poly {
    /// The zero polynomial.
    pub fn zero() -> Self {
        Self::default()
    }

    /// The constant polynomial `1`.
    pub fn one() -> Self {
        Self::constant(Rational::one())
    }

    /// A constant polynomial.
    pub fn constant(value: Rational) -> Self {
        Self::term(value, Monomial::one())
    }

    /// A constant polynomial from an integer.
    pub fn integer(value: i64) -> Self {
        Self::constant(rational(value))
    }

    /// The polynomial consisting of a single symbol.
    pub fn var(sym: Symbol) -> Self {
        Self::term(Rational::one(), Monomial::var_pow(sym, 1))
    }

    /// A single term `coeff * monomial`.
    pub fn term(coeff: Rational, monomial: Monomial) -> Self {
        let mut terms = BTreeMap::new();
        if !coeff.is_zero() {
            terms.insert(monomial, coeff);
        }
        Self { terms }
    }

    /// Builds a polynomial from terms, combining like monomials.
    pub fn from_terms(pairs: impl IntoIterator<Item = (Monomial, Rational)>) -> Self {
        let mut poly = Self::zero();
        for (monomial, coeff) in pairs {
            poly.add_term(monomial, coeff);
        }
        poly
    }

    /// Builds `Σ coeffs[i] * sym^(d - i)` from a dense, highest-first list.
    pub fn from_coeffs_in(sym: &Symbol, coeffs: &[Poly]) -> Self {
        let degree = coeffs.len().saturating_sub(1);
        let mut poly = Self::zero();
        for (idx, coeff) in coeffs.iter().enumerate() {
            let power = (degree - idx) as u32;
            poly = poly + coeff * &Poly::term(Rational::one(), Monomial::var_pow(sym.clone(), power));
        }
        poly
    }

    fn add_term(&mut self, monomial: Monomial, coeff: Rational) {
        if coeff.is_zero() {
            return;
        }
        let entry = self.terms.entry(monomial).or_insert_with(Rational::zero);
        *entry += coeff;
        if entry.is_zero() {
            self.terms.retain(|_, value| !value.is_zero());
        }
    }

    /// Returns true for the zero polynomial.
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns the value when the polynomial is constant.
    pub fn constant_value(&self) -> Option<Rational> {
        match self.terms.len() {
            0 => Some(Rational::zero()),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(monomial, _)| monomial.is_one())
                .map(|(_, coeff)| coeff.clone()),
            _ => None,
        }
    }

    /// Iterates over `(monomial, coefficient)` pairs.
    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &Rational)> {
        self.terms.iter()
    }

    /// Number of non-zero terms.
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Coefficient of an exact monomial.
    pub fn coeff_of(&self, monomial: &Monomial) -> Rational {
        self.terms
            .get(monomial)
            .cloned()
            .unwrap_or_else(Rational::zero)
    }

    /// Symbols occurring with a non-zero power.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        self.terms
            .keys()
            .flat_map(|monomial| monomial.powers().map(|(sym, _)| sym.clone()))
            .collect()
    }

    /// Returns true when `sym` occurs in the polynomial.
    pub fn contains(&self, sym: &Symbol) -> bool {
        self.terms.keys().any(|monomial| monomial.degree_in(sym) > 0)
    }

    /// Highest power of `sym`.
    pub fn degree_in(&self, sym: &Symbol) -> u32 {
        self.terms
            .keys()
            .map(|monomial| monomial.degree_in(sym))
            .max()
            .unwrap_or(0)
    }

    /// Dense coefficient list in `sym`, highest degree first. The zero
    /// polynomial yields `[0]`.
    pub fn coeffs_in(&self, sym: &Symbol) -> Vec<Poly> {
        let degree = self.degree_in(sym) as usize;
        let mut coeffs = vec![Poly::zero(); degree + 1];
        for (monomial, coeff) in &self.terms {
            let power = monomial.degree_in(sym) as usize;
            coeffs[degree - power].add_term(monomial.without(sym), coeff.clone());
        }
        coeffs
    }

    /// Coefficient of the highest power of `sym`.
    pub fn leading_coeff_in(&self, sym: &Symbol) -> Poly {
        self.coeffs_in(sym).swap_remove(0)
    }

    /// Rational coefficients in `sym`, highest first, when `sym` is the only
    /// free symbol (or the polynomial is constant).
    pub fn univariate_coeffs(&self, sym: &Symbol) -> Option<Vec<Rational>> {
        self.coeffs_in(sym)
            .into_iter()
            .map(|coeff| coeff.constant_value())
            .collect()
    }

    /// Multiplies every coefficient by `factor`.
    pub fn scale(&self, factor: &Rational) -> Poly {
        if factor.is_zero() {
            return Poly::zero();
        }
        Poly {
            terms: self
                .terms
                .iter()
                .map(|(monomial, coeff)| (monomial.clone(), coeff * factor))
                .collect(),
        }
    }

    /// Raises the polynomial to a non-negative integer power.
    pub fn pow(&self, exp: u32) -> Poly {
        let mut result = Poly::one();
        for _ in 0..exp {
            result = &result * self;
        }
        result
    }

    /// Replaces every occurrence of `sym` by `replacement`.
    pub fn subs(&self, sym: &Symbol, replacement: &Poly) -> Poly {
        let mut result = Poly::zero();
        for (monomial, coeff) in &self.terms {
            let power = monomial.degree_in(sym);
            let rest = Poly::term(coeff.clone(), monomial.without(sym));
            result = result + &rest * &replacement.pow(power);
        }
        result
    }

    /// Simultaneously replaces every mapped symbol.
    pub fn subs_all(&self, replacements: &BTreeMap<Symbol, Poly>) -> Poly {
        let mut result = Poly::zero();
        for (monomial, coeff) in &self.terms {
            let mut product = Poly::constant(coeff.clone());
            for (sym, power) in monomial.powers() {
                let factor = match replacements.get(sym) {
                    Some(replacement) => replacement.pow(power),
                    None => Poly::term(Rational::one(), Monomial::var_pow(sym.clone(), power)),
                };
                product = &product * &factor;
            }
            result = result + product;
        }
        result
    }

    /// Re-tags symbols whose names appear in `domains` with that domain.
    pub fn assign_domains(&self, domains: &BTreeMap<String, Domain>) -> Poly {
        if domains.is_empty() {
            return self.clone();
        }
        Poly::from_terms(self.terms.iter().map(|(monomial, coeff)| {
            let powers = monomial.powers().map(|(sym, power)| {
                let sym = match domains.get(sym.name()) {
                    Some(domain) if !sym.is_iteration() => {
                        Symbol::with_domain(sym.name(), *domain)
                    }
                    _ => sym.clone(),
                };
                (sym, power)
            });
            (Monomial::from_powers(powers), coeff.clone())
        }))
    }

    /// Evaluates the polynomial; `None` when a symbol has no value.
    pub fn eval(&self, values: &BTreeMap<Symbol, Rational>) -> Option<Rational> {
        let mut total = Rational::zero();
        for (monomial, coeff) in &self.terms {
            let mut term = coeff.clone();
            for (sym, power) in monomial.powers() {
                term *= rational_pow(values.get(sym)?, i64::from(power));
            }
            total += term;
        }
        Some(total)
    }
}

impl fmt::Display for Poly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("0");
        }
        let mut ordered: Vec<(&Monomial, &Rational)> = self.terms.iter().collect();
        ordered.sort_by(|(lhs, _), (rhs, _)| {
            rhs.total_degree()
                .cmp(&lhs.total_degree())
                .then_with(|| lhs.cmp(rhs))
        });
        for (idx, (monomial, coeff)) in ordered.into_iter().enumerate() {
            let magnitude = coeff.abs();
            if idx == 0 {
                if coeff.is_negative() {
                    f.write_str("-")?;
                }
            } else if coeff.is_negative() {
                f.write_str(" - ")?;
            } else {
                f.write_str(" + ")?;
            }
            if monomial.is_one() {
                write!(f, "{magnitude}")?;
            } else if magnitude.is_one() {
                write!(f, "{monomial}")?;
            } else {
                write!(f, "{magnitude}*{monomial}")?;
            }
        }
        Ok(())
    }
}

impl Serialize for Poly {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Poly {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = crate::parse::deserialize_text(deserializer)?;
        crate::parse::parse_poly(&text).map_err(serde::de::Error::custom)
    }
}

impl From<Rational> for Poly {
    fn from(value: Rational) -> Self {
        Poly::constant(value)
    }
}

impl From<Symbol> for Poly {
    fn from(sym: Symbol) -> Self {
        Poly::var(sym)
    }
}

impl Add<&Poly> for &Poly {
    type Output = Poly;

    fn add(self, rhs: &Poly) -> Poly {
        let mut result = self.clone();
        for (monomial, coeff) in &rhs.terms {
            result.add_term(monomial.clone(), coeff.clone());
        }
        result
    }
}

impl Add for Poly {
    type Output = Poly;

    fn add(self, rhs: Poly) -> Poly {
        &self + &rhs
    }
}

impl Neg for &Poly {
    type Output = Poly;

    fn neg(self) -> Poly {
        Poly {
            terms: self
                .terms
                .iter()
                .map(|(monomial, coeff)| (monomial.clone(), -coeff))
                .collect(),
        }
    }
}

impl Neg for Poly {
    type Output = Poly;

    fn neg(self) -> Poly {
        -&self
    }
}

impl Sub<&Poly> for &Poly {
    type Output = Poly;

    fn sub(self, rhs: &Poly) -> Poly {
        self + &(-rhs)
    }
}

impl Sub for Poly {
    type Output = Poly;

    fn sub(self, rhs: Poly) -> Poly {
        &self - &rhs
    }
}

impl Mul<&Poly> for &Poly {
    type Output = Poly;

    fn mul(self, rhs: &Poly) -> Poly {
        let mut result = Poly::zero();
        for (lhs_mono, lhs_coeff) in &self.terms {
            for (rhs_mono, rhs_coeff) in &rhs.terms {
                result.add_term(lhs_mono.mul(rhs_mono), lhs_coeff * rhs_coeff);
            }
        }
        result
    }
}

impl Mul for Poly {
    type Output = Poly;

    fn mul(self, rhs: Poly) -> Poly {
        &self * &rhs
    }
}
