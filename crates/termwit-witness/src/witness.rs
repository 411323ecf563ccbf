//! Termination witnesses produced by the classifiers.

use std::fmt;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::{Serialize, Serializer};
use termwit_core::{Expr, Poly, Symbol};

/// Result of scanning a univariate polynomial over the naturals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExactWitness {
    /// Polynomial in `n` that was scanned.
    pub poly: Poly,
    /// Approximate real roots, increasing.
    pub roots: Vec<f64>,
    /// First `n >= 0` at which the loop exits, if any.
    #[serde(serialize_with = "exit_index")]
    pub first_exit: Option<BigInt>,
    /// The loop exits once the polynomial is zero.
    pub terminates_on_zero: bool,
    /// The loop exits once the polynomial is negative.
    pub terminates_on_negative: bool,
}

impl ExactWitness {
    fn exit_condition(&self) -> &'static str {
        match (self.terminates_on_zero, self.terminates_on_negative) {
            (true, true) => "zero or negative",
            (true, false) => "zero",
            (false, true) => "negative",
            (false, false) => "exiting",
        }
    }
}

/// Exit indices serialize as numbers while they fit a `u64`, as text beyond.
fn exit_index<S: Serializer>(index: &Option<BigInt>, serializer: S) -> Result<S::Ok, S::Error> {
    match index {
        None => serializer.serialize_none(),
        Some(index) => match index.to_u64() {
            Some(small) => serializer.serialize_u64(small),
            None => serializer.serialize_str(&index.to_string()),
        },
    }
}

fn symbol_name<S: Serializer>(sym: &Symbol, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(sym.name())
}

/// Evidence for or against termination of a single-atom loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Witness {
    /// Exact scan of a polynomial whose only symbol is `n`.
    Exact(ExactWitness),
    /// The dominant coefficient is provably negative, so the guard eventually
    /// fails.
    AsymptoticTerminating {
        /// Expression in `n` the guard reduces to.
        expr: Expr,
        /// Its dominant coefficient.
        leading_coefficient: Poly,
    },
    /// The expression is eventually positive and its constant term grows
    /// without bound through `symbol`, which no other coefficient mentions.
    AsymptoticConstantGrowth {
        /// Expression in `n` the guard reduces to.
        expr: Expr,
        /// Symbol driving the constant term.
        #[serde(serialize_with = "symbol_name")]
        symbol: Symbol,
    },
    /// No verdict; not a counted witness.
    Undetermined {
        /// Why the analysis stopped.
        reason: String,
    },
}

/// Three-valued conclusion drawn from a [`Witness`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// The loop terminates.
    Terminates,
    /// The loop does not terminate.
    DoesNotTerminate,
    /// Termination could not be determined.
    Unknown,
}

impl Witness {
    /// Shorthand for [`Witness::Undetermined`].
    pub fn undetermined(reason: impl Into<String>) -> Self {
        Witness::Undetermined {
            reason: reason.into(),
        }
    }

    /// True when the witness proves termination.
    pub fn is_termination_witness(&self) -> bool {
        match self {
            Witness::Exact(exact) => exact.first_exit.is_some(),
            Witness::AsymptoticTerminating { .. } => true,
            Witness::AsymptoticConstantGrowth { .. } | Witness::Undetermined { .. } => false,
        }
    }

    /// True when the witness proves nontermination.
    pub fn is_nontermination_witness(&self) -> bool {
        match self {
            Witness::Exact(exact) => exact.first_exit.is_none(),
            Witness::AsymptoticConstantGrowth { .. } => true,
            Witness::AsymptoticTerminating { .. } | Witness::Undetermined { .. } => false,
        }
    }

    /// Conclusion carried by the witness.
    pub fn verdict(&self) -> Verdict {
        if self.is_termination_witness() {
            Verdict::Terminates
        } else if self.is_nontermination_witness() {
            Verdict::DoesNotTerminate
        } else {
            Verdict::Unknown
        }
    }
}

impl fmt::Display for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Witness::Exact(exact) => match &exact.first_exit {
                Some(index) => write!(
                    f,
                    "The polynomial {} is {} at n = {index}. Its real roots are {:?}.",
                    exact.poly,
                    exact.exit_condition(),
                    exact.roots
                ),
                None => write!(
                    f,
                    "The polynomial {} never becomes {}.",
                    exact.poly,
                    exact.exit_condition()
                ),
            },
            Witness::AsymptoticTerminating {
                expr,
                leading_coefficient,
            } => write!(
                f,
                "The guard {expr} eventually becomes negative: its dominant coefficient \
                 {leading_coefficient} is negative."
            ),
            Witness::AsymptoticConstantGrowth { expr, symbol } => write!(
                f,
                "The guard {expr} is eventually positive and its constant term grows \
                 without bound through {symbol}, which no other coefficient mentions."
            ),
            Witness::Undetermined { reason } => {
                write!(f, "termination could not be determined: {reason}")
            }
        }
    }
}
