#![deny(missing_docs)]
#![doc = "Asymptotic dominance oracle: picks the eventually greatest or least member of a set of growth expressions in the iteration variable."]

use std::cmp::Ordering;

use termwit_core::errors::{ErrorInfo, TermwitError};
use termwit_core::sign::get_sign;
use termwit_core::Expr;
use tracing::trace;

/// Selects extremal members of a candidate set by eventual growth in `n`.
///
/// Implementations must be deterministic and total over every non-empty
/// finite candidate set; a single candidate is returned unchanged.
pub trait DominanceOracle {
    /// Returns the candidate that is eventually greatest.
    fn dominating(&self, candidates: &[Expr]) -> Result<Expr, TermwitError>;

    /// Returns the candidate that is eventually least.
    fn dominated(&self, candidates: &[Expr]) -> Result<Expr, TermwitError>;
}

/// Compares `lhs` and `rhs` for all sufficiently large `n`.
///
/// The sign of the dominant term of `lhs - rhs` decides; `None` when that
/// coefficient has no provable sign over the parameters.
pub fn compare_eventually(lhs: &Expr, rhs: &Expr) -> Option<Ordering> {
    let difference = lhs - rhs;
    let Some(term) = difference.dominant_term() else {
        return Some(Ordering::Equal);
    };
    match get_sign(&term.coeff) {
        Some(true) => Some(Ordering::Greater),
        Some(false) => Some(Ordering::Less),
        None => None,
    }
}

/// Preference used whenever growth does not separate two candidates:
/// shorter rendering first, then lexicographic.
fn syntactic_key(expr: &Expr) -> (usize, String) {
    let rendered = expr.to_string();
    (rendered.len(), rendered)
}

/// Leading-term oracle over [`Expr`] candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrowthOracle;

impl GrowthOracle {
    /// Creates the oracle.
    pub fn new() -> Self {
        Self
    }

    fn select(&self, candidates: &[Expr], wanted: Ordering) -> Result<Expr, TermwitError> {
        let mut ordered: Vec<(usize, String, &Expr)> = candidates
            .iter()
            .map(|expr| {
                let (len, text) = syntactic_key(expr);
                (len, text, expr)
            })
            .collect();
        ordered.sort_by(|lhs, rhs| (lhs.0, &lhs.1).cmp(&(rhs.0, &rhs.1)));
        ordered.dedup_by(|lhs, rhs| lhs.2 == rhs.2);
        let mut iter = ordered.into_iter().map(|(_, _, expr)| expr);
        let Some(mut best) = iter.next() else {
            return Err(TermwitError::Input(ErrorInfo::new(
                "empty-candidates",
                "the dominance oracle needs at least one candidate",
            )));
        };
        for candidate in iter {
            let ordering = compare_eventually(candidate, best);
            trace!(%candidate, %best, ?ordering, "dominance comparison");
            if ordering == Some(wanted) {
                best = candidate;
            }
        }
        Ok(best.clone())
    }
}

impl DominanceOracle for GrowthOracle {
    fn dominating(&self, candidates: &[Expr]) -> Result<Expr, TermwitError> {
        self.select(candidates, Ordering::Greater)
    }

    fn dominated(&self, candidates: &[Expr]) -> Result<Expr, TermwitError> {
        self.select(candidates, Ordering::Less)
    }
}
