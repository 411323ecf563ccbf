//! Classification from synthesized bounds instead of exact closed forms.
//!
//! If the upper bound of `P` exits, `P` exits no later; if the lower bound
//! never exits, neither does `P`. Both directions need the guard to exit on
//! negative values, since a bound reaching zero says nothing about `P` being
//! exactly zero.

use termwit_bounds::BoundPair;
use termwit_core::errors::TermwitError;
use termwit_core::EngineConfig;
use tracing::{debug, warn};

use crate::condition::PolynomialTerminationCondition;
use crate::witness::Witness;

/// Classifies a guard polynomial from its `(lower, upper)` bounds.
pub fn classify_bounds(
    bounds: &BoundPair,
    terminates_on_zero: bool,
    terminates_on_negative: bool,
    config: &EngineConfig,
) -> Result<Witness, TermwitError> {
    if !terminates_on_negative {
        return Ok(Witness::undetermined(
            "bounds cannot decide a guard that only exits on zero",
        ));
    }
    let upper = PolynomialTerminationCondition::new(
        bounds.upper.clone(),
        terminates_on_zero,
        terminates_on_negative,
    );
    if let Some(witness) = downgrade(upper.witness(config))? {
        debug!(upper = %bounds.upper, %witness, "upper bound classified");
        if witness.is_termination_witness() {
            return Ok(witness);
        }
    }
    let lower = PolynomialTerminationCondition::new(
        bounds.lower.clone(),
        terminates_on_zero,
        terminates_on_negative,
    );
    if let Some(witness) = downgrade(lower.witness(config))? {
        debug!(lower = %bounds.lower, %witness, "lower bound classified");
        if witness.is_nontermination_witness() {
            return Ok(witness);
        }
    }
    Ok(Witness::undetermined(format!(
        "the bounds {} <= P <= {} do not separate termination from nontermination",
        bounds.lower, bounds.upper
    )))
}

/// Indeterminate errors on one side only lose that side's evidence.
fn downgrade(result: Result<Witness, TermwitError>) -> Result<Option<Witness>, TermwitError> {
    match result {
        Ok(witness) => Ok(Some(witness)),
        Err(err) if err.is_indeterminate() => {
            warn!(code = %err.info().code, "bound classification skipped");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
