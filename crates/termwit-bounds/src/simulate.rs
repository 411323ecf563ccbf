//! Seeded trajectory simulation used to check synthesized bounds against
//! concrete executions.

use std::collections::BTreeMap;

use termwit_core::errors::{ErrorInfo, TermwitError};
use termwit_core::{rational, Monomial, Poly, Rational, RngHandle, Symbol};
use tracing::debug;

use crate::branches::{Branch, LoopModel};
use crate::synth::BoundPair;

/// Concrete values of every simulated symbol for `n = 0..=horizon`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    parameters: BTreeMap<Symbol, Rational>,
    states: Vec<BTreeMap<Symbol, Rational>>,
}

impl Trajectory {
    /// Number of recorded states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Program-symbol values at iteration `n` (random variables included).
    pub fn state(&self, n: usize) -> Option<&BTreeMap<Symbol, Rational>> {
        self.states.get(n)
    }

    /// Parameter values, the iteration counter and the state at `n`.
    pub fn assignment(&self, n: usize) -> Option<BTreeMap<Symbol, Rational>> {
        let state = self.states.get(n)?;
        let mut values = self.parameters.clone();
        values.extend(state.iter().map(|(sym, value)| (sym.clone(), value.clone())));
        values.insert(Symbol::iteration(), rational(i64::try_from(n).ok()?));
        Some(values)
    }

    /// Value of `poly` at iteration `n`.
    pub fn eval(&self, poly: &Poly, n: usize) -> Option<Rational> {
        poly.eval(&self.assignment(n)?)
    }

    /// First iteration at which `poly` leaves `pair`, if any.
    pub fn first_violation(
        &self,
        pair: &BoundPair,
        poly: &Poly,
    ) -> Result<Option<usize>, TermwitError> {
        for n in 0..self.states.len() {
            let unevaluable = || {
                TermwitError::Input(
                    ErrorInfo::new(
                        "unevaluable-bound",
                        "bound or expression mentions a symbol without a value",
                    )
                    .with_context("iteration", n.to_string()),
                )
            };
            let value = self.eval(poly, n).ok_or_else(unevaluable)?;
            let values = self.assignment(n).ok_or_else(unevaluable)?;
            let inside = pair
                .contains(n as u64, &value, &values)
                .ok_or_else(unevaluable)?;
            if !inside {
                debug!(n, %value, lower = %pair.lower, upper = %pair.upper, "bound violated");
                return Ok(Some(n));
            }
        }
        Ok(None)
    }
}

fn simulation_error(code: &str, message: &str, sym: &Symbol) -> TermwitError {
    TermwitError::Input(ErrorInfo::new(code, message).with_context("symbol", sym.to_string()))
}

/// Runs a loop model forward, choosing branches uniformly at random and
/// sampling every random variable once per iteration.
pub struct Simulator<'a> {
    model: LoopModel<'a>,
    parameters: BTreeMap<Symbol, Rational>,
}

impl<'a> Simulator<'a> {
    /// Creates a simulator with fixed parameter values.
    pub fn new(model: LoopModel<'a>, parameters: BTreeMap<Symbol, Rational>) -> Self {
        Self { model, parameters }
    }

    /// Loop variables updated by branches: single-symbol keys of the branch
    /// map. Higher monomial entries are implied by these.
    fn variables(&self) -> Vec<(Symbol, &'a [Branch])> {
        let branch_map = self.model.branches;
        branch_map
            .iter()
            .filter_map(|(monomial, branches)| {
                single_symbol(monomial).map(|sym| (sym, branches))
            })
            .collect()
    }

    /// Simulates `horizon` iterations, recording `horizon + 1` states.
    pub fn run(&self, horizon: usize, rng: &mut RngHandle) -> Result<Trajectory, TermwitError> {
        let variables = self.variables();
        let mut current: BTreeMap<Symbol, Rational> = BTreeMap::new();
        for (sym, _) in &variables {
            let initial = self.model.initial_values.get(sym).ok_or_else(|| {
                simulation_error("missing-initial-value", "loop variable has no initial value", sym)
            })?;
            let value = initial.eval(&self.parameters).ok_or_else(|| {
                simulation_error("unresolved-symbol", "initial value is not concrete", sym)
            })?;
            current.insert(sym.clone(), value);
        }

        let mut states = Vec::with_capacity(horizon + 1);
        for n in 0..=horizon {
            self.complete_state(&mut current, n, &variables, rng)?;
            if n == horizon {
                states.push(current);
                break;
            }
            let mut assignment = self.parameters.clone();
            assignment.extend(current.iter().map(|(sym, value)| (sym.clone(), value.clone())));
            assignment.insert(Symbol::iteration(), rational(n as i64));
            let mut next = BTreeMap::new();
            for (sym, branches) in &variables {
                let branch = &branches[rng.choose_index(branches.len())];
                let forcing = branch.inhomogeneous.eval(&assignment).ok_or_else(|| {
                    simulation_error("unresolved-symbol", "update mentions an unknown symbol", sym)
                })?;
                let previous = &current[sym];
                next.insert(sym.clone(), &branch.coefficient * previous + forcing);
            }
            states.push(current);
            current = next;
        }
        Ok(Trajectory {
            parameters: self.parameters.clone(),
            states,
        })
    }

    /// Adds closed-form values and fresh random samples for iteration `n`.
    fn complete_state(
        &self,
        state: &mut BTreeMap<Symbol, Rational>,
        n: usize,
        variables: &[(Symbol, &'a [Branch])],
        rng: &mut RngHandle,
    ) -> Result<(), TermwitError> {
        for (sym, dist) in self.model.distributions.iter() {
            state.insert(sym.clone(), dist.sample(rng));
        }
        for sym in self.model.closed_forms.symbols() {
            if variables.iter().any(|(var, _)| *var == sym) {
                continue;
            }
            let Some(form) = self.model.closed_forms.closed_form(&sym) else {
                continue;
            };
            let value = form.expr.eval(n as u64, &self.parameters).ok_or_else(|| {
                simulation_error("unresolved-symbol", "closed form is not concrete", &sym)
            })?;
            state.insert(sym, value);
        }
        Ok(())
    }
}

fn single_symbol(monomial: &Monomial) -> Option<Symbol> {
    let mut powers = monomial.powers();
    match (powers.next(), powers.next()) {
        (Some((sym, 1)), None) => Some(sym.clone()),
        _ => None,
    }
}
