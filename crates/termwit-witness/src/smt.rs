//! SMT-LIB encoding of eventual nontermination for guards whose reduced
//! polynomial mentions free parameters.
//!
//! With `P = Σ alpha_i · n^(d-i)` the guard holds for all large `n` exactly
//! when the first non-zero coefficient is positive. A model of the generated
//! formula is a parameter choice for which the loop never exits.

use std::fmt;

use num_traits::{One, Signed};
use serde::Serialize;
use termwit_core::{Domain, Expr, Poly, Rational, Symbol};
use tracing::debug;

/// Answer reported by an SMT solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogicalState {
    /// A model exists.
    Sat,
    /// No model exists.
    Unsat,
}

/// Termination property implied by a solver answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationProperty {
    /// Some parameter choice keeps the loop running forever.
    Nontermination,
    /// Every parameter choice makes the loop exit.
    Terminating,
}

impl fmt::Display for LogicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalState::Sat => "sat",
            LogicalState::Unsat => "unsat",
        })
    }
}

impl fmt::Display for TerminationProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TerminationProperty::Nontermination => "nontermination",
            TerminationProperty::Terminating => "termination",
        })
    }
}

/// SMT-LIB script plus what each solver answer means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmtFormula {
    /// Complete script ending in `(check-sat)`.
    pub text: String,
    /// Solver answer to termination property.
    pub implications: Vec<(LogicalState, TerminationProperty)>,
}

impl SmtFormula {
    /// Property implied by `state`, if any.
    pub fn implication(&self, state: LogicalState) -> Option<TerminationProperty> {
        self.implications
            .iter()
            .find(|(answer, _)| *answer == state)
            .map(|(_, property)| *property)
    }
}

impl fmt::Display for SmtFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "The following implications hold:")?;
        for (state, property) in &self.implications {
            writeln!(f, "{:<15}=>    {property}", state.to_string())?;
        }
        write!(f, "for the following formula:\n\n{}", self.text)
    }
}

/// Outcome of SMT condition generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SmtOutcome {
    /// A formula was generated.
    Formula(SmtFormula),
    /// The loop shape is outside what the encoding supports.
    Unsupported {
        /// The violated precondition.
        reason: String,
    },
}

impl fmt::Display for SmtOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtOutcome::Formula(formula) => write!(f, "{formula}"),
            SmtOutcome::Unsupported { reason } => write!(f, "No formula was generated: {reason}"),
        }
    }
}

/// SMT termination condition for one normalized guard.
#[derive(Debug, Clone, PartialEq)]
pub struct SmtTerminationCondition {
    expr: Expr,
    terminates_on_zero: bool,
    terminates_on_negative: bool,
    has_prologue: bool,
}

impl SmtTerminationCondition {
    /// Creates the condition; `has_prologue` marks loops whose variables are
    /// fixed by statements before the loop.
    pub fn new(
        expr: Expr,
        terminates_on_zero: bool,
        terminates_on_negative: bool,
        has_prologue: bool,
    ) -> Self {
        Self {
            expr,
            terminates_on_zero,
            terminates_on_negative,
            has_prologue,
        }
    }

    /// Generates the formula or names the violated precondition.
    pub fn outcome(&self) -> SmtOutcome {
        if self.has_prologue {
            return unsupported("loops with a prologue are not supported");
        }
        if !self.terminates_on_negative {
            return unsupported("guards that only exit on zero are not supported");
        }
        let Some(poly) = self.expr.as_poly() else {
            return unsupported("exponential closed forms are not supported");
        };
        SmtOutcome::Formula(self.encode(&poly))
    }

    fn encode(&self, poly: &Poly) -> SmtFormula {
        let coeffs = poly.coeffs_in(&Symbol::iteration());
        let alphas: Vec<String> = (0..coeffs.len()).map(|idx| format!("alpha_{idx}")).collect();
        let mut lines = Vec::new();
        let parameters = poly
            .free_symbols()
            .into_iter()
            .filter(|sym| !sym.is_iteration())
            .collect::<Vec<_>>();
        for sym in &parameters {
            lines.push(format!("(declare-const {} Real)", sym.name()));
        }
        for alpha in &alphas {
            lines.push(format!("(declare-const {alpha} Real)"));
        }
        for sym in &parameters {
            match sym.domain() {
                Domain::Positive => lines.push(format!("(assert (> {} 0.0))", sym.name())),
                Domain::NonNegative => lines.push(format!("(assert (>= {} 0.0))", sym.name())),
                Domain::Real => {}
            }
        }
        for (alpha, coeff) in alphas.iter().zip(&coeffs) {
            lines.push(format!("(assert (= {alpha} {}))", smt_poly(coeff)));
        }

        let mut disjuncts = Vec::new();
        for (idx, alpha) in alphas.iter().enumerate() {
            let mut conjuncts = vec![format!("(> {alpha} 0.0)")];
            conjuncts.extend(alphas[..idx].iter().map(|prev| format!("(= {prev} 0.0)")));
            disjuncts.push(connective("and", conjuncts));
        }
        if !self.terminates_on_zero {
            let all_zero = alphas.iter().map(|alpha| format!("(= {alpha} 0.0)")).collect();
            disjuncts.push(connective("and", all_zero));
        }
        lines.push(format!("(assert {})", connective("or", disjuncts)));
        lines.push("(check-sat)".to_string());
        let text = lines.join("\n");
        debug!(%poly, coefficients = coeffs.len(), "generated smt condition");
        SmtFormula {
            text,
            implications: vec![
                (LogicalState::Sat, TerminationProperty::Nontermination),
                (LogicalState::Unsat, TerminationProperty::Terminating),
            ],
        }
    }
}

fn unsupported(reason: &str) -> SmtOutcome {
    SmtOutcome::Unsupported {
        reason: reason.to_string(),
    }
}

/// `(op a b ...)`, or the only operand itself.
fn connective(op: &str, mut operands: Vec<String>) -> String {
    if operands.len() == 1 {
        return operands.remove(0);
    }
    format!("({op} {})", operands.join(" "))
}

fn smt_rational(value: &Rational) -> String {
    let magnitude = value.abs();
    let body = if magnitude.is_integer() {
        format!("{}.0", magnitude.numer())
    } else {
        format!("(/ {}.0 {}.0)", magnitude.numer(), magnitude.denom())
    };
    if value.is_negative() {
        format!("(- {body})")
    } else {
        body
    }
}

/// Renders a polynomial over real-valued parameters as an SMT-LIB term.
pub fn smt_poly(poly: &Poly) -> String {
    if poly.is_zero() {
        return "0.0".to_string();
    }
    let terms: Vec<String> = poly
        .terms()
        .map(|(monomial, coeff)| {
            let mut factors = Vec::new();
            if monomial.is_one() || !coeff.is_one() {
                factors.push(smt_rational(coeff));
            }
            for (sym, power) in monomial.powers() {
                factors.extend((0..power).map(|_| sym.name().to_string()));
            }
            connective("*", factors)
        })
        .collect();
    connective("+", terms)
}
