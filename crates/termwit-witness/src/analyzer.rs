//! Drives one loop guard through normalization, substitution or bounding,
//! classification and presentation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use termwit_bounds::{BoundPair, BoundSynthesizer, ClosedFormSource};
use termwit_core::errors::{ErrorInfo, TermwitError};
use termwit_core::{EngineConfig, Expr, Poly, Symbol};
use termwit_dominance::GrowthOracle;
use tracing::{debug, info, warn};

use crate::atom::{normalize, NormalizedAtom};
use crate::bound_condition::classify_bounds;
use crate::condition::PolynomialTerminationCondition;
use crate::problem::Problem;
use crate::smt::{SmtOutcome, SmtTerminationCondition};
use crate::witness::{Verdict, Witness};

/// Analysis strategy; exactly one runs per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Substitute exact closed forms and classify the result.
    #[default]
    ClosedForm,
    /// Synthesize bounds under branching and classify those.
    Amber,
    /// Emit an SMT-LIB condition for eventual nontermination.
    Smt,
}

impl Mode {
    /// Command-line spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::ClosedForm => "closed-form",
            Mode::Amber => "amber",
            Mode::Smt => "smt",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = TermwitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Mode::ClosedForm, Mode::Amber, Mode::Smt]
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                TermwitError::Input(
                    ErrorInfo::new("unknown-mode", "unknown analysis mode")
                        .with_context("mode", s)
                        .with_hint("use closed-form, amber or smt"),
                )
            })
    }
}

/// What the selected analysis produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum Outcome {
    /// A witness from the closed-form or bound classifiers.
    Witness(Witness),
    /// An SMT condition, or the reason none was generated.
    Smt(SmtOutcome),
}

/// Serializable summary of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Strategy that ran.
    pub mode: Mode,
    /// Guard as analysed.
    pub guard: String,
    /// Oriented polynomial and exit flags.
    pub normalized: NormalizedAtom,
    /// Guard polynomial after closed-form substitution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expr>,
    /// Bounds of the guard polynomial in amber mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundPair>,
    /// Conclusion.
    pub outcome: Outcome,
}

impl AnalysisReport {
    /// Verdict of a witness outcome; SMT outcomes need a solver and stay
    /// unknown.
    pub fn verdict(&self) -> Verdict {
        match &self.outcome {
            Outcome::Witness(witness) => witness.verdict(),
            Outcome::Smt(_) => Verdict::Unknown,
        }
    }

    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> Result<String, TermwitError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| TermwitError::Serde(ErrorInfo::new("json_serialize", err.to_string())))
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Guard: {}", self.guard)?;
        writeln!(f, "Normalized polynomial: {}", self.normalized.poly)?;
        if let Some(expr) = &self.expression {
            writeln!(f, "After closed forms: {expr}")?;
        }
        if let Some(bounds) = &self.bounds {
            writeln!(f, "Bounds: {} <= P <= {}", bounds.lower, bounds.upper)?;
        }
        match &self.outcome {
            Outcome::Witness(witness) => match witness.verdict() {
                Verdict::Terminates => write!(f, "Program terminates. Witness found:\n{witness}"),
                Verdict::DoesNotTerminate => {
                    write!(f, "Program does not terminate. Witness found:\n{witness}")
                }
                Verdict::Unknown => write!(f, "Program {witness}"),
            },
            Outcome::Smt(outcome) => write!(f, "{outcome}"),
        }
    }
}

fn probabilistic_error(mode: Mode) -> TermwitError {
    TermwitError::Input(
        ErrorInfo::new(
            "probabilistic-program",
            "only deterministic programs are supported in this mode",
        )
        .with_context("mode", mode.to_string())
        .with_hint("use --mode amber for branching or random updates"),
    )
}

/// Turns budget and unsupported-shape errors into an undetermined witness;
/// everything else aborts the analysis.
fn downgrade(result: Result<Witness, TermwitError>) -> Result<Witness, TermwitError> {
    match result {
        Err(err) if err.is_indeterminate() => {
            warn!(code = %err.info().code, "verdict downgraded to undetermined");
            Ok(Witness::undetermined(err.info().message.clone()))
        }
        other => other,
    }
}

/// Termination analyzer with fixed engine limits.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: EngineConfig,
}

impl Analyzer {
    /// Creates an analyzer.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Engine limits in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyses the guard of `problem` with the chosen strategy.
    pub fn analyze(&self, problem: &Problem, mode: Mode) -> Result<AnalysisReport, TermwitError> {
        let guard = problem.guard();
        let atom = guard.single_atom()?;
        let normalized = normalize(atom)?;
        info!(%guard, %mode, poly = %normalized.poly, "analysing guard");

        let mut report = AnalysisReport {
            mode,
            guard: guard.to_string(),
            normalized: normalized.clone(),
            expression: None,
            bounds: None,
            outcome: Outcome::Witness(Witness::undetermined("analysis did not run")),
        };
        match mode {
            Mode::ClosedForm | Mode::Smt if problem.is_probabilistic() => {
                return Err(probabilistic_error(mode))
            }
            Mode::ClosedForm => {
                let witness = substitute_closed_forms(problem, &normalized.poly).and_then(|expr| {
                    report.expression = Some(expr.clone());
                    PolynomialTerminationCondition::with_flags(expr, &normalized)
                        .witness(&self.config)
                });
                report.outcome = Outcome::Witness(downgrade(witness)?);
            }
            Mode::Smt => {
                let outcome = match substitute_closed_forms(problem, &normalized.poly) {
                    Ok(expr) => {
                        report.expression = Some(expr.clone());
                        SmtTerminationCondition::new(
                            expr,
                            normalized.terminates_on_zero,
                            normalized.terminates_on_negative,
                            problem.prologue,
                        )
                        .outcome()
                    }
                    Err(err) if err.is_indeterminate() => SmtOutcome::Unsupported {
                        reason: err.info().message.clone(),
                    },
                    Err(err) => return Err(err),
                };
                report.outcome = Outcome::Smt(outcome);
            }
            Mode::Amber => {
                let data = problem.loop_data()?;
                let mut synth =
                    BoundSynthesizer::new(data.model(), GrowthOracle::new(), &self.config);
                let witness = synth.bound_poly(&normalized.poly).and_then(|bounds| {
                    debug!(lower = %bounds.lower, upper = %bounds.upper, "guard bounds");
                    report.bounds = Some(bounds.clone());
                    classify_bounds(
                        &bounds,
                        normalized.terminates_on_zero,
                        normalized.terminates_on_negative,
                        &self.config,
                    )
                });
                report.outcome = Outcome::Witness(downgrade(witness)?);
            }
        }
        Ok(report)
    }
}

/// Replaces every loop variable of `poly` that has a closed form. Symbols
/// without one stay free and are treated as parameters.
fn substitute_closed_forms(problem: &Problem, poly: &Poly) -> Result<Expr, TermwitError> {
    let forms = problem.closed_forms();
    let mut replacements: BTreeMap<Symbol, Expr> = BTreeMap::new();
    for sym in poly.free_symbols() {
        let Some(form) = forms.closed_form(&sym) else {
            continue;
        };
        if !form.exact {
            return Err(TermwitError::Unsupported(
                ErrorInfo::new("inexact-closed-form", "only exact closed forms are supported")
                    .with_context("symbol", sym.to_string()),
            ));
        }
        replacements.insert(sym, form.expr);
    }
    let expr = Expr::from(poly).subs_all(&replacements);
    debug!(%poly, %expr, "substituted closed forms");
    Ok(expr)
}
