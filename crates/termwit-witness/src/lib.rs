#![deny(missing_docs)]
#![doc = "Loop-guard normalisation, termination witnesses, SMT conditions and the analysis driver of the termination witness engine."]

pub mod analyzer;
pub mod atom;
pub mod bound_condition;
pub mod condition;
pub mod guard;
pub mod problem;
pub mod smt;
pub mod witness;

pub use analyzer::{AnalysisReport, Analyzer, Mode, Outcome};
pub use atom::{normalize, Atom, NormalizedAtom, RelOp};
pub use bound_condition::classify_bounds;
pub use condition::PolynomialTerminationCondition;
pub use guard::Guard;
pub use problem::{ClosedFormEntry, LoopData, Problem};
pub use smt::{
    smt_poly, LogicalState, SmtFormula, SmtOutcome, SmtTerminationCondition, TerminationProperty,
};
pub use witness::{ExactWitness, Verdict, Witness};
