#![deny(missing_docs)]
#![doc = "Bound synthesis for loop variables under nondeterministic and probabilistic updates, with seeded trajectory simulation."]

pub mod branches;
pub mod distribution;
mod induction;
pub mod recurrence;
pub mod simulate;
pub mod synth;

pub use branches::{
    bare_monomial, Branch, BranchMap, ClosedForm, ClosedFormSource, ClosedForms,
    DistAssignments, InitialValues, LoopModel,
};
pub use distribution::{Distribution, Support};
pub use recurrence::solve_linear;
pub use simulate::{Simulator, Trajectory};
pub use synth::{BoundPair, BoundSynthesizer};
