//! YAML problem files: one loop guard plus everything known about the loop.
//!
//! ```yaml
//! guard: "x > 0"
//! parameters: { c: positive }
//! closed_forms: { x: "-c*n + 3" }
//! branches:
//!   y:
//!     - { coefficient: 1, inhomogeneous: "r" }
//! distributions:
//!   r: { kind: bernoulli, p: 1/2 }
//! initial_values: { y: 0 }
//! prologue: false
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use termwit_bounds::{
    Branch, BranchMap, ClosedForm, ClosedForms, DistAssignments, Distribution, InitialValues,
    LoopModel,
};
use termwit_core::errors::{ErrorInfo, TermwitError};
use termwit_core::{parse_poly_with_domains, Domain, Expr, Poly, Symbol};

use crate::guard::Guard;

/// Closed form given either as bare text or with an exactness flag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClosedFormEntry {
    /// `x: "n + 1"`, taken as exact.
    Text(Expr),
    /// `x: { expr: "...", exact: false }`.
    Full(ClosedForm),
}

impl ClosedFormEntry {
    fn into_closed_form(self) -> ClosedForm {
        match self {
            ClosedFormEntry::Text(expr) => ClosedForm::exact(expr),
            ClosedFormEntry::Full(form) => form,
        }
    }
}

/// Loop description read from a problem file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Problem {
    /// Loop guard; only single atoms are analysed.
    pub guard: Guard,
    /// Sign domains of free parameters; unlisted symbols are real.
    #[serde(default)]
    pub parameters: BTreeMap<String, Domain>,
    /// Closed forms of loop variables.
    #[serde(default)]
    pub closed_forms: BTreeMap<String, ClosedFormEntry>,
    /// Update branches per monomial key.
    #[serde(default)]
    pub branches: BTreeMap<String, Vec<Branch>>,
    /// Distributions of random variables.
    #[serde(default)]
    pub distributions: BTreeMap<String, Distribution>,
    /// Values before the first iteration.
    #[serde(default)]
    pub initial_values: BTreeMap<String, Poly>,
    /// True when statements before the loop fix some variables.
    #[serde(default)]
    pub prologue: bool,
}

/// Owned loop inputs a [`LoopModel`] borrows from.
#[derive(Debug, Clone, Default)]
pub struct LoopData {
    /// Recurrence branches.
    pub branches: BranchMap,
    /// Random-variable distributions.
    pub distributions: DistAssignments,
    /// Closed forms of deterministic symbols.
    pub closed_forms: ClosedForms,
    /// Initial values.
    pub initial_values: InitialValues,
}

impl LoopData {
    /// Borrowed view for synthesis and simulation.
    pub fn model(&self) -> LoopModel<'_> {
        LoopModel {
            branches: &self.branches,
            distributions: &self.distributions,
            closed_forms: &self.closed_forms,
            initial_values: &self.initial_values,
        }
    }
}

fn serde_error(code: &str, err: impl std::fmt::Display) -> TermwitError {
    TermwitError::Serde(ErrorInfo::new(code, err.to_string()))
}

impl Problem {
    /// Parses a problem from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, TermwitError> {
        serde_yaml::from_str(text).map_err(|err| serde_error("yaml_deserialize", err))
    }

    /// Reads and parses a YAML problem file.
    pub fn load(path: &Path) -> Result<Self, TermwitError> {
        let text = fs::read_to_string(path).map_err(|err| {
            TermwitError::Serde(
                ErrorInfo::new("problem_read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// Symbol named `name` with its declared domain.
    pub fn symbol(&self, name: &str) -> Symbol {
        let domain = self.parameters.get(name).copied().unwrap_or(Domain::Real);
        Symbol::with_domain(name, domain)
    }

    /// The guard with parameter domains applied.
    pub fn guard(&self) -> Guard {
        self.guard.assign_domains(&self.parameters)
    }

    /// True when some variable has several branches or a random variable is
    /// declared.
    pub fn is_probabilistic(&self) -> bool {
        !self.distributions.is_empty() || self.branches.values().any(|list| list.len() > 1)
    }

    /// Closed forms keyed by symbol, with parameter domains applied.
    pub fn closed_forms(&self) -> ClosedForms {
        let mut forms = ClosedForms::default();
        for (name, entry) in &self.closed_forms {
            let mut form = entry.clone().into_closed_form();
            form.expr = form.expr.assign_domains(&self.parameters);
            forms.insert(self.symbol(name), form);
        }
        forms
    }

    /// Builds the owned loop inputs, validating branches and distributions.
    pub fn loop_data(&self) -> Result<LoopData, TermwitError> {
        let mut entries = Vec::with_capacity(self.branches.len());
        for (key, list) in &self.branches {
            let key = parse_poly_with_domains(key, &self.parameters)?;
            let list = list
                .iter()
                .map(|branch| {
                    Branch::new(
                        branch.coefficient.clone(),
                        branch.inhomogeneous.assign_domains(&self.parameters),
                    )
                })
                .collect();
            entries.push((key, list));
        }
        let distributions = self
            .distributions
            .iter()
            .map(|(name, dist)| (self.symbol(name), dist.clone()))
            .collect();
        let initial_values = self
            .initial_values
            .iter()
            .map(|(name, value)| (self.symbol(name), value.assign_domains(&self.parameters)))
            .collect();
        Ok(LoopData {
            branches: BranchMap::from_polys(entries)?,
            distributions: DistAssignments::new(distributions)?,
            closed_forms: self.closed_forms(),
            initial_values: InitialValues::new(initial_values),
        })
    }
}
