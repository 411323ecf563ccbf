//! Engine limits loaded from YAML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, TermwitError};

/// YAML-configurable limits governing root finding and bound synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Largest polynomial degree handed to exact root isolation.
    #[serde(default = "default_max_root_degree")]
    pub max_root_degree: u32,
    /// Deepest chain of nested monomial bound requests.
    #[serde(default = "default_max_bound_depth")]
    pub max_bound_depth: usize,
    /// Most candidate terms a single bound combination may collect.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Width below which an isolating interval is accepted as a root.
    #[serde(default = "default_root_tolerance")]
    pub root_tolerance: f64,
}

fn default_max_root_degree() -> u32 {
    64
}

fn default_max_bound_depth() -> usize {
    32
}

fn default_max_candidates() -> usize {
    256
}

fn default_root_tolerance() -> f64 {
    1e-9
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_root_degree: default_max_root_degree(),
            max_bound_depth: default_max_bound_depth(),
            max_candidates: default_max_candidates(),
            root_tolerance: default_root_tolerance(),
        }
    }
}

fn serde_error(code: &str, err: impl std::fmt::Display) -> TermwitError {
    TermwitError::Serde(ErrorInfo::new(code, err.to_string()))
}

impl EngineConfig {
    /// Parses a configuration from YAML text; missing fields take defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, TermwitError> {
        let config: EngineConfig =
            serde_yaml::from_str(text).map_err(|err| serde_error("yaml_deserialize", err))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, TermwitError> {
        let text = fs::read_to_string(path).map_err(|err| {
            TermwitError::Serde(
                ErrorInfo::new("config_read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    fn validate(&self) -> Result<(), TermwitError> {
        if !(self.root_tolerance.is_finite() && self.root_tolerance > 0.0) {
            return Err(TermwitError::Serde(
                ErrorInfo::new("invalid_tolerance", "root_tolerance must be positive and finite")
                    .with_context("root_tolerance", self.root_tolerance.to_string()),
            ));
        }
        if self.max_candidates == 0 {
            return Err(TermwitError::Serde(ErrorInfo::new(
                "invalid_candidates",
                "max_candidates must be at least 1",
            )));
        }
        Ok(())
    }
}
