//! Subcommand implementations.

pub mod analyze;
pub mod bounds;

use std::path::Path;

use termwit_core::errors::TermwitError;
use termwit_core::EngineConfig;

/// Engine limits from `path`, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, TermwitError> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    }
}
