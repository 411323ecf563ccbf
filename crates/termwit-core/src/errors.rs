//! Structured error types shared across termwit crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`TermwitError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (symbols, operators, degrees, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the termwit engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum TermwitError {
    /// Input the engine does not support (operators, guard shapes, program kinds).
    #[error("unsupported input: {0}")]
    Input(ErrorInfo),
    /// Expression text that could not be parsed.
    #[error("parse error: {0}")]
    Parse(ErrorInfo),
    /// Well-formed input outside the reach of a particular analysis.
    #[error("unsupported configuration: {0}")]
    Unsupported(ErrorInfo),
    /// A configured resource budget was exhausted.
    #[error("budget exhausted: {0}")]
    Budget(ErrorInfo),
    /// Broken internal contract between collaborators.
    #[error("internal inconsistency: {0}")]
    Internal(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl TermwitError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            TermwitError::Input(info)
            | TermwitError::Parse(info)
            | TermwitError::Unsupported(info)
            | TermwitError::Budget(info)
            | TermwitError::Internal(info)
            | TermwitError::Serde(info) => info,
        }
    }

    /// Returns true when the error only limits what can be concluded, so the
    /// caller may downgrade the verdict to undetermined instead of aborting.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, TermwitError::Unsupported(_) | TermwitError::Budget(_))
    }
}
