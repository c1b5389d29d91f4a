//! Error types and diagnostics

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, MirError>;

/// A file/line pair attached to a checker diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

/// One semantic rejection reported by the checker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub location: Option<SourceLocation>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            location: Some(location),
            message: message.into(),
        }
    }

    /// A diagnostic with no source position (driver-level failures)
    pub fn unlocated(message: impl Into<String>) -> Self {
        Self {
            location: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}:{}: {}", loc.file, loc.line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// MIR construction error
#[derive(Debug, Error)]
pub enum MirError {
    /// The assembly was discarded because errors were reported
    #[error("MIR construction rejected with {} error(s)", .0.len())]
    Rejected(Vec<Diagnostic>),

    /// Raised by a checker callback; aborts the remaining fixpoint work
    #[error("Hard failure while processing `{key}`: {message}")]
    HardFailure { key: String, message: String },

    #[error("Config error: {message}")]
    Config { message: String },

    #[error("Serialization error: {message}")]
    Serialize { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl MirError {
    pub fn hard_failure(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HardFailure {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn serialize_error(message: impl Into<String>) -> Self {
        Self::Serialize {
            message: message.into(),
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Diagnostics carried by a rejection, empty for every other kind
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Rejected(diags) => diags,
            Self::HardFailure { .. }
            | Self::Config { .. }
            | Self::Serialize { .. }
            | Self::Io { .. } => &[],
        }
    }
}

impl From<serde_json::Error> for MirError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialize_error(err.to_string())
    }
}

impl From<std::io::Error> for MirError {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display_with_location() {
        let d = Diagnostic::new(SourceLocation::new("main.bsq", 12), "unknown type `Foo`");
        assert_eq!(d.to_string(), "main.bsq:12: unknown type `Foo`");
    }

    #[test]
    fn test_diagnostic_display_unlocated() {
        let d = Diagnostic::unlocated("fixpoint did not converge");
        assert_eq!(d.to_string(), "fixpoint did not converge");
    }

    #[test]
    fn test_rejected_message_counts_errors() {
        let err = MirError::Rejected(vec![
            Diagnostic::unlocated("a"),
            Diagnostic::unlocated("b"),
        ]);
        assert_eq!(err.to_string(), "MIR construction rejected with 2 error(s)");
        assert_eq!(err.diagnostics().len(), 2);
    }

    #[test]
    fn test_hard_failure_has_no_diagnostics() {
        let err = MirError::hard_failure("NSMain::main", "boom");
        assert!(err.diagnostics().is_empty());
        assert!(err.to_string().contains("NSMain::main"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: MirError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, MirError::Serialize { .. }));
    }
}
