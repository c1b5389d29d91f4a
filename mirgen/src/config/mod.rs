//! Emitter configuration
//!
//! Loaded from a TOML table; every field has a default so an empty file
//! (or no file) yields a working configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MirError, Result};

/// Names of the core types registered before any entry point is seeded
const DEFAULT_CORE_TYPES: &[&str] = &[
    "Any", "Some", "Truthy", "None", "Bool", "Int", "BigInt", "Float64", "String", "Regex",
];

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmitterConfig {
    /// Attribute marking a namespace function as a worklist root
    pub entrypoint_attribute: String,
    /// Namespace holding the builtin types
    pub core_namespace: String,
    /// Builtin types instantiated up front, by unqualified name
    pub core_types: Vec<String>,
    /// Upper bound on outer fixpoint rounds (unbounded when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fixpoint_rounds: Option<usize>,
    /// Fill in per-body variable types after the assembly is closed
    pub infer_var_types: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            entrypoint_attribute: "entrypoint".to_string(),
            core_namespace: "NSCore".to_string(),
            core_types: DEFAULT_CORE_TYPES.iter().map(|s| s.to_string()).collect(),
            max_fixpoint_rounds: None,
            infer_var_types: true,
        }
    }
}

impl EmitterConfig {
    /// Parse a configuration from TOML source
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| MirError::config_error(e.to_string()))
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| MirError::io_error(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Render back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MirError::config_error(e.to_string()))
    }

    /// Set the entrypoint attribute
    pub fn entrypoint_attribute(mut self, attr: impl Into<String>) -> Self {
        self.entrypoint_attribute = attr.into();
        self
    }

    /// Bound the number of outer fixpoint rounds
    pub fn max_fixpoint_rounds(mut self, rounds: usize) -> Self {
        self.max_fixpoint_rounds = Some(rounds);
        self
    }

    /// Enable or disable post-closure variable type inference
    pub fn infer_var_types(mut self, enable: bool) -> Self {
        self.infer_var_types = enable;
        self
    }

    /// Fully qualified name of a core type, e.g. `NSCore::Int`
    pub fn core_type_name(&self, name: &str) -> String {
        format!("{}::{}", self.core_namespace, name)
    }
}
