//! Source location tracking

use serde::{Deserialize, Serialize};

/// Position of a declaration or operation in its source file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceInfo {
    pub line: u32,
    pub column: u32,
    pub pos: usize,
    pub span: usize,
}

impl SourceInfo {
    pub fn new(line: u32, column: u32, pos: usize, span: usize) -> Self {
        Self {
            line,
            column,
            pos,
            span,
        }
    }

    /// Placeholder for operations synthesized by the emitter itself
    pub fn synthetic() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
