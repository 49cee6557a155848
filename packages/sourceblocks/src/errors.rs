//! Error types for the source-block subsystem.
//!
//! Parse and profile failures are soft: they surface as values, get logged,
//! and the affected method falls back per the attribution rules. Internal
//! invariant breaks (id collisions, illegal leaf removal) are programming
//! errors and panic with a traceable message instead of passing through here.

use thiserror::Error;

/// Main error type for source-block operations
#[derive(Debug, Error)]
pub enum SourceBlockError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Open `(` without a matching `)`
    #[error("unterminated group at token {position}")]
    UnterminatedGroup { position: usize },

    /// A val token that is neither `x` nor `<float>:<float>`
    #[error("unparseable val token `{token}`")]
    UnparseableVal { token: String },

    /// Token stream and CFG traversal disagree in shape
    #[error("structure mismatch: {detail}")]
    StructureMismatch { detail: String },

    /// A val group has the wrong number of interaction entries
    #[error("value count mismatch: expected {expected}, found {found}")]
    ValueCountMismatch { expected: usize, found: usize },

    /// Malformed profile-file header
    #[error("bad profile header in {path}: {detail}")]
    ProfileHeader { path: String, detail: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Consistency violations upgraded to a hard failure by the harness
    #[error("source-block consistency violated in {method_count} method(s)")]
    ConsistencyViolated { method_count: usize },
}

impl SourceBlockError {
    pub fn structure(detail: impl Into<String>) -> Self {
        SourceBlockError::StructureMismatch {
            detail: detail.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        SourceBlockError::Config(msg.into())
    }
}

/// Result type alias for source-block operations
pub type Result<T> = std::result::Result<T, SourceBlockError>;
