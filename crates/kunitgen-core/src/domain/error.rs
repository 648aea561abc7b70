//! Error taxonomy for kunitgen.

use std::path::PathBuf;

/// Brace structure problems found while carving out a definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("no opening delimiter at or after offset {from}")]
    NoOpeningDelimiter { from: usize },

    #[error("unbalanced delimiters: block opened at offset {opened_at} never closes")]
    UnbalancedDelimiters { opened_at: usize },
}

/// Failures of the text-generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generator returned an error placeholder: {0}")]
    Placeholder(String),

    #[error("generator returned an empty response")]
    EmptyResponse,
}

/// Failures of the external verifier.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The verifier ran (or tried to) but left no log behind.
    #[error("verification unavailable: no log at {}", path.display())]
    Unavailable { path: PathBuf },

    #[error("verifier invocation failed: {0}")]
    Invocation(String),

    #[error("verifier timed out after {seconds} seconds")]
    TimedOut { seconds: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// kunitgen errors.
#[derive(Debug, thiserror::Error)]
pub enum KunitgenError {
    #[error("structure error: {0}")]
    Structure(#[from] StructureError),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("verify error: {0}")]
    Verify(#[from] VerifyError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no source text supplied")]
    NoSourceText,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for kunitgen operations.
pub type Result<T> = std::result::Result<T, KunitgenError>;
