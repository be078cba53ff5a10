//! Error types for Tabula

use thiserror::Error;

/// Main error type for Tabula
#[derive(Error, Debug)]
pub enum TabulaError {
    #[error("Invalid transition: cannot step from terminal state {0}")]
    TerminalTransition(String),

    #[error("Episode timeout: no terminal state after {steps} steps")]
    EpisodeTimeout { steps: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Tabula operations
pub type Result<T> = std::result::Result<T, TabulaError>;
