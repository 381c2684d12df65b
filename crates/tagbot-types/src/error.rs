//! Error types for the tagbot system.

use thiserror::Error;

/// Unified error type for shared type operations.
#[derive(Debug, Error)]
pub enum TagbotError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
