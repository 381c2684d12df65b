//! Search backend and lifecycle error types.

use thiserror::Error;

use tagbot_types::TagbotError;

/// Errors raised by a search backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with an unexpected status
    #[error("Unexpected status {status} from {operation}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// A bounded wait expired
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Write attempted on an index with a write block
    #[error("Index is write-blocked: {0}")]
    WriteBlocked(String),

    #[error("Index not found: {0}")]
    IndexMissing(String),

    #[error("Index already exists: {0}")]
    IndexExists(String),

    /// Operation is not valid in the index's current state
    #[error("Invalid index state: {0}")]
    InvalidState(String),

    /// Schema document is malformed
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A blocking backend task panicked or was cancelled
    #[error("Backend task failed: {0}")]
    Task(String),

    /// Response body did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Types(#[from] TagbotError),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// Errors that stop the index lifecycle manager.
///
/// Every variant is fatal at startup; nothing here is retried.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A backup index is already present and may hold unreconciled data
    #[error("Backup index \"{0}\" already exists; refusing to migrate because it might contain data")]
    BackupExists(String),

    /// The cloned backup did not become healthy in time
    #[error("Backup index \"{index}\" did not become healthy within {timeout_secs}s")]
    HealthTimeout { index: String, timeout_secs: u64 },

    #[error("Search backend error: {0}")]
    Backend(#[from] BackendError),

    /// Reading or writing the persisted schema hash failed
    #[error("Schema hash store error: {0}")]
    HashStore(String),

    /// Provisioning the service user failed
    #[error("Provisioning error: {0}")]
    Provisioning(String),
}

impl LifecycleError {
    /// Whether this is the backup-exists conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LifecycleError::BackupExists(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, LifecycleError::HealthTimeout { .. })
    }
}
