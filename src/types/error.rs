//! Error types for the search-deploy library.

use thiserror::Error;

/// All errors that can occur while deploying or querying search indices.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Worker pool size below 1.
    #[error("Cannot run with concurrency {0}, must be at least 1")]
    InvalidConcurrency(usize),

    /// Batch size below 1.
    #[error("Cannot run with batch size {0}, must be at least 1")]
    InvalidBatchSize(usize),

    /// Index name not present in the registry.
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Target index or alias does not exist on the engine.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Index already exists on the engine.
    #[error("Index already exists: {0}")]
    IndexExists(String),

    /// The engine refused a bulk request.
    #[error("Bulk request rejected by {index}: {reason}")]
    BulkRejected { index: String, reason: String },

    /// The engine could not be reached.
    #[error("Search engine unavailable: {0}")]
    Unavailable(String),

    /// The alias update for a logical index failed.
    #[error("Alias swap failed for {alias}: {reason}")]
    AliasSwap { alias: String, reason: String },

    /// A structured search filter could not be translated.
    #[error("Malformed search filter: {0}")]
    MalformedFilter(String),

    /// A search filter references an account that does not exist.
    #[error("Account {0} not found")]
    UnknownAccount(u64),

    /// The record source failed.
    #[error("Record source error: {0}")]
    Source(String),

    /// An index could not be fully imported, so it was not promoted.
    #[error("Import of {index} did not finish: {reason}")]
    ImportFailed { index: String, reason: String },

    /// Another deploy run holds the lock file.
    #[error("Another deploy is running (lock {path} held by pid {holder})")]
    DeployLocked { path: String, holder: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parse error.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SyncError {
    /// Errors that must be reported before any work starts.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConcurrency(_)
                | Self::InvalidBatchSize(_)
                | Self::UnknownIndex(_)
                | Self::Config(_)
                | Self::Toml(_)
        )
    }

    /// Errors caused by the caller's search request rather than the system.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::MalformedFilter(_) | Self::UnknownAccount(_))
    }

    /// Process exit status for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            e if e.is_config_error() => 2,
            e if e.is_bad_request() => 3,
            Self::AliasSwap { .. } => 4,
            Self::ImportFailed { .. } => 6,
            Self::DeployLocked { .. } => 7,
            _ => 5,
        }
    }
}

/// Convenience result type for search-deploy operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_taxonomy() {
        let io = SyncError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.exit_code(), 1);
        assert_eq!(SyncError::InvalidConcurrency(0).exit_code(), 2);
        assert_eq!(SyncError::UnknownAccount(9).exit_code(), 3);
        let swap = SyncError::AliasSwap {
            alias: "tags".to_string(),
            reason: "timed out".to_string(),
        };
        assert_eq!(swap.exit_code(), 4);
        assert_eq!(SyncError::Source("replica".to_string()).exit_code(), 5);
        let import = SyncError::ImportFailed {
            index: "statuses".to_string(),
            reason: "replica".to_string(),
        };
        assert_eq!(import.exit_code(), 6);
        let locked = SyncError::DeployLocked {
            path: "engine.lock".to_string(),
            holder: "42".to_string(),
        };
        assert_eq!(locked.exit_code(), 7);
    }
}
