//! Core error types for questgate-core.
//!
//! Settlement callers only ever see [`SettlementError`]. The storage and
//! configuration layers have their own enums. [`CoreError`] folds all of
//! them together with JSON output errors for the CLI's command handlers.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for questgate-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Session lifecycle and settlement errors
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the session ledger and the settlement orchestrator.
///
/// None of these are fatal to the process; each is local to one attempt.
#[derive(Error, Debug)]
pub enum SettlementError {
    /// Caller supplied a value that cannot be used. Rejected before any write.
    #[error("Invalid value for '{field}': {message}")]
    InvalidInput { field: String, message: String },

    /// The record does not exist or is not owned by the caller.
    #[error("Not found")]
    NotFound,

    /// The session already has an end time and outcome.
    #[error("Session already closed")]
    AlreadyClosed,

    /// Transient persistence failure. Nothing was applied and the session is
    /// still open.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
}

impl SettlementError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        SettlementError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Whether the same request may be sent again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettlementError::StorageUnavailable(_))
    }
}

impl From<StoreError> for SettlementError {
    fn from(err: StoreError) -> Self {
        SettlementError::StorageUnavailable(err)
    }
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Another writer holds the database
    #[error("Database is busy")]
    Busy,

    /// A stored row could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Filesystem errors around the database file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend refused the operation (used by the in-memory store)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Could not determine or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StoreError::Busy
            }
            rusqlite::Error::FromSqlConversionFailure(..) => StoreError::Corrupt(err.to_string()),
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_errors_display_unwrapped() {
        let err = CoreError::from(SettlementError::AlreadyClosed);
        assert_eq!(err.to_string(), "Session already closed");
    }

    #[test]
    fn only_storage_failures_are_retryable() {
        assert!(SettlementError::from(StoreError::Busy).is_retryable());
        assert!(!SettlementError::NotFound.is_retryable());
        assert!(!SettlementError::invalid("quality", "bad").is_retryable());
    }
}
