//! Core error types for cardpomo-core.
//!
//! Transition errors are recoverable and never reach the user: the service
//! turns them into ignored outcomes. Store and config errors are fatal to the
//! operation that raised them.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::Phase;

/// Core error type for cardpomo-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Persistence store errors.
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

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Stored session document could not be decoded
    #[error("Corrupt session document for owner '{owner}': {message}")]
    Corrupt { owner: String, message: String },

    /// Compare-and-swap kept losing against concurrent writers
    #[error("Session for owner '{owner}' changed concurrently {attempts} times; giving up")]
    Conflict { owner: String, attempts: u32 },

    /// Store lock poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home/config directory could not be prepared
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// A session transition whose precondition does not hold.
///
/// Always recoverable; callers treat it as "ignore the click".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("session is bound to card '{bound}', not '{requested}'")]
    CardMismatch { bound: String, requested: String },

    #[error("a work phase is already running")]
    AlreadyRunning,

    #[error("session is not running")]
    NotRunning,

    #[error("session is already running")]
    NotSuspended,

    #[error("session is idle")]
    Idle,

    #[error("phase has time left ({remaining_ms} ms)")]
    NotDue { remaining_ms: u64 },

    #[error("a card can only be bound while working, phase is {phase:?}")]
    BindOutsideWork { phase: Phase },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
