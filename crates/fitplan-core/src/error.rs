//! Core error types for fitplan-core.
//!
//! Each layer gets its own thiserror enum; [`CoreError`] wraps the ones the
//! reminder service crosses (storage, settings, reconciliation).

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::reminder::ReminderId;

/// Core error type for fitplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Settings store errors
    #[error("Settings error: {0}")]
    Store(#[from] StoreError),

    /// Reconciliation failed as a whole
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
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

    /// A stored row could not be decoded
    #[error("Corrupt row in '{table}': {message}")]
    CorruptRow { table: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Settings store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Key is not one of the known settings
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),

    /// Backend failed to persist the value
    #[error("Failed to write setting '{key}': {message}")]
    WriteFailed { key: String, message: String },
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

    /// Key does not exist in the configuration tree
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to access the data directory
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A goal value outside its domain
    #[error("Value {value} for '{key}' is outside {min}..={max}")]
    OutOfRange {
        key: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Invalid wall-clock time
    #[error("Invalid time of day {hour:02}:{minute:02}")]
    InvalidTimeOfDay { hour: u32, minute: u32 },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors raised by an alarm facility for a single reminder.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum AlarmError {
    /// The facility refused the registration (permission revoked, quota exceeded)
    #[error("Alarm refused: {0}")]
    Refused(String),

    /// The facility could not be reached
    #[error("Alarm facility unavailable: {0}")]
    Unavailable(String),
}

/// Ledger (durable registration set) errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger storage error: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Ledger lock poisoned")]
    Poisoned,
}

/// Whole-operation reconciliation failures.
///
/// Per-reminder registration failures are not errors at this level; they are
/// collected into the report.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Nothing was sent to the alarm facility; the previous ledger is untouched.
    #[error("Reconciliation aborted before any alarm call: {0}")]
    Aborted(#[source] LedgerError),

    /// Alarm calls were made but the final registration set could not be
    /// persisted. The write-ahead intent remains and the next run repairs it.
    #[error("Failed to persist registration set: {0}")]
    Persist(#[source] LedgerError),

    /// Another holder panicked while reconciling
    #[error("Registrar lock poisoned")]
    Poisoned,

    /// Background task failed to complete
    #[error("Background reconciliation task failed: {0}")]
    Join(String),
}

/// A reminder the alarm facility would not accept.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Registration failed for '{id}': {error}")]
pub struct RegistrationFailure {
    pub id: ReminderId,
    #[source]
    pub error: AlarmError,
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Storage(err.into())
    }
}

impl From<tokio::task::JoinError> for ReconcileError {
    fn from(err: tokio::task::JoinError) -> Self {
        ReconcileError::Join(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
