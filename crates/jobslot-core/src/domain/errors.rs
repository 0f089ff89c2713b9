//! Errors - エラー型と分類
//!
//! Only failures reach the caller as errors. A reservation that loses the
//! race is ordinary control flow and is reported as
//! [`Reservation::AlreadyTaken`](super::Reservation::AlreadyTaken).

use thiserror::Error;

/// Failure of the backing storage medium that is unrelated to the
/// uniqueness constraint (connectivity, permission, schema mismatch, ...).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt job record: {0}")]
    Corrupt(String),

    /// The job table of this namespace was dropped through another handle.
    #[error("job table for namespace '{0}' does not exist")]
    MissingTable(String),

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("storage task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),

    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("invalid work unit: {0}")]
    InvalidWorkUnit(String),

    #[error("invalid namespace '{0}': expected [A-Za-z0-9_-]+")]
    InvalidNamespace(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
