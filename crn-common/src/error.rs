//! Common error types for CRN

use thiserror::Error;

/// Common result type for CRN operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across CRN services
#[derive(Error, Debug)]
pub enum Error {
    /// No usable phone, email or address to hash or match. Callers skip, never retry.
    #[error("No identifiable contact information")]
    NoIdentifiableContact,

    /// Uniqueness constraint rejected a write (resolved internally by re-reading)
    #[error("Duplicate key conflict: {0}")]
    DuplicateKeyConflict(String),

    /// Store operation failed (wraps sqlx::Error)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .map(|db_err| db_err.is_unique_violation())
            .unwrap_or(false);

        if unique_violation {
            Error::DuplicateKeyConflict(err.to_string())
        } else {
            Error::StoreUnavailable(err)
        }
    }
}

impl Error {
    /// True for SQLite lock contention, which is worth retrying
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::StoreUnavailable(err) => {
                let msg = err.to_string();
                msg.contains("database is locked") || msg.contains("database table is locked")
            }
            _ => false,
        }
    }
}
