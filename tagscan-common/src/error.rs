//! Common error types for tagscan

use thiserror::Error;

/// Common result type for tagscan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across tagscan crates
#[derive(Error, Debug)]
pub enum Error {
    /// Requested item or log entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write would break a uniqueness rule (duplicate tag or id)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or empty required field
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Operation exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Relational backend error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Key-value backend error (wraps redb::Error)
    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    /// Record encoding error in the key-value backend
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by callers that only care about the outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Timeout,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Database(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Config(_)
            | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

// redb returns a distinct error type per stage (open, transaction, table, commit).
macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(e: $ty) -> Self {
                    Error::Storage(e.into())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
