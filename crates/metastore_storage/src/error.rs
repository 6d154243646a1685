//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested key does not exist.
    #[error("no key exists: {key:?}")]
    NoKeyExists {
        /// The key that was looked up.
        key: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The embedded engine reported an error.
    #[error("engine error: {0}")]
    Engine(#[from] redb::Error),

    /// A bucket name or namespace is not usable.
    #[error("invalid bucket name {name:?}: {reason}")]
    InvalidBucket {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A glob pattern could not be parsed.
    #[error("bad pattern {pattern:?}: {reason}")]
    BadPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Stored data is not in the expected shape.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The storage configuration is invalid.
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    /// Creates a not-found error for `key`.
    pub fn no_key(key: impl Into<String>) -> Self {
        Self::NoKeyExists { key: key.into() }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Returns true if this error reports an absent key.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoKeyExists { .. })
    }
}

macro_rules! engine_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StorageError {
                fn from(err: $ty) -> Self {
                    Self::Engine(redb::Error::from(err))
                }
            }
        )*
    };
}

engine_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
