//! Error types for the indexed store layer.

use metastore_storage::StorageError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An object with this ID is already stored.
    #[error("object already exists: {id:?}")]
    ObjectExists {
        /// The conflicting object ID.
        id: String,
    },

    /// No object with this ID is stored.
    #[error("no object exists: {id:?}")]
    NoObjectExists {
        /// The missing object ID.
        id: String,
    },

    /// The object ID cannot be used as a key component.
    #[error("invalid object id {id:?}: {reason}")]
    InvalidObjectId {
        /// The rejected ID.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The store configuration is invalid.
    #[error("invalid store config: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The named index is not configured on this store.
    #[error("unknown index: {name:?}")]
    UnknownIndex {
        /// The requested index name.
        name: String,
    },

    /// A unique index value is already held by another object.
    #[error("index {index:?} value {value:?} already belongs to object {owner:?}")]
    IndexConflict {
        /// The unique index.
        index: String,
        /// The contested derived value.
        value: String,
        /// The object currently holding the value.
        owner: String,
    },

    /// An object could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored entry is not in the expected shape.
    #[error("corrupted entry {key:?}: {message}")]
    Corrupted {
        /// The offending key.
        key: String,
        /// Description of the problem.
        message: String,
    },
}

impl StoreError {
    /// Creates an object exists error.
    pub fn object_exists(id: impl Into<String>) -> Self {
        Self::ObjectExists { id: id.into() }
    }

    /// Creates a no object exists error.
    pub fn no_object_exists(id: impl Into<String>) -> Self {
        Self::NoObjectExists { id: id.into() }
    }

    /// Creates an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a corruption error for `key`.
    pub fn corrupted(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns true for [`StoreError::ObjectExists`].
    #[must_use]
    pub fn is_object_exists(&self) -> bool {
        matches!(self, Self::ObjectExists { .. })
    }

    /// Returns true for [`StoreError::NoObjectExists`].
    #[must_use]
    pub fn is_no_object_exists(&self) -> bool {
        matches!(self, Self::NoObjectExists { .. })
    }

    /// Returns true if this error reports something absent, at either the
    /// object or the raw key layer.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NoObjectExists { .. } => true,
            Self::Storage(err) => err.is_not_found(),
            _ => false,
        }
    }
}
