//! CLI command implementations.

pub mod backup;
pub mod inspect;

use metastore_storage::{EmbeddedDb, StorageConfig};
use std::path::Path;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The database file does not exist.
    #[error("no database found at {0:?}")]
    NotFound(String),

    /// The output file exists and `--force` was not given.
    #[error("{0:?} already exists; use --force to overwrite")]
    OutputExists(String),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] metastore_storage::StorageError),

    /// I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Opens an existing database file without creating it.
pub fn open_existing(path: &Path) -> CliResult<EmbeddedDb> {
    if !path.is_file() {
        return Err(CliError::NotFound(path.display().to_string()));
    }
    Ok(EmbeddedDb::open(
        &StorageConfig::new(path).create_if_missing(false),
    )?)
}
