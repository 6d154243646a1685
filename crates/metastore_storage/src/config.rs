//! Embedded database configuration.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for opening an [`crate::EmbeddedDb`].
///
/// Deserializes from a `[storage]` style table. The path key is also
/// accepted under its older name `boltdb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the database file.
    #[serde(alias = "boltdb")]
    pub path: PathBuf,

    /// Whether to create the database file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to create missing parent directories of `path`.
    pub create_dirs: bool,

    /// Page cache size in bytes. `None` uses the engine default.
    pub cache_size: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("metastore.db"),
            create_if_missing: true,
            create_dirs: false,
            cache_size: None,
        }
    }
}

impl StorageConfig {
    /// Creates a configuration for the database file at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Sets whether to create the file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to create missing parent directories.
    #[must_use]
    pub const fn create_dirs(mut self, value: bool) -> Self {
        self.create_dirs = value;
        self
    }

    /// Sets the page cache size in bytes.
    #[must_use]
    pub const fn cache_size(mut self, bytes: usize) -> Self {
        self.cache_size = Some(bytes);
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if the path is empty or names
    /// an existing directory, or if the cache size is zero.
    pub fn validate(&self) -> StorageResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(StorageError::InvalidConfig(
                "database path is empty".to_string(),
            ));
        }
        if self.path.is_dir() {
            return Err(StorageError::InvalidConfig(format!(
                "database path {} is a directory",
                self.path.display()
            )));
        }
        if self.cache_size == Some(0) {
            return Err(StorageError::InvalidConfig(
                "cache size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
