//! Version bookkeeping for schemas and components.

use crate::error::{StoreError, StoreResult};
use metastore_storage::Interface;

/// Records one version string per ID, directly on a key/value store.
#[derive(Debug, Clone)]
pub struct Versions<S> {
    store: S,
}

impl<S: Interface> Versions<S> {
    /// Creates a versions store over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the version recorded for `id`.
    ///
    /// # Errors
    ///
    /// Returns the storage not-found error if no version was recorded (see
    /// [`StoreError::is_not_found`]), or [`StoreError::Corrupted`] if the
    /// stored value is not UTF-8.
    pub fn get(&self, id: &str) -> StoreResult<String> {
        let kv = self.store.get(id)?;
        String::from_utf8(kv.value)
            .map_err(|_| StoreError::corrupted(kv.key, "version is not UTF-8"))
    }

    /// Records `version` for `id`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub fn set(&self, id: &str, version: &str) -> StoreResult<()> {
        self.store.put(id, version.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metastore_storage::MemStore;

    #[test]
    fn versions_get_set() {
        let versions = Versions::new(MemStore::new("versions").unwrap());

        let err = versions.get("tasks").unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_no_object_exists());

        versions.set("tasks", "1").unwrap();
        assert_eq!(versions.get("tasks").unwrap(), "1");

        versions.set("tasks", "2").unwrap();
        assert_eq!(versions.get("tasks").unwrap(), "2");
        assert!(versions.get("templates").unwrap_err().is_not_found());
    }

    #[test]
    fn versions_rejects_non_utf8() {
        let store = MemStore::new("versions").unwrap();
        store.put("bad", &[0xff, 0xfe]).unwrap();
        let versions = Versions::new(store);
        assert!(matches!(
            versions.get("bad").unwrap_err(),
            StoreError::Corrupted { .. }
        ));
    }
}
