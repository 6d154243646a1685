//! Storage service: one engine, its stores, registrar and versions.

use crate::error::StoreResult;
use crate::index::IndexedStoreConfig;
use crate::indexed::IndexedStore;
use crate::object::BinaryObject;
use crate::registrar::{Registrar, StoreActioner};
use crate::versions::Versions;
use metastore_storage::{EmbeddedDb, Engine, MemDb, Snapshot, StorageConfig};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Bucket holding the [`Versions`] store.
pub const VERSIONS_BUCKET: &str = "versions";

/// Owns a storage engine and hands out per-namespace stores.
///
/// Every [`IndexedStore`] opened through [`StorageService::indexed_store`]
/// is registered with the shared [`Registrar`] under its key prefix.
pub struct StorageService<E: Engine> {
    engine: E,
    registrar: Arc<Registrar>,
    versions: Versions<E::Store>,
}

impl<E: Engine + std::fmt::Debug> std::fmt::Debug for StorageService<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("engine", &self.engine)
            .field("registrar", &self.registrar)
            .finish_non_exhaustive()
    }
}

impl StorageService<EmbeddedDb> {
    /// Opens the embedded database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the database cannot be opened.
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        let service = Self::with_engine(EmbeddedDb::open(config)?)?;
        info!(path = %config.path.display(), "storage service started");
        Ok(service)
    }

    /// Returns the database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.engine.path()
    }

    /// Takes a consistent snapshot of the database file.
    ///
    /// # Errors
    ///
    /// See [`EmbeddedDb::backup`].
    pub fn backup(&self) -> StoreResult<Snapshot> {
        Ok(self.engine.backup()?)
    }
}

impl StorageService<MemDb> {
    /// Creates a service over a fresh in-memory engine.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches [`StorageService::open`].
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_engine(MemDb::new())
    }
}

impl<E: Engine> StorageService<E> {
    /// Creates a service over `engine`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the versions bucket cannot be opened.
    pub fn with_engine(engine: E) -> StoreResult<Self> {
        let versions = Versions::new(engine.store(VERSIONS_BUCKET)?);
        Ok(Self {
            engine,
            registrar: Arc::new(Registrar::new()),
            versions,
        })
    }

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns the store for the top-level bucket `namespace`.
    ///
    /// # Errors
    ///
    /// Returns a storage error for an invalid bucket name.
    pub fn store(&self, namespace: &str) -> StoreResult<E::Store> {
        Ok(self.engine.store(namespace)?)
    }

    /// Returns the store for a nested bucket path.
    ///
    /// # Errors
    ///
    /// Returns a storage error for an invalid bucket path.
    pub fn store_in(&self, path: &[&str]) -> StoreResult<E::Store> {
        Ok(self.engine.store_in(path)?)
    }

    /// Returns the versions store.
    #[must_use]
    pub fn versions(&self) -> &Versions<E::Store> {
        &self.versions
    }

    /// Returns the shared registrar.
    #[must_use]
    pub fn registrar(&self) -> &Arc<Registrar> {
        &self.registrar
    }

    /// Registers `store` under `name`.
    pub fn register(&self, name: impl Into<String>, store: Arc<dyn StoreActioner>) {
        self.registrar.register(name, store);
    }

    /// Opens an [`IndexedStore`] in bucket `namespace` and registers it
    /// under its key prefix.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid bucket name or configuration.
    pub fn indexed_store<O>(
        &self,
        namespace: &str,
        config: IndexedStoreConfig<O>,
    ) -> StoreResult<Arc<IndexedStore<E::Store, O>>>
    where
        E::Store: 'static,
        O: BinaryObject + 'static,
    {
        let store = Arc::new(IndexedStore::new(self.store(namespace)?, config)?);
        let name = store.prefix().to_string();
        self.register(name, store.clone());
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::index::Index;
    use metastore_storage::{Interface, ReadOperator};

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: String,
        body: String,
    }

    impl BinaryObject for Note {
        fn object_id(&self) -> &str {
            &self.id
        }

        fn marshal_binary(&self) -> StoreResult<Vec<u8>> {
            Ok(format!("{}|{}", self.id, self.body).into_bytes())
        }

        fn unmarshal_binary(data: &[u8]) -> StoreResult<Self> {
            let text = std::str::from_utf8(data).map_err(|e| StoreError::codec(e.to_string()))?;
            let (id, body) = text
                .split_once('|')
                .ok_or_else(|| StoreError::codec("missing separator"))?;
            Ok(Note {
                id: id.into(),
                body: body.into(),
            })
        }
    }

    #[test]
    fn service_indexed_store_is_registered() {
        let service = StorageService::in_memory().unwrap();
        let notes = service
            .indexed_store(
                "notes",
                IndexedStoreConfig::new("notes")
                    .with_index(Index::new("body", |n: &Note| Ok(n.body.clone()))),
            )
            .unwrap();

        notes
            .create(&Note {
                id: "n1".into(),
                body: "hello".into(),
            })
            .unwrap();

        assert_eq!(service.registrar().list(), vec!["notes"]);
        service.registrar().get("notes").unwrap().rebuild().unwrap();
        assert_eq!(notes.list("body", "hel*", 0, None).unwrap().len(), 1);
    }

    #[test]
    fn service_versions_live_in_their_bucket() {
        let service = StorageService::in_memory().unwrap();
        service.versions().set("notes", "3").unwrap();
        assert_eq!(service.versions().get("notes").unwrap(), "3");

        let raw = service.store(VERSIONS_BUCKET).unwrap();
        assert_eq!(raw.get("notes").unwrap().value, b"3");
        assert!(!service.store("notes").unwrap().exists("notes").unwrap());
    }

    #[test]
    fn service_store_rejects_bad_namespace() {
        let service = StorageService::in_memory().unwrap();
        assert!(service.store("").is_err());
        assert!(service.store_in(&[]).is_err());
    }

    #[test]
    fn service_embedded_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.db");
        let service = StorageService::open(&StorageConfig::new(&path)).unwrap();
        assert_eq!(service.path(), path.as_path());

        service.store("notes").unwrap().put("k", b"v").unwrap();
        let snapshot = service.backup().unwrap();
        let size = snapshot.size();
        let mut out = Vec::new();
        assert_eq!(snapshot.write_to(&mut out).unwrap(), size);
        assert_eq!(out.len() as u64, size);
    }
}
