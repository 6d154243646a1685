//! Test fixtures and database helpers.
//!
//! Provides a JSON-encoded test object, temporary engines, and the
//! [`backend_tests!`](crate::backend_tests) macro that runs one test body
//! against every engine.

use metastore_core::{
    version_json_decode, version_json_encode, BinaryObject, Index, IndexedStore,
    IndexedStoreConfig, StoreError, StoreResult,
};
use metastore_storage::{EmbeddedDb, Engine, MemDb};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::TempDir;

/// Name of the date index of [`test_store_config`].
pub const DATE_INDEX: &str = "date";

/// Envelope version written by [`TestObject::marshal_binary`].
pub const TEST_OBJECT_VERSION: u32 = 1;

/// A small object with an ID, a payload and an ISO-8601 date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestObject {
    /// Object ID.
    pub id: String,
    /// Free-form payload.
    pub value: String,
    /// Date as `YYYY-MM-DD`, so string order is chronological.
    pub date: String,
}

impl TestObject {
    /// Creates a test object.
    pub fn new(id: impl Into<String>, value: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            date: date.into(),
        }
    }
}

impl BinaryObject for TestObject {
    fn object_id(&self) -> &str {
        &self.id
    }

    fn marshal_binary(&self) -> StoreResult<Vec<u8>> {
        version_json_encode(TEST_OBJECT_VERSION, self)
    }

    fn unmarshal_binary(data: &[u8]) -> StoreResult<Self> {
        version_json_decode(data, |version, value| match version {
            TEST_OBJECT_VERSION => Ok(serde_json::from_value(value)?),
            other => Err(StoreError::codec(format!(
                "unsupported test object version {other}"
            ))),
        })
    }
}

/// The default config plus a non-unique [`DATE_INDEX`].
pub fn test_store_config(prefix: &str) -> IndexedStoreConfig<TestObject> {
    IndexedStoreConfig::new(prefix).with_index(Index::new(DATE_INDEX, |o: &TestObject| {
        Ok(o.date.clone())
    }))
}

/// Opens an indexed store of [`TestObject`]s in bucket `namespace`, using
/// `namespace` as the key prefix too.
pub fn test_indexed_store<E: Engine>(
    engine: &E,
    namespace: &str,
) -> IndexedStore<E::Store, TestObject> {
    let store = engine.store(namespace).expect("Failed to open store");
    IndexedStore::new(store, test_store_config(namespace)).expect("Invalid test config")
}

/// Returns a fresh in-memory engine.
pub fn mem_engine() -> MemDb {
    MemDb::new()
}

/// An embedded database in a temporary directory, removed on drop.
pub struct TempEmbeddedDb {
    /// The database instance.
    pub db: EmbeddedDb,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TempEmbeddedDb {
    /// Creates an empty database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = EmbeddedDb::open_path(temp_dir.path().join("meta.db"))
            .expect("Failed to open embedded database");
        Self {
            db,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Closes and reopens the database file.
    ///
    /// Every store handed out by the old handle must be dropped first.
    pub fn reopen(self) -> Self {
        let Self { db, _temp_dir } = self;
        let path = db.path().to_path_buf();
        drop(db);
        Self {
            db: EmbeddedDb::open_path(&path).expect("Failed to reopen embedded database"),
            _temp_dir,
        }
    }
}

impl Default for TempEmbeddedDb {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempEmbeddedDb {
    type Target = EmbeddedDb;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a fresh in-memory engine.
pub fn with_mem_db<F, R>(f: F) -> R
where
    F: FnOnce(&MemDb) -> R,
{
    f(&mem_engine())
}

/// Runs a test with a temporary embedded database.
pub fn with_embedded_db<F, R>(f: F) -> R
where
    F: FnOnce(&EmbeddedDb) -> R,
{
    let db = TempEmbeddedDb::new();
    f(&db)
}

/// Runs generic test bodies against every engine.
///
/// Each named function must have the shape `fn name<E: Engine>(engine: &E)`.
/// The macro emits one `#[test]` per function and engine, in modules `mem`
/// and `embedded`.
///
/// ```rust,ignore
/// fn put_then_get<E: Engine>(engine: &E) {
///     let store = engine.store("t").unwrap();
///     store.put("k", b"v").unwrap();
///     assert_eq!(store.get("k").unwrap().value, b"v");
/// }
///
/// metastore_testkit::backend_tests!(put_then_get);
/// ```
#[macro_export]
macro_rules! backend_tests {
    ($($name:ident),+ $(,)?) => {
        mod mem {
            $(
                #[test]
                fn $name() {
                    super::$name(&$crate::fixtures::mem_engine());
                }
            )+
        }

        mod embedded {
            $(
                #[test]
                fn $name() {
                    let db = $crate::fixtures::TempEmbeddedDb::new();
                    super::$name(&db.db);
                }
            )+
        }
    };
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use metastore_storage::Interface;

    /// Creates objects `1..=count` with IDs zero-padded to two digits, so
    /// ID order matches numeric order.
    pub fn populate<S: Interface>(store: &IndexedStore<S, TestObject>, count: usize) {
        for i in 1..=count {
            let object = TestObject::new(format!("{i:02}"), format!("value-{i}"), "2020-01-01");
            store.create(&object).expect("Failed to create object");
        }
    }

    /// Returns the IDs of `objects` in order.
    pub fn ids(objects: &[TestObject]) -> Vec<String> {
        objects.iter().map(|o| o.id.clone()).collect()
    }
}
