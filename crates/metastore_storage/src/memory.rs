//! In-memory storage backend for testing.
//!
//! [`MemDb`] keeps every bucket in one map guarded by a single mutex.
//! Transactions take that mutex for their whole lifetime and work on a
//! private copy of the map, so they are fully serialized: a second
//! transaction (or a direct read or write) blocks until the first one
//! commits or rolls back. Commit swaps the copy in; rollback drops it.
//!
//! This is stricter than [`crate::EmbeddedDb`], where readers never wait
//! for a writer. Code that passes against `MemDb` cannot rely on reads
//! running concurrently with an open write transaction.

use crate::backend::{BucketPath, Engine, Interface, ReadOnlyTx, ReadOperator, Tx};
use crate::error::{StorageError, StorageResult};
use crate::kv::KeyValue;
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

type Bucket = BTreeMap<String, Vec<u8>>;
type Buckets = BTreeMap<String, Bucket>;

/// An in-memory engine.
///
/// Cloning a `MemDb` shares the same data.
///
/// # Example
///
/// ```rust
/// use metastore_storage::{Engine, Interface, MemDb, ReadOperator};
///
/// let db = MemDb::new();
/// let store = db.store("tasks").unwrap();
/// store.put("t1", b"pending").unwrap();
/// assert_eq!(store.get("t1").unwrap().value, b"pending");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemDb {
    buckets: Arc<Mutex<Buckets>>,
}

impl MemDb {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of buckets holding at least one key.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().values().filter(|b| !b.is_empty()).count()
    }
}

impl Engine for MemDb {
    type Store = MemStore;

    fn store_in(&self, path: &[&str]) -> StorageResult<MemStore> {
        Ok(MemStore {
            bucket: BucketPath::new(path)?,
            buckets: Arc::clone(&self.buckets),
        })
    }
}

/// A bucket of a [`MemDb`].
#[derive(Debug, Clone)]
pub struct MemStore {
    bucket: BucketPath,
    buckets: Arc<Mutex<Buckets>>,
}

impl MemStore {
    /// Creates a store over a fresh, private engine.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidBucket`] if `name` is not a valid
    /// bucket name.
    pub fn new(name: &str) -> StorageResult<Self> {
        MemDb::new().store(name)
    }

    /// Returns the bucket path of this store.
    #[must_use]
    pub fn bucket(&self) -> &BucketPath {
        &self.bucket
    }

    fn begin(&self) -> MemTx<'_> {
        let guard = self.buckets.lock();
        let copy = guard.clone();
        MemTx {
            guard,
            copy,
            bucket: &self.bucket,
        }
    }
}

impl ReadOperator for MemStore {
    fn get(&self, key: &str) -> StorageResult<KeyValue> {
        get_in(&self.buckets.lock(), &self.bucket, key)
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(exists_in(&self.buckets.lock(), &self.bucket, key))
    }

    fn list(&self, prefix: &str) -> StorageResult<Vec<KeyValue>> {
        Ok(list_in(&self.buckets.lock(), &self.bucket, prefix))
    }

    fn buckets(&self) -> StorageResult<Vec<String>> {
        Ok(children_in(&self.buckets.lock(), &self.bucket))
    }
}

impl Interface for MemStore {
    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        put_in(&mut self.buckets.lock(), &self.bucket, key, value);
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        delete_in(&mut self.buckets.lock(), &self.bucket, key);
        Ok(())
    }

    fn begin_tx(&self) -> StorageResult<Box<dyn Tx + '_>> {
        Ok(Box::new(self.begin()))
    }

    fn begin_read_only_tx(&self) -> StorageResult<Box<dyn ReadOnlyTx + '_>> {
        Ok(Box::new(self.begin()))
    }
}

/// A transaction over a [`MemStore`].
///
/// Holds the engine lock until it is committed, rolled back or dropped.
struct MemTx<'a> {
    guard: MutexGuard<'a, Buckets>,
    copy: Buckets,
    bucket: &'a BucketPath,
}

impl ReadOperator for MemTx<'_> {
    fn get(&self, key: &str) -> StorageResult<KeyValue> {
        get_in(&self.copy, self.bucket, key)
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(exists_in(&self.copy, self.bucket, key))
    }

    fn list(&self, prefix: &str) -> StorageResult<Vec<KeyValue>> {
        Ok(list_in(&self.copy, self.bucket, prefix))
    }

    fn buckets(&self) -> StorageResult<Vec<String>> {
        Ok(children_in(&self.copy, self.bucket))
    }
}

impl Tx for MemTx<'_> {
    fn put(&mut self, key: &str, value: &[u8]) -> StorageResult<()> {
        put_in(&mut self.copy, self.bucket, key, value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> StorageResult<()> {
        delete_in(&mut self.copy, self.bucket, key);
        Ok(())
    }

    fn delete_bucket(&mut self, name: &str) -> StorageResult<()> {
        let child = self.bucket.child(name)?;
        self.copy.retain(|encoded, _| !child.contains(encoded));
        Ok(())
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        let MemTx {
            mut guard, copy, ..
        } = *self;
        *guard = copy;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

impl ReadOnlyTx for MemTx<'_> {
    fn rollback(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

fn get_in(buckets: &Buckets, bucket: &BucketPath, key: &str) -> StorageResult<KeyValue> {
    buckets
        .get(bucket.as_str())
        .and_then(|b| b.get(key))
        .map(|value| KeyValue::new(key, value.clone()))
        .ok_or_else(|| StorageError::no_key(key))
}

fn exists_in(buckets: &Buckets, bucket: &BucketPath, key: &str) -> bool {
    buckets
        .get(bucket.as_str())
        .is_some_and(|b| b.contains_key(key))
}

fn list_in(buckets: &Buckets, bucket: &BucketPath, prefix: &str) -> Vec<KeyValue> {
    let Some(b) = buckets.get(bucket.as_str()) else {
        return Vec::new();
    };
    b.range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| KeyValue::new(key.clone(), value.clone()))
        .collect()
}

fn children_in(buckets: &Buckets, bucket: &BucketPath) -> Vec<String> {
    buckets
        .keys()
        .filter_map(|encoded| bucket.child_name(encoded))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn put_in(buckets: &mut Buckets, bucket: &BucketPath, key: &str, value: &[u8]) {
    buckets
        .entry(bucket.as_str().to_string())
        .or_default()
        .insert(key.to_string(), value.to_vec());
}

fn delete_in(buckets: &mut Buckets, bucket: &BucketPath, key: &str) {
    if let Some(b) = buckets.get_mut(bucket.as_str()) {
        b.remove(key);
    }
}
