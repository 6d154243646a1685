//! Embedded single-file backend.
//!
//! Built on [`redb`]: one file, one writer at a time, readers that see a
//! consistent snapshot and never wait for the writer.
//!
//! Each bucket path maps to one engine table whose name is the encoded
//! [`BucketPath`]. Nested buckets are therefore sibling tables that share a
//! name prefix, and deleting a bucket deletes every table below it.

use crate::backend::{BucketPath, Engine, Interface, ReadOnlyTx, ReadOperator, Tx};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::kv::KeyValue;
use redb::{
    Database, ReadOnlyTable, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition,
    TableError, TableHandle, WriteTransaction,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

type KvTable<'a> = TableDefinition<'a, &'static str, &'static [u8]>;

fn table(name: &str) -> KvTable<'_> {
    TableDefinition::new(name)
}

/// A database file shared by any number of [`EmbeddedStore`]s.
///
/// Cloning an `EmbeddedDb` shares the open file.
///
/// # Example
///
/// ```no_run
/// use metastore_storage::{EmbeddedDb, Engine, Interface, StorageConfig};
///
/// let db = EmbeddedDb::open(&StorageConfig::new("meta.db")).unwrap();
/// let tasks = db.store("tasks").unwrap();
/// tasks.put("t1", b"enabled").unwrap();
/// ```
#[derive(Clone)]
pub struct EmbeddedDb {
    db: Arc<Database>,
    path: PathBuf,
}

impl fmt::Debug for EmbeddedDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedDb")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EmbeddedDb {
    /// Opens (or creates) the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the parent
    /// directory cannot be created, or the engine fails to open the file.
    pub fn open(config: &StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        if config.create_dirs {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let mut builder = Database::builder();
        if let Some(bytes) = config.cache_size {
            builder.set_cache_size(bytes);
        }
        let db = if config.create_if_missing {
            builder.create(&config.path)?
        } else {
            builder.open(&config.path)?
        };

        info!(path = %config.path.display(), "opened embedded database");
        Ok(Self {
            db: Arc::new(db),
            path: config.path.clone(),
        })
    }

    /// Opens (or creates) the database file at `path` with default settings.
    ///
    /// # Errors
    ///
    /// See [`EmbeddedDb::open`].
    pub fn open_path(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open(&StorageConfig::new(path))
    }

    /// Returns the path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns one entry per bucket in the file with its key count, sorted
    /// by bucket path.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the file cannot be read.
    pub fn bucket_stats(&self) -> StorageResult<Vec<BucketStats>> {
        let txn = self.db.begin_read()?;
        let mut stats = Vec::new();
        for handle in txn.list_tables()? {
            let name = handle.name().to_string();
            let t = txn.open_table(table(&name))?;
            let mut keys = 0u64;
            for entry in t.iter()? {
                entry?;
                keys += 1;
            }
            stats.push(BucketStats {
                bucket: BucketPath::decode(&name),
                keys,
            });
        }
        stats.sort_by(|a, b| a.bucket.cmp(&b.bucket));
        Ok(stats)
    }

    /// Starts a backup.
    ///
    /// The returned [`Snapshot`] holds the writer slot until it is written
    /// or dropped: readers keep running, writers wait.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer slot cannot be taken or the file
    /// cannot be opened for reading.
    pub fn backup(&self) -> StorageResult<Snapshot> {
        let txn = self.db.begin_write()?;
        let file = File::open(&self.path)?;
        let size = file.metadata()?.len();
        debug!(path = %self.path.display(), size, "backup snapshot taken");
        Ok(Snapshot { txn, file, size })
    }
}

impl Engine for EmbeddedDb {
    type Store = EmbeddedStore;

    fn store_in(&self, path: &[&str]) -> StorageResult<EmbeddedStore> {
        Ok(EmbeddedStore {
            db: Arc::clone(&self.db),
            bucket: BucketPath::new(path)?,
        })
    }
}

/// Key count of one bucket, as reported by [`EmbeddedDb::bucket_stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketStats {
    /// Bucket path, components joined with `/`.
    pub bucket: String,
    /// Number of keys stored directly in the bucket.
    pub keys: u64,
}

/// A consistent, byte-for-byte copy of the database file.
pub struct Snapshot {
    txn: WriteTransaction,
    file: File,
    size: u64,
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Snapshot {
    /// Returns the exact number of bytes [`Snapshot::write_to`] will emit.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Streams the file to `writer` and releases the writer slot.
    ///
    /// Returns the number of bytes written, always equal to
    /// [`Snapshot::size`] on success.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading or writing fails, or
    /// [`StorageError::Corrupted`] if the file ended early.
    pub fn write_to<W: Write + ?Sized>(self, writer: &mut W) -> StorageResult<u64> {
        let Snapshot { txn, file, size } = self;
        let copied = io::copy(&mut file.take(size), writer)?;
        txn.abort()?;
        if copied != size {
            return Err(StorageError::corrupted(format!(
                "snapshot truncated: wrote {copied} of {size} bytes"
            )));
        }
        info!(bytes = copied, "backup snapshot written");
        Ok(copied)
    }
}

/// One bucket of an [`EmbeddedDb`].
#[derive(Clone)]
pub struct EmbeddedStore {
    db: Arc<Database>,
    bucket: BucketPath,
}

impl fmt::Debug for EmbeddedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedStore")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl EmbeddedStore {
    /// Returns the bucket path of this store.
    #[must_use]
    pub fn bucket(&self) -> &BucketPath {
        &self.bucket
    }

    fn read(&self) -> StorageResult<EmbeddedReadOnlyTx<'_>> {
        Ok(EmbeddedReadOnlyTx {
            txn: self.db.begin_read()?,
            bucket: &self.bucket,
        })
    }

    fn write(&self) -> StorageResult<EmbeddedTx<'_>> {
        Ok(EmbeddedTx {
            txn: self.db.begin_write()?,
            bucket: &self.bucket,
        })
    }
}

impl ReadOperator for EmbeddedStore {
    fn get(&self, key: &str) -> StorageResult<KeyValue> {
        self.read()?.get(key)
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        self.read()?.exists(key)
    }

    fn list(&self, prefix: &str) -> StorageResult<Vec<KeyValue>> {
        self.read()?.list(prefix)
    }

    fn buckets(&self) -> StorageResult<Vec<String>> {
        self.read()?.buckets()
    }
}

impl Interface for EmbeddedStore {
    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let mut tx = self.write()?;
        tx.put(key, value)?;
        Tx::commit(Box::new(tx))
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let mut tx = self.write()?;
        tx.delete(key)?;
        Tx::commit(Box::new(tx))
    }

    fn begin_tx(&self) -> StorageResult<Box<dyn Tx + '_>> {
        Ok(Box::new(self.write()?))
    }

    fn begin_read_only_tx(&self) -> StorageResult<Box<dyn ReadOnlyTx + '_>> {
        Ok(Box::new(self.read()?))
    }
}

struct EmbeddedReadOnlyTx<'a> {
    txn: ReadTransaction,
    bucket: &'a BucketPath,
}

impl EmbeddedReadOnlyTx<'_> {
    fn open(&self) -> StorageResult<Option<ReadOnlyTable<&'static str, &'static [u8]>>> {
        match self.txn.open_table(table(self.bucket.as_str())) {
            Ok(t) => Ok(Some(t)),
            Err(TableError::TableDoesNotExist(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl ReadOperator for EmbeddedReadOnlyTx<'_> {
    fn get(&self, key: &str) -> StorageResult<KeyValue> {
        match self.open()? {
            Some(t) => get_from(&t, key),
            None => Err(StorageError::no_key(key)),
        }
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        let Some(t) = self.open()? else {
            return Ok(false);
        };
        let found = t.get(key)?.is_some();
        Ok(found)
    }

    fn list(&self, prefix: &str) -> StorageResult<Vec<KeyValue>> {
        match self.open()? {
            Some(t) => list_from(&t, prefix),
            None => Ok(Vec::new()),
        }
    }

    fn buckets(&self) -> StorageResult<Vec<String>> {
        let names = self.txn.list_tables()?.map(|h| h.name().to_string());
        Ok(children(self.bucket, names))
    }
}

impl ReadOnlyTx for EmbeddedReadOnlyTx<'_> {
    fn rollback(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

struct EmbeddedTx<'a> {
    txn: WriteTransaction,
    bucket: &'a BucketPath,
}

impl EmbeddedTx<'_> {
    fn table_names(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .txn
            .list_tables()?
            .map(|h| h.name().to_string())
            .collect())
    }

    // Opening a table for writing creates it, so reads check first.
    fn has_table(&self) -> StorageResult<bool> {
        Ok(self
            .txn
            .list_tables()?
            .any(|h| h.name() == self.bucket.as_str()))
    }
}

impl ReadOperator for EmbeddedTx<'_> {
    fn get(&self, key: &str) -> StorageResult<KeyValue> {
        if !self.has_table()? {
            return Err(StorageError::no_key(key));
        }
        let t = self.txn.open_table(table(self.bucket.as_str()))?;
        get_from(&t, key)
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        if !self.has_table()? {
            return Ok(false);
        }
        let t = self.txn.open_table(table(self.bucket.as_str()))?;
        let found = t.get(key)?.is_some();
        Ok(found)
    }

    fn list(&self, prefix: &str) -> StorageResult<Vec<KeyValue>> {
        if !self.has_table()? {
            return Ok(Vec::new());
        }
        let t = self.txn.open_table(table(self.bucket.as_str()))?;
        list_from(&t, prefix)
    }

    fn buckets(&self) -> StorageResult<Vec<String>> {
        Ok(children(self.bucket, self.table_names()?))
    }
}

impl Tx for EmbeddedTx<'_> {
    fn put(&mut self, key: &str, value: &[u8]) -> StorageResult<()> {
        let mut t = self.txn.open_table(table(self.bucket.as_str()))?;
        t.insert(key, value)?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> StorageResult<()> {
        if !self.has_table()? {
            return Ok(());
        }
        let mut t = self.txn.open_table(table(self.bucket.as_str()))?;
        t.remove(key)?;
        Ok(())
    }

    fn delete_bucket(&mut self, name: &str) -> StorageResult<()> {
        let child = self.bucket.child(name)?;
        let doomed: Vec<String> = self
            .table_names()?
            .into_iter()
            .filter(|n| child.contains(n))
            .collect();
        for n in &doomed {
            self.txn.delete_table(table(n))?;
        }
        debug!(bucket = %child, tables = doomed.len(), "deleted bucket");
        Ok(())
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        let this = *self;
        this.txn.commit()?;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StorageResult<()> {
        let this = *self;
        this.txn.abort()?;
        Ok(())
    }
}

fn get_from<T>(t: &T, key: &str) -> StorageResult<KeyValue>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match t.get(key)? {
        Some(value) => Ok(KeyValue::new(key, value.value().to_vec())),
        None => Err(StorageError::no_key(key)),
    }
}

fn list_from<T>(t: &T, prefix: &str) -> StorageResult<Vec<KeyValue>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut out = Vec::new();
    for entry in t.range(prefix..)? {
        let (key, value) = entry?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        out.push(KeyValue::new(key, value.value().to_vec()));
    }
    Ok(out)
}

fn children(bucket: &BucketPath, names: impl IntoIterator<Item = String>) -> Vec<String> {
    names
        .into_iter()
        .filter_map(|n| bucket.child_name(&n).map(str::to_string))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
