//! CRUD and secondary indexing over a key/value [`Interface`].

use crate::error::{StoreError, StoreResult};
use crate::index::{Index, IndexedStoreConfig};
use crate::object::BinaryObject;
use crate::registrar::StoreActioner;
use metastore_storage::{do_list_func, Interface, KeyValue, Pattern, ReadOperator, Tx};
use std::fmt;
use tracing::{debug, info};

/// How a write treats an object that may already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// The object must not exist yet.
    Create,
    /// Create or overwrite.
    Put,
    /// The object must already exist.
    Replace,
}

/// Stores objects of type `O` in `S` and keeps their indexes in step.
///
/// Every operation has a variant that runs in its own transaction and a
/// `_tx` variant that joins a caller's transaction, so several stores
/// sharing one bucket can be updated atomically.
///
/// Writes check and update the data key and every index entry in one
/// transaction: a failure leaves either the old or the new state.
///
/// # Example
///
/// ```rust
/// use metastore_core::{BinaryObject, Index, IndexedStore, IndexedStoreConfig, StoreResult};
/// use metastore_storage::MemStore;
///
/// struct Topic {
///     id: String,
///     level: String,
/// }
///
/// impl BinaryObject for Topic {
///     fn object_id(&self) -> &str {
///         &self.id
///     }
///     fn marshal_binary(&self) -> StoreResult<Vec<u8>> {
///         Ok(format!("{}:{}", self.id, self.level).into_bytes())
///     }
///     fn unmarshal_binary(data: &[u8]) -> StoreResult<Self> {
///         let text = String::from_utf8_lossy(data).into_owned();
///         let (id, level) = text.split_once(':').unwrap_or((text.as_str(), ""));
///         Ok(Topic { id: id.into(), level: level.into() })
///     }
/// }
///
/// let config = IndexedStoreConfig::new("topics")
///     .with_index(Index::new("level", |t: &Topic| Ok(t.level.clone())));
/// let store = IndexedStore::new(MemStore::new("alerts").unwrap(), config).unwrap();
///
/// store.create(&Topic { id: "cpu".into(), level: "CRITICAL".into() }).unwrap();
/// store.create(&Topic { id: "disk".into(), level: "OK".into() }).unwrap();
///
/// let critical = store.list("level", "CRIT*", 0, None).unwrap();
/// assert_eq!(critical.len(), 1);
/// assert_eq!(critical[0].id, "cpu");
/// ```
pub struct IndexedStore<S, O> {
    store: S,
    prefix: String,
    data_dir: String,
    indexes_dir: String,
    indexes: Vec<Index<O>>,
}

impl<S, O> fmt::Debug for IndexedStore<S, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedStore")
            .field("prefix", &self.prefix)
            .field("indexes", &self.indexes)
            .finish_non_exhaustive()
    }
}

impl<S: Interface, O: BinaryObject> IndexedStore<S, O> {
    /// Creates a store over `store` after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the configuration is invalid.
    pub fn new(store: S, config: IndexedStoreConfig<O>) -> StoreResult<Self> {
        config.validate()?;
        let IndexedStoreConfig {
            prefix,
            data_prefix,
            indexes_prefix,
            indexes,
        } = config;
        Ok(Self {
            store,
            data_dir: format!("/{prefix}/{data_prefix}/"),
            indexes_dir: format!("/{prefix}/{indexes_prefix}/"),
            prefix,
            indexes,
        })
    }

    /// Returns the underlying key/value store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the store's key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the configured indexes.
    #[must_use]
    pub fn indexes(&self) -> &[Index<O>] {
        &self.indexes
    }

    fn data_key(&self, id: &str) -> String {
        format!("{}{id}", self.data_dir)
    }

    fn index_dir(&self, index: &Index<O>) -> String {
        format!("{}{}/", self.indexes_dir, index.name())
    }

    fn index_key(&self, index: &Index<O>, value: &str) -> String {
        format!("{}{}/{value}", self.indexes_dir, index.name())
    }

    fn find_index(&self, name: &str) -> StoreResult<&Index<O>> {
        self.indexes
            .iter()
            .find(|index| index.name() == name)
            .ok_or_else(|| StoreError::UnknownIndex {
                name: name.to_string(),
            })
    }

    fn lookup<T: ReadOperator + ?Sized>(&self, tx: &T, id: &str) -> StoreResult<Option<O>> {
        match tx.get(&self.data_key(id)) {
            Ok(kv) => Ok(Some(O::unmarshal_binary(&kv.value)?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the object with `id` within `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoObjectExists`] if there is none.
    pub fn get_tx<T: ReadOperator + ?Sized>(&self, tx: &T, id: &str) -> StoreResult<O> {
        self.lookup(tx, id)?
            .ok_or_else(|| StoreError::no_object_exists(id))
    }

    /// Returns the object with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoObjectExists`] if there is none.
    pub fn get(&self, id: &str) -> StoreResult<O> {
        self.store.view(|tx| self.get_tx(tx, id))
    }

    /// Stores a new object within `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ObjectExists`] if the ID is taken.
    pub fn create_tx(&self, tx: &mut dyn Tx, object: &O) -> StoreResult<()> {
        self.write_tx(tx, object, PutMode::Create)
    }

    /// Stores a new object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ObjectExists`] if the ID is taken.
    pub fn create(&self, object: &O) -> StoreResult<()> {
        self.write(object, PutMode::Create)
    }

    /// Creates or overwrites an object within `tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be encoded, an index value
    /// cannot be derived, or a unique index value is taken.
    pub fn put_tx(&self, tx: &mut dyn Tx, object: &O) -> StoreResult<()> {
        self.write_tx(tx, object, PutMode::Put)
    }

    /// Creates or overwrites an object.
    ///
    /// # Errors
    ///
    /// See [`IndexedStore::put_tx`].
    pub fn put(&self, object: &O) -> StoreResult<()> {
        self.write(object, PutMode::Put)
    }

    /// Overwrites an existing object within `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoObjectExists`] if there is none.
    pub fn replace_tx(&self, tx: &mut dyn Tx, object: &O) -> StoreResult<()> {
        self.write_tx(tx, object, PutMode::Replace)
    }

    /// Overwrites an existing object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoObjectExists`] if there is none.
    pub fn replace(&self, object: &O) -> StoreResult<()> {
        self.write(object, PutMode::Replace)
    }

    fn write(&self, object: &O, mode: PutMode) -> StoreResult<()> {
        self.store.update(|tx| self.write_tx(tx, object, mode))
    }

    /// Writes `object` within `tx` following `mode`.
    ///
    /// Index entries whose key is unchanged are left alone; changed ones
    /// are swapped. All checks run before the first write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidObjectId`] for an empty ID or one that
    /// contains `/`, [`StoreError::ObjectExists`] or
    /// [`StoreError::NoObjectExists`] when `mode` is violated, and
    /// [`StoreError::IndexConflict`] when a unique value belongs to another
    /// object.
    pub fn write_tx(&self, tx: &mut dyn Tx, object: &O, mode: PutMode) -> StoreResult<()> {
        let id = object.object_id();
        validate_object_id(id)?;

        let old = self.lookup(&*tx, id)?;
        match (mode, &old) {
            (PutMode::Create, Some(_)) => return Err(StoreError::object_exists(id)),
            (PutMode::Replace, None) => return Err(StoreError::no_object_exists(id)),
            _ => {}
        }

        let mut changes = Vec::with_capacity(self.indexes.len());
        for index in &self.indexes {
            let new_key = self.index_key(index, &index.value_of(object)?);
            let old_key = match &old {
                Some(prev) => Some(self.index_key(index, &index.value_of(prev)?)),
                None => None,
            };
            if old_key.as_deref() == Some(new_key.as_str()) {
                continue;
            }
            if index.is_unique() {
                self.check_unique(&*tx, index, &new_key, id)?;
            }
            changes.push((old_key, new_key));
        }

        let data = object.marshal_binary()?;
        tx.put(&self.data_key(id), &data)?;
        for (old_key, new_key) in changes {
            tx.put(&new_key, id.as_bytes())?;
            if let Some(old_key) = old_key {
                tx.delete(&old_key)?;
            }
        }
        Ok(())
    }

    fn check_unique<T: ReadOperator + ?Sized>(
        &self,
        tx: &T,
        index: &Index<O>,
        key: &str,
        id: &str,
    ) -> StoreResult<()> {
        let owner = match tx.get(key) {
            Ok(kv) => kv.value,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if owner == id.as_bytes() {
            return Ok(());
        }
        let dir = self.index_dir(index);
        Err(StoreError::IndexConflict {
            index: index.name().to_string(),
            value: key.strip_prefix(dir.as_str()).unwrap_or(key).to_string(),
            owner: String::from_utf8_lossy(&owner).into_owned(),
        })
    }

    /// Removes the object with `id` and its index entries within `tx`.
    ///
    /// Index entries are derived from the stored object, not from any
    /// caller copy. Removing an absent object is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored object cannot be decoded or an index
    /// value cannot be derived from it.
    pub fn delete_tx(&self, tx: &mut dyn Tx, id: &str) -> StoreResult<()> {
        let Some(old) = self.lookup(&*tx, id)? else {
            return Ok(());
        };
        for index in &self.indexes {
            tx.delete(&self.index_key(index, &index.value_of(&old)?))?;
        }
        tx.delete(&self.data_key(id))?;
        Ok(())
    }

    /// Removes the object with `id` and its index entries.
    ///
    /// # Errors
    ///
    /// See [`IndexedStore::delete_tx`].
    pub fn delete(&self, id: &str) -> StoreResult<()> {
        self.store.update(|tx| self.delete_tx(tx, id))
    }

    /// Lists objects in ascending order of the index `index`.
    ///
    /// A non-empty `pattern` is a glob matched against each entry's derived
    /// value (without the `/id` suffix of a non-unique index). `offset`
    /// skips that many matches and `limit` caps the result; `None` returns
    /// every match.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownIndex`] for an unconfigured index, a
    /// bad-pattern storage error for a malformed pattern, or
    /// [`StoreError::Corrupted`] if an index entry points at a missing
    /// object.
    pub fn list_tx<T: ReadOperator + ?Sized>(
        &self,
        tx: &T,
        index: &str,
        pattern: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<O>> {
        self.list_in(tx, index, pattern, offset, limit, false)
    }

    /// Lists objects in ascending index order. See [`IndexedStore::list_tx`].
    ///
    /// # Errors
    ///
    /// See [`IndexedStore::list_tx`].
    pub fn list(
        &self,
        index: &str,
        pattern: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<O>> {
        self.store
            .view(|tx| self.list_tx(tx, index, pattern, offset, limit))
    }

    /// Lists objects in descending order of the index `index`.
    ///
    /// # Errors
    ///
    /// See [`IndexedStore::list_tx`].
    pub fn reverse_list_tx<T: ReadOperator + ?Sized>(
        &self,
        tx: &T,
        index: &str,
        pattern: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<O>> {
        self.list_in(tx, index, pattern, offset, limit, true)
    }

    /// Lists objects in descending index order.
    ///
    /// # Errors
    ///
    /// See [`IndexedStore::list_tx`].
    pub fn reverse_list(
        &self,
        index: &str,
        pattern: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<O>> {
        self.store
            .view(|tx| self.reverse_list_tx(tx, index, pattern, offset, limit))
    }

    fn list_in<T: ReadOperator + ?Sized>(
        &self,
        tx: &T,
        index: &str,
        pattern: &str,
        offset: usize,
        limit: Option<usize>,
        reverse: bool,
    ) -> StoreResult<Vec<O>> {
        let index = self.find_index(index)?;
        let pattern = if pattern.is_empty() {
            None
        } else {
            Some(Pattern::new(pattern)?)
        };

        let dir = self.index_dir(index);
        let mut entries = tx.list(&dir)?;
        if reverse {
            entries.reverse();
        }

        let matches = |kv: &KeyValue| match &pattern {
            Some(p) => p.matches(derived_value(index.is_unique(), &dir, kv)),
            None => true,
        };
        do_list_func(&entries, matches, offset, limit)
            .into_iter()
            .map(|kv| self.resolve(tx, kv))
            .collect()
    }

    fn resolve<T: ReadOperator + ?Sized>(&self, tx: &T, entry: &KeyValue) -> StoreResult<O> {
        let id = std::str::from_utf8(&entry.value)
            .map_err(|_| StoreError::corrupted(&entry.key, "index entry is not a UTF-8 ID"))?;
        self.lookup(tx, id)?.ok_or_else(|| {
            StoreError::corrupted(&entry.key, format!("index entry points to missing object {id:?}"))
        })
    }

    /// Regenerates every index entry from the data section within `tx`.
    ///
    /// Returns the number of objects indexed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] naming the data key of the first
    /// object that cannot be decoded or indexed, or
    /// [`StoreError::IndexConflict`] if two objects share a unique value.
    pub fn rebuild_tx(&self, tx: &mut dyn Tx) -> StoreResult<usize> {
        let stale = tx.list(&self.indexes_dir)?;
        for kv in &stale {
            tx.delete(&kv.key)?;
        }

        let objects = tx.list(&self.data_dir)?;
        for kv in &objects {
            let object = O::unmarshal_binary(&kv.value)
                .map_err(|err| StoreError::corrupted(&kv.key, err.to_string()))?;
            let id = object.object_id();
            for index in &self.indexes {
                let value = index
                    .value_of(&object)
                    .map_err(|err| StoreError::corrupted(&kv.key, err.to_string()))?;
                let key = self.index_key(index, &value);
                if index.is_unique() {
                    self.check_unique(&*tx, index, &key, id)?;
                }
                tx.put(&key, id.as_bytes())?;
            }
        }
        debug!(
            prefix = %self.prefix,
            removed = stale.len(),
            objects = objects.len(),
            "rebuilt index section"
        );
        Ok(objects.len())
    }

    /// Regenerates every index entry from the data section in one
    /// transaction; on error nothing changes.
    ///
    /// # Errors
    ///
    /// See [`IndexedStore::rebuild_tx`].
    pub fn rebuild(&self) -> StoreResult<()> {
        info!(prefix = %self.prefix, "rebuilding indexes");
        let count = self.store.update(|tx| self.rebuild_tx(tx))?;
        info!(prefix = %self.prefix, objects = count, "indexes rebuilt");
        Ok(())
    }
}

impl<S: Interface, O: BinaryObject> StoreActioner for IndexedStore<S, O> {
    fn rebuild(&self) -> StoreResult<()> {
        IndexedStore::rebuild(self)
    }
}

fn validate_object_id(id: &str) -> StoreResult<()> {
    let reason = if id.is_empty() {
        "object id is empty"
    } else if id.contains('/') {
        "object id contains '/'"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidObjectId {
        id: id.to_string(),
        reason,
    })
}

/// Strips the index directory and, for a non-unique index, the trailing
/// `/id` named by the entry's value.
fn derived_value<'a>(unique: bool, dir: &str, entry: &'a KeyValue) -> &'a str {
    let rest = entry.key.strip_prefix(dir).unwrap_or(&entry.key);
    if unique {
        return rest;
    }
    std::str::from_utf8(&entry.value)
        .ok()
        .and_then(|id| rest.strip_suffix(id))
        .and_then(|value| value.strip_suffix('/'))
        .unwrap_or(rest)
}
