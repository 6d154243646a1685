//! Storage traits and transaction helpers.

use crate::error::{StorageError, StorageResult};
use crate::kv::KeyValue;
use tracing::warn;

/// Separates the components of a nested bucket path inside an engine.
///
/// Bucket names may not contain it.
pub const BUCKET_SEPARATOR: char = '\u{1f}';

/// Read operations shared by stores and transactions.
///
/// # Invariants
///
/// - `get` of an absent key returns [`StorageError::NoKeyExists`]
/// - `list` returns entries sorted ascending by key
/// - Reads against a bucket that was never written see it as empty
pub trait ReadOperator {
    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoKeyExists`] if the key is absent, or a
    /// backend error.
    fn get(&self, key: &str) -> StorageResult<KeyValue>;

    /// Reports whether `key` is present.
    fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Returns every entry whose key starts with `prefix`, in key order.
    fn list(&self, prefix: &str) -> StorageResult<Vec<KeyValue>>;

    /// Returns the names of the buckets nested directly below this one,
    /// in name order.
    fn buckets(&self) -> StorageResult<Vec<String>>;
}

/// A read-only transaction.
///
/// All reads observe one consistent view of the store. A read-only
/// transaction is never committed; it must be rolled back (or dropped).
pub trait ReadOnlyTx: ReadOperator {
    /// Ends the transaction.
    fn rollback(self: Box<Self>) -> StorageResult<()>;
}

/// A read-write transaction.
///
/// Writes are visible to later reads in the same transaction, and to
/// other callers only after [`Tx::commit`]. Dropping a transaction without
/// committing discards its writes.
pub trait Tx: ReadOperator {
    /// Stores `value` under `key`, creating the bucket if needed.
    fn put(&mut self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// This never removes a nested bucket; see [`Tx::delete_bucket`].
    fn delete(&mut self, key: &str) -> StorageResult<()>;

    /// Removes the child bucket `name` together with every bucket nested
    /// below it. Removing an absent bucket is not an error.
    fn delete_bucket(&mut self, name: &str) -> StorageResult<()>;

    /// Makes all writes durable and visible.
    fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards all writes.
    fn rollback(self: Box<Self>) -> StorageResult<()>;
}

/// A transactional key/value store scoped to one bucket.
///
/// Direct `get`/`put`/`delete` calls each run in their own implicit
/// transaction. Only one explicit transaction per caller may be open at a
/// time: opening a second one on the same store while the first is live
/// may block forever.
///
/// # Implementors
///
/// - [`crate::EmbeddedStore`] - durable, snapshot-isolated readers
/// - [`crate::MemStore`] - in-memory test double, fully serialized
pub trait Interface: ReadOperator + Send + Sync {
    /// Stores `value` under `key`.
    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Begins a read-write transaction.
    fn begin_tx(&self) -> StorageResult<Box<dyn Tx + '_>>;

    /// Begins a read-only transaction.
    fn begin_read_only_tx(&self) -> StorageResult<Box<dyn ReadOnlyTx + '_>>;

    /// Runs `f` inside a read-only transaction.
    ///
    /// See [`do_view`].
    fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&dyn ReadOnlyTx) -> Result<T, E>,
        E: From<StorageError>,
    {
        do_view(self, f)
    }

    /// Runs `f` inside a read-write transaction.
    ///
    /// See [`do_update`].
    fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&mut dyn Tx) -> Result<T, E>,
        E: From<StorageError>,
    {
        do_update(self, f)
    }
}

/// Runs `f` inside a read-only transaction, then rolls it back.
///
/// The transaction is rolled back whether or not `f` succeeds; a failed
/// rollback is logged and does not replace the result of `f`.
pub fn do_view<S, T, E, F>(store: &S, f: F) -> Result<T, E>
where
    S: Interface + ?Sized,
    F: FnOnce(&dyn ReadOnlyTx) -> Result<T, E>,
    E: From<StorageError>,
{
    let tx = store.begin_read_only_tx()?;
    let result = f(&*tx);
    if let Err(err) = tx.rollback() {
        warn!(error = %err, "failed to roll back read-only transaction");
    }
    result
}

/// Runs `f` inside a read-write transaction.
///
/// If `f` returns `Ok`, the transaction is committed and a commit failure
/// is returned. If `f` returns `Err`, the transaction is rolled back and
/// the original error is returned.
pub fn do_update<S, T, E, F>(store: &S, f: F) -> Result<T, E>
where
    S: Interface + ?Sized,
    F: FnOnce(&mut dyn Tx) -> Result<T, E>,
    E: From<StorageError>,
{
    let mut tx = store.begin_tx()?;
    match f(&mut *tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!(error = %rollback_err, "failed to roll back transaction");
            }
            Err(err)
        }
    }
}

/// A shared backing engine that hands out one store per bucket.
///
/// Every store derived from the same engine shares its file (or map) and
/// its writer lock.
pub trait Engine: Send + Sync {
    /// The store type scoped to a single bucket.
    type Store: Interface;

    /// Returns the store for the top-level bucket `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidBucket`] if the name is empty or
    /// contains [`BUCKET_SEPARATOR`].
    fn store(&self, namespace: &str) -> StorageResult<Self::Store> {
        self.store_in(&[namespace])
    }

    /// Returns the store for a nested bucket path such as
    /// `["alerts", "topic-1"]`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidBucket`] if the path is empty or
    /// any component is invalid.
    fn store_in(&self, path: &[&str]) -> StorageResult<Self::Store>;
}

/// A validated bucket path, encoded as a single engine-level name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketPath(String);

impl BucketPath {
    /// Builds a path from its components.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidBucket`] for an empty path or an
    /// invalid component.
    pub fn new(components: &[&str]) -> StorageResult<Self> {
        if components.is_empty() {
            return Err(StorageError::InvalidBucket {
                name: String::new(),
                reason: "bucket path is empty",
            });
        }
        for name in components {
            validate_bucket_name(name)?;
        }
        Ok(Self(components.join(&BUCKET_SEPARATOR.to_string())))
    }

    /// Returns the path of the child bucket `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidBucket`] if `name` is invalid.
    pub fn child(&self, name: &str) -> StorageResult<Self> {
        validate_bucket_name(name)?;
        Ok(Self(format!("{}{}{}", self.0, BUCKET_SEPARATOR, name)))
    }

    /// Returns the encoded name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reports whether `encoded` names this bucket or one nested below it.
    #[must_use]
    pub fn contains(&self, encoded: &str) -> bool {
        encoded == self.0 || self.is_ancestor_of(encoded)
    }

    /// Returns the name of the child bucket of this one that contains
    /// `encoded`, if `encoded` is nested below this bucket at any depth.
    #[must_use]
    pub fn child_name<'a>(&self, encoded: &'a str) -> Option<&'a str> {
        let rest = encoded
            .strip_prefix(self.0.as_str())?
            .strip_prefix(BUCKET_SEPARATOR)?;
        rest.split(BUCKET_SEPARATOR).next()
    }

    /// Converts an encoded name to its `/`-separated display form.
    #[must_use]
    pub fn decode(encoded: &str) -> String {
        encoded.replace(BUCKET_SEPARATOR, "/")
    }

    fn is_ancestor_of(&self, encoded: &str) -> bool {
        encoded
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with(BUCKET_SEPARATOR))
    }
}

impl std::fmt::Display for BucketPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&Self::decode(&self.0))
    }
}

fn validate_bucket_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidBucket {
            name: name.to_string(),
            reason: "bucket name is empty",
        });
    }
    if name.contains(BUCKET_SEPARATOR) {
        return Err(StorageError::InvalidBucket {
            name: name.to_string(),
            reason: "bucket name contains the bucket separator",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_path_rejects_empty() {
        assert!(matches!(
            BucketPath::new(&[]),
            Err(StorageError::InvalidBucket { .. })
        ));
        assert!(matches!(
            BucketPath::new(&["tasks", ""]),
            Err(StorageError::InvalidBucket { .. })
        ));
    }

    #[test]
    fn bucket_path_rejects_separator() {
        let name = format!("a{BUCKET_SEPARATOR}b");
        assert!(BucketPath::new(&[name.as_str()]).is_err());
    }

    #[test]
    fn bucket_path_children() {
        let root = BucketPath::new(&["alerts"]).unwrap();
        let topic = root.child("cpu").unwrap();
        let nested = topic.child("event").unwrap();

        assert!(root.contains(root.as_str()));
        assert!(root.contains(topic.as_str()));
        assert!(root.contains(nested.as_str()));
        assert!(!topic.contains(root.as_str()));

        assert_eq!(root.child_name(topic.as_str()), Some("cpu"));
        assert_eq!(root.child_name(nested.as_str()), Some("cpu"));
        assert_eq!(topic.child_name(nested.as_str()), Some("event"));
        assert_eq!(root.child_name(root.as_str()), None);
    }

    #[test]
    fn bucket_path_sibling_prefix_is_not_contained() {
        let a = BucketPath::new(&["alert"]).unwrap();
        let b = BucketPath::new(&["alerts"]).unwrap();
        assert!(!a.contains(b.as_str()));
        assert_eq!(a.child_name(b.as_str()), None);
    }

    #[test]
    fn bucket_path_display() {
        let path = BucketPath::new(&["alerts", "cpu"]).unwrap();
        assert_eq!(path.to_string(), "alerts/cpu");
    }
}
