//! Cross-crate integration test helpers.
//!
//! [`IndexHarness`] drives an [`IndexedStore`] of [`TestObject`]s while
//! tracking the expected contents, and checks that data and index
//! sections agree.

use crate::fixtures::{TestObject, DATE_INDEX};
use crate::generators::StoreOperation;
use metastore_core::{IndexedStore, ID_INDEX};
use metastore_storage::Interface;
use std::collections::BTreeMap;

/// A test harness that mirrors an indexed store in memory.
pub struct IndexHarness<S: Interface> {
    /// The store under test.
    pub store: IndexedStore<S, TestObject>,
    expected: BTreeMap<String, TestObject>,
}

impl<S: Interface> IndexHarness<S> {
    /// Wraps an empty store.
    pub fn new(store: IndexedStore<S, TestObject>) -> Self {
        Self {
            store,
            expected: BTreeMap::new(),
        }
    }

    /// Applies `op` and checks its outcome against the tracked state.
    pub fn apply(&mut self, op: &StoreOperation) {
        let result = op.apply(&self.store);
        match op {
            StoreOperation::Create(object) => {
                if self.expected.contains_key(&object.id) {
                    let err = result.expect_err("create of existing object succeeded");
                    assert!(err.is_object_exists(), "unexpected error: {err}");
                } else {
                    result.expect("create failed");
                    self.expected.insert(object.id.clone(), object.clone());
                }
            }
            StoreOperation::Put(object) => {
                result.expect("put failed");
                self.expected.insert(object.id.clone(), object.clone());
            }
            StoreOperation::Replace(object) => {
                if self.expected.contains_key(&object.id) {
                    result.expect("replace failed");
                    self.expected.insert(object.id.clone(), object.clone());
                } else {
                    let err = result.expect_err("replace of missing object succeeded");
                    assert!(err.is_no_object_exists(), "unexpected error: {err}");
                }
            }
            StoreOperation::Delete(id) => {
                result.expect("delete failed");
                self.expected.remove(id);
            }
        }
    }

    /// Applies every operation in order.
    pub fn apply_all(&mut self, ops: &[StoreOperation]) {
        for op in ops {
            self.apply(op);
        }
    }

    /// Returns the objects the store should hold, in ID order.
    pub fn expected(&self) -> Vec<TestObject> {
        self.expected.values().cloned().collect()
    }

    /// Returns the count of tracked objects.
    pub fn tracked_count(&self) -> usize {
        self.expected.len()
    }

    /// Verifies that every index lists exactly the tracked objects, in
    /// index order, and that no orphaned index entries remain.
    pub fn verify_all(&self) {
        let by_id = self
            .store
            .list(ID_INDEX, "", 0, None)
            .expect("Failed to list id index");
        assert_eq!(by_id, self.expected(), "id index mismatch");

        let mut by_date = self.expected();
        by_date.sort_by(|a, b| (&a.date, &a.id).cmp(&(&b.date, &b.id)));
        let listed = self
            .store
            .list(DATE_INDEX, "", 0, None)
            .expect("Failed to list date index");
        assert_eq!(listed, by_date, "date index mismatch");

        for object in self.expected.values() {
            let stored = self.store.get(&object.id).expect("Failed to get object");
            assert_eq!(&stored, object);
        }

        let prefix = format!("/{}/indexes/", self.store.prefix());
        let entries = self
            .store
            .store()
            .list(&prefix)
            .expect("Failed to list index section");
        assert_eq!(
            entries.len(),
            self.store.indexes().len() * self.expected.len(),
            "orphaned or missing index entries"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{mem_engine, test_indexed_store};

    #[test]
    fn harness_tracks_operations() {
        let db = mem_engine();
        let mut harness = IndexHarness::new(test_indexed_store(&db, "objects"));

        let a = TestObject::new("a", "x", "2017-01-01");
        let b = TestObject::new("b", "y", "2016-01-01");
        harness.apply_all(&[
            StoreOperation::Create(a.clone()),
            StoreOperation::Create(a.clone()),
            StoreOperation::Put(b.clone()),
            StoreOperation::Replace(TestObject::new("c", "", "2015-01-01")),
            StoreOperation::Replace(TestObject::new("a", "z", "2018-01-01")),
            StoreOperation::Delete("missing".into()),
        ]);

        assert_eq!(harness.tracked_count(), 2);
        harness.verify_all();

        harness.apply(&StoreOperation::Delete("a".into()));
        assert_eq!(harness.expected(), vec![b]);
        harness.verify_all();
    }
}
