//! Property-based test generators using proptest.
//!
//! Provides strategies for random test objects and operation sequences
//! over a small ID space, so sequences revisit the same objects often.

use crate::fixtures::TestObject;
use metastore_core::{IndexedStore, StoreResult};
use metastore_storage::Interface;
use proptest::prelude::*;

/// Strategy for object IDs drawn from a space of 16.
pub fn object_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-d][0-3]").expect("Invalid regex")
}

/// Strategy for `YYYY-MM-DD` dates; few enough that objects share them.
pub fn date_strategy() -> impl Strategy<Value = String> {
    (2015u32..2019, 1u32..4, 1u32..3)
        .prop_map(|(year, month, day)| format!("{year:04}-{month:02}-{day:02}"))
}

/// Strategy for test objects.
pub fn test_object_strategy() -> impl Strategy<Value = TestObject> {
    (
        object_id_strategy(),
        prop::string::string_regex("[a-z]{0,8}").expect("Invalid regex"),
        date_strategy(),
    )
        .prop_map(|(id, value, date)| TestObject::new(id, value, date))
}

/// A single write against an indexed store.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Create a new object.
    Create(TestObject),
    /// Create or replace an object.
    Put(TestObject),
    /// Replace an existing object.
    Replace(TestObject),
    /// Delete an object by ID.
    Delete(String),
}

impl StoreOperation {
    /// Applies the operation to `store`.
    ///
    /// # Errors
    ///
    /// Returns the store's error; `Create` of an existing ID and `Replace`
    /// of a missing one are expected to fail.
    pub fn apply<S: Interface>(&self, store: &IndexedStore<S, TestObject>) -> StoreResult<()> {
        match self {
            Self::Create(object) => store.create(object),
            Self::Put(object) => store.put(object),
            Self::Replace(object) => store.replace(object),
            Self::Delete(id) => store.delete(id),
        }
    }
}

/// Strategy for a single store operation.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    prop_oneof![
        3 => test_object_strategy().prop_map(StoreOperation::Create),
        2 => test_object_strategy().prop_map(StoreOperation::Put),
        2 => test_object_strategy().prop_map(StoreOperation::Replace),
        2 => object_id_strategy().prop_map(StoreOperation::Delete),
    ]
}

/// Strategy for a sequence of store operations.
pub fn operation_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), 0..max_len)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn object_id_is_valid(id in object_id_strategy()) {
            prop_assert_eq!(id.len(), 2);
            prop_assert!(!id.contains('/'));
        }

        #[test]
        fn date_is_iso(date in date_strategy()) {
            prop_assert_eq!(date.len(), 10);
            prop_assert_eq!(&date[4..5], "-");
            prop_assert_eq!(&date[7..8], "-");
        }

        #[test]
        fn sequence_respects_max_len(ops in operation_sequence_strategy(10)) {
            prop_assert!(ops.len() < 10);
        }
    }

    #[test]
    fn config_presets() {
        assert!(PropTestConfig::quick().cases < PropTestConfig::default().cases);
        assert!(PropTestConfig::thorough().cases > PropTestConfig::default().cases);
        assert_eq!(PropTestConfig::quick().to_proptest_config().cases, 32);
    }
}
