//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use metastore_core::IndexedStore;
use metastore_storage::Interface;
use metastore_testkit::TestObject;

/// Deterministic value bytes of the given size.
pub fn sample_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Zero-padded key `i`, so key order matches numeric order.
pub fn key(i: usize) -> String {
    format!("key-{i:08}")
}

/// A test object whose date cycles through one year.
pub fn object(i: usize) -> TestObject {
    TestObject::new(
        format!("{i:08}"),
        format!("value-{i}"),
        format!("2020-{:02}-{:02}", i % 12 + 1, i % 28 + 1),
    )
}

/// Creates objects `0..count` in `store`.
pub fn populate<S: Interface>(store: &IndexedStore<S, TestObject>, count: usize) {
    for i in 0..count {
        store.put(&object(i)).expect("Failed to put object");
    }
}
