//! Stress tests for Metastore stores.
//!
//! These verify behavior under heavy load and concurrent access against
//! any [`Interface`] implementation.

use crate::fixtures::TestObject;
use metastore_core::{IndexedStore, ID_INDEX};
use metastore_storage::{Interface, StorageError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Key incremented by [`stress_concurrent_counter`].
pub const COUNTER_KEY: &str = "counter";

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform (per thread for concurrent tests).
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of values in bytes.
    pub value_size: usize,
    /// Number of distinct keys.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            value_size: 256,
            key_count: 1_000,
        }
    }
}

impl StressConfig {
    /// A configuration small enough for unit tests.
    #[must_use]
    pub fn small() -> Self {
        Self {
            operations: 50,
            threads: 4,
            value_size: 32,
            key_count: 20,
        }
    }
}

fn key(i: usize, config: &StressConfig) -> String {
    format!("key-{:06}", i % config.key_count.max(1))
}

/// Run a sequential write stress test.
pub fn stress_sequential_writes<S: Interface>(store: &S, config: &StressConfig) -> StressTestResult {
    let data = vec![0xABu8; config.value_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        match store.put(&key(i, config), &data) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a sequential read stress test.
pub fn stress_sequential_reads<S: Interface>(store: &S, config: &StressConfig) -> StressTestResult {
    let data = vec![0xABu8; config.value_size];
    for i in 0..config.key_count {
        let _ = store.put(&key(i, config), &data);
    }

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        match store.get(&key(i, config)) {
            Ok(kv) if kv.value.len() == config.value_size => successful += 1,
            _ => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Increments [`COUNTER_KEY`] from every thread in read-modify-write
/// transactions.
///
/// Returns the run result and the final counter value; with no lost
/// updates it equals `threads * operations`.
pub fn stress_concurrent_counter<S: Interface>(
    store: &S,
    config: &StressConfig,
) -> (StressTestResult, u64) {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for _ in 0..config.threads {
            scope.spawn(|| {
                for _ in 0..config.operations {
                    let result = store.update(|tx| -> Result<(), StorageError> {
                        let current = match tx.get(COUNTER_KEY) {
                            Ok(kv) => decode_counter(&kv.value),
                            Err(err) if err.is_not_found() => 0,
                            Err(err) => return Err(err),
                        };
                        tx.put(COUNTER_KEY, &(current + 1).to_be_bytes())
                    });
                    match result {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    let result = StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    );
    let total = store
        .get(COUNTER_KEY)
        .map(|kv| decode_counter(&kv.value))
        .unwrap_or(0);
    (result, total)
}

fn decode_counter(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    if bytes.len() == 8 {
        buf.copy_from_slice(bytes);
    }
    u64::from_be_bytes(buf)
}

/// Runs writers that put objects and readers that list the `id` index at
/// the same time.
///
/// A read counts as failed if the listing errors or is out of ID order;
/// a torn write would show up as a corrupted index entry.
pub fn stress_indexed_readers_and_writers<S: Interface>(
    store: &IndexedStore<S, TestObject>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let record = |ok: bool| {
        if ok {
            successful.fetch_add(1, Ordering::Relaxed);
        } else {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    };
    let writers = (config.threads / 2).max(1);
    let readers = config.threads.saturating_sub(writers).max(1);
    let start = Instant::now();

    thread::scope(|scope| {
        for w in 0..writers {
            scope.spawn(move || {
                for i in 0..config.operations {
                    let object = TestObject::new(
                        format!("w{w}-{:04}", i % config.key_count.max(1)),
                        format!("{i}"),
                        format!("2020-01-{:02}", i % 28 + 1),
                    );
                    record(store.put(&object).is_ok());
                }
            });
        }
        for _ in 0..readers {
            scope.spawn(|| {
                for _ in 0..config.operations {
                    let ok = match store.list(ID_INDEX, "", 0, None) {
                        Ok(objects) => objects.windows(2).all(|w| w[0].id < w[1].id),
                        Err(_) => false,
                    };
                    record(ok);
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{mem_engine, test_indexed_store, TempEmbeddedDb};
    use metastore_storage::{Engine, ReadOperator};

    #[test]
    fn stress_result_throughput() {
        let result = StressTestResult::new(90, 10, Duration::from_secs(2));
        assert_eq!(result.total_ops, 100);
        assert!((result.ops_per_second - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stress_sequential_mem() {
        let store = mem_engine().store("stress").unwrap();
        let config = StressConfig::small();
        assert_eq!(stress_sequential_writes(&store, &config).failed_ops, 0);
        assert_eq!(stress_sequential_reads(&store, &config).failed_ops, 0);
        assert_eq!(store.list("key-").unwrap().len(), config.key_count);
    }

    #[test]
    fn stress_counter_mem_loses_no_updates() {
        let store = mem_engine().store("stress").unwrap();
        let config = StressConfig::small();
        let (result, total) = stress_concurrent_counter(&store, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(total, (config.threads * config.operations) as u64);
    }

    #[test]
    fn stress_counter_embedded_loses_no_updates() {
        let db = TempEmbeddedDb::new();
        let store = db.store("stress").unwrap();
        let config = StressConfig {
            operations: 20,
            ..StressConfig::small()
        };
        let (result, total) = stress_concurrent_counter(&store, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(total, (config.threads * config.operations) as u64);
    }

    #[test]
    fn stress_indexed_embedded_readers_see_consistent_lists() {
        let db = TempEmbeddedDb::new();
        let store = test_indexed_store(&db.db, "objects");
        let config = StressConfig {
            operations: 20,
            ..StressConfig::small()
        };
        let result = stress_indexed_readers_and_writers(&store, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.total_ops, config.threads * config.operations);
    }
}
