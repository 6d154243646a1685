//! IndexedStore benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use metastore_bench::{object, populate};
use metastore_core::ID_INDEX;
use metastore_storage::{EmbeddedDb, MemDb};
use metastore_testkit::{test_indexed_store, DATE_INDEX};
use tempfile::TempDir;

/// Benchmark object writes with two indexes to maintain.
fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_put");

    group.bench_function("mem", |b| {
        let db = MemDb::new();
        let store = test_indexed_store(&db, "objects");
        let mut i = 0;
        b.iter(|| {
            store.put(black_box(&object(i % 1000))).unwrap();
            i += 1;
        });
    });

    group.sample_size(20);
    group.bench_function("embedded", |b| {
        let temp_dir = TempDir::new().unwrap();
        let db = EmbeddedDb::open_path(temp_dir.path().join("bench.db")).unwrap();
        let store = test_indexed_store(&db, "objects");
        let mut i = 0;
        b.iter(|| {
            store.put(black_box(&object(i % 1000))).unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark paged listing over the id and date indexes.
fn bench_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_list");

    let temp_dir = TempDir::new().unwrap();
    let db = EmbeddedDb::open_path(temp_dir.path().join("bench.db")).unwrap();
    let store = test_indexed_store(&db, "objects");
    populate(&store, 1000);

    for limit in [10, 100].iter() {
        group.throughput(Throughput::Elements(*limit as u64));
        group.bench_with_input(BenchmarkId::new("id", limit), limit, |b, &limit| {
            b.iter(|| {
                black_box(store.list(ID_INDEX, "", 500, Some(limit)).unwrap());
            });
        });
        group.bench_with_input(BenchmarkId::new("date_pattern", limit), limit, |b, &limit| {
            b.iter(|| {
                black_box(store.list(DATE_INDEX, "2020-03-*", 0, Some(limit)).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark a full index rebuild.
fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_rebuild");
    group.sample_size(10);

    for count in [100, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let db = MemDb::new();
            let store = test_indexed_store(&db, "objects");
            populate(&store, count);

            b.iter(|| {
                store.rebuild().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_put, bench_list, bench_rebuild);
criterion_main!(benches);
