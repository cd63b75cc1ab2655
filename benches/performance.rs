//! Performance benchmarks for the record store.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reqlog::{RecordInput, RecordStore, StoreConfig, PAGE};
use tempfile::TempDir;

fn create_store(dir: &TempDir, records: usize) -> RecordStore {
    let store = RecordStore::load(StoreConfig::at(dir.path().join("logs.json")));
    for i in 0..records {
        store.append(
            PAGE,
            RecordInput::new("203.0.113.5")
                .with_field("url", format!("https://example.org/page/{i}"))
                .with_field("cookies", "session=abc; theme=dark"),
        );
    }
    store
}

/// Append cost grows with store size because every append rewrites the snapshot.
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for size in [0, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("existing_records", size), &size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let store = create_store(&dir, size);

            b.iter(|| {
                black_box(store.append(
                    PAGE,
                    RecordInput::new("198.51.100.1").with_field("url", "https://example.org"),
                ))
            });
        });
    }

    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    for size in [100, 1000, 5000] {
        let dir = TempDir::new().unwrap();
        drop(create_store(&dir, size));

        group.bench_with_input(BenchmarkId::new("records", size), &size, |b, _| {
            b.iter(|| black_box(RecordStore::load(StoreConfig::at(dir.path().join("logs.json")))));
        });
    }

    group.finish();
}

fn bench_list(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = create_store(&dir, 1000);

    c.bench_function("list_all_1000", |b| b.iter(|| black_box(store.list_all())));
}

criterion_group!(benches, bench_append, bench_load, bench_list);
criterion_main!(benches);
