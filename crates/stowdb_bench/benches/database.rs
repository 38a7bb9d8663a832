//! Document API benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use serde_json::json;
use stowdb_bench::{generate_documents, random_document};
use stowdb_core::{CollectionNamesOptions, Database};

/// Benchmark single document inserts (tracked).
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for fields in [4, 16, 64].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(fields), fields, |b, &fields| {
            let db = Database::open_in_memory().unwrap();
            let coll = db.collection("bench", "docs").unwrap();
            let doc = random_document(fields, 16);

            b.iter(|| {
                coll.insert(black_box(doc.clone())).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark batch inserts in one transaction.
fn bench_insert_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_many");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let db = Database::open_in_memory().unwrap();
                let coll = db.collection("bench", "docs").unwrap();
                let docs = generate_documents(batch_size, 8);

                b.iter(|| {
                    coll.insert_many(black_box(docs.clone())).unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark `$set` updates on a populated collection.
fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");

    for count in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let db = Database::open_in_memory().unwrap();
            let coll = db.collection("bench", "docs").unwrap();
            coll.insert_many(generate_documents(count, 8)).unwrap();
            let mut rng = rand::thread_rng();

            b.iter(|| {
                let id = format!("doc-{:06}", rng.gen_range(0..count));
                let n: u32 = rng.gen();
                coll.update(&id, json!({"$set": {"n": n}})).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark reads by id and namespace counts.
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    let db = Database::open_in_memory().unwrap();
    let coll = db.collection("bench", "docs").unwrap();
    let sibling = db.collection("bench", "docs2").unwrap();
    coll.insert_many(generate_documents(1000, 8)).unwrap();
    sibling.insert_many(generate_documents(1000, 8)).unwrap();

    group.bench_function("find_one", |b| {
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let id = format!("doc-{:06}", rng.gen_range(0..1000));
            black_box(coll.find_one(&id).unwrap());
        });
    });

    group.bench_function("count", |b| {
        b.iter(|| black_box(coll.count().unwrap()));
    });

    group.bench_function("collection_names", |b| {
        let bench_db = db.db("bench").unwrap();
        let options = CollectionNamesOptions::new().names_only(true);
        b.iter(|| black_box(bench_db.collection_names(&options).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_insert_many,
    bench_update,
    bench_read
);
criterion_main!(benches);
