//! Performance benchmarks for carry-store

use carry_store::{
    CollectionSchema, FieldDef, FieldType, Fields, LogicalTimestamp, MergeStrategy, Operation,
    OperationDraft, Schema, Store, StoreSnapshot,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

fn create_test_schema() -> Schema {
    let mut schema = Schema::new(1);
    let fields = vec![
        FieldDef::required("name", FieldType::String),
        FieldDef::optional("email", FieldType::String),
        FieldDef::optional("age", FieldType::Int),
    ];
    let collection = CollectionSchema::new("users", fields);
    schema.add_collection(collection);
    schema
}

fn user(i: u64) -> Fields {
    serde_json::from_value(json!({"name": format!("User {}", i), "age": i})).unwrap()
}

fn populated_store(n: u64) -> Store {
    let mut store = Store::new(create_test_schema(), "node1");
    for i in 0..n {
        store
            .apply(OperationDraft::create("users", format!("user_{}", i), user(i)), 1000)
            .unwrap();
    }
    store
}

fn remote_ops(n: u64, node: &str) -> Vec<Operation> {
    (0..n)
        .map(|i| {
            OperationDraft::update("users", format!("user_{}", i % 100), user(i))
                .finalize(LogicalTimestamp::new(i + 1, node), 1000 + i as i64)
        })
        .collect()
}

fn bench_store_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_operations");

    group.bench_function("store_new", |b| {
        b.iter(|| Store::new(black_box(create_test_schema()), black_box("node1")))
    });

    group.bench_function("apply_create", |b| {
        let mut store = Store::new(create_test_schema(), "node1");
        let mut id = 0u64;

        b.iter(|| {
            id += 1;
            let draft = OperationDraft::create("users", format!("user_{}", id), user(id));
            store.apply(black_box(draft), black_box(1000))
        })
    });

    group.bench_function("get_record", |b| {
        let store = populated_store(1000);
        b.iter(|| store.get(black_box("users"), black_box("user_500")).is_ok())
    });

    group.bench_function("query_all", |b| {
        let store = populated_store(1000);
        b.iter(|| store.query(black_box("users"), false).map(|r| r.len()))
    });

    group.bench_function("acknowledge_half", |b| {
        b.iter_batched(
            || {
                let store = populated_store(1000);
                let ids: Vec<_> = store
                    .pending_ops()
                    .iter()
                    .step_by(2)
                    .map(|op| op.id.clone())
                    .collect();
                (store, ids)
            },
            |(mut store, ids)| store.acknowledge(black_box(&ids)),
            criterion::BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn bench_reconciliation(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconciliation");

    for size in [10u64, 100, 1000] {
        let ops = remote_ops(size, "node2");

        for strategy in [MergeStrategy::ClockWins, MergeStrategy::TimestampWins] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", strategy), size),
                &ops,
                |b, ops| {
                    b.iter_batched(
                        || (populated_store(100), ops.clone()),
                        |(mut store, ops)| store.reconcile(black_box(ops), strategy),
                        criterion::BatchSize::LargeInput,
                    )
                },
            );
        }
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for size in [100u64, 1000] {
        let store = populated_store(size);

        group.bench_with_input(BenchmarkId::new("export", size), &store, |b, store| {
            b.iter(|| store.export_state())
        });

        let json = store.export_state().to_json().unwrap();
        group.bench_with_input(BenchmarkId::new("import", size), &json, |b, json| {
            b.iter_batched(
                || Store::new(create_test_schema(), "node1"),
                |mut target| {
                    let snapshot = StoreSnapshot::from_json(black_box(json)).unwrap();
                    target.import_state(snapshot)
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    let op = remote_ops(1, "node2").remove(0);
    let op_json = serde_json::to_string(&op).unwrap();

    group.bench_function("operation_to_json", |b| {
        b.iter(|| serde_json::to_string(black_box(&op)))
    });

    group.bench_function("operation_from_json", |b| {
        b.iter(|| serde_json::from_str::<Operation>(black_box(&op_json)))
    });

    let snapshot = populated_store(1000).export_state();
    group.bench_function("snapshot_to_json", |b| {
        b.iter(|| black_box(&snapshot).to_json())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_store_operations,
    bench_reconciliation,
    bench_snapshot,
    bench_serialization
);
criterion_main!(benches);
