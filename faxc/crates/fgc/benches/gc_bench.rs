//! Allocation and collection throughput benchmarks.
//! Run with `cargo bench --package fgc`.

use std::cell::RefCell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fgc::{GcConfig, GcState, ObjectPayload, Value};

fn bench_allocation(c: &mut Criterion) {
    c.bench_function("alloc_plain_object", |b| {
        let mut gc = GcState::new(GcConfig::default());
        b.iter(|| black_box(gc.alloc_raw(None, ObjectPayload::Plain)));
    });
}

fn bench_property_set(c: &mut Criterion) {
    c.bench_function("set_plain_property", |b| {
        let mut gc = GcState::new(GcConfig::default());
        let obj = gc.alloc_raw(None, ObjectPayload::Plain);
        let key = faxc_util::prepare_key_str("field");
        b.iter(|| {
            fgc::set(&mut gc.heap, obj, key, Value::Int(42)).unwrap();
        });
    });
}

fn bench_collection(c: &mut Criterion) {
    c.bench_function("collect_10k_garbage_objects", |b| {
        b.iter_batched(
            || {
                let mut gc = GcState::new(GcConfig::default());
                let root = gc.alloc_raw(None, ObjectPayload::Plain);
                for _ in 0..10_000 {
                    gc.alloc_raw(Some(root), ObjectPayload::Plain);
                }
                gc.push_root_set(Rc::new(RefCell::new(vec![Value::Object(root)])));
                gc
            },
            |mut gc| gc.collect(),
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_allocation, bench_property_set, bench_collection);
criterion_main!(benches);
