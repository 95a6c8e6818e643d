//! Statement generation benchmarks
//!
//! Run with: `cargo bench -p survey-archive-core`
//!
//! Builders run on every request, so these cover the hot paths:
//! - Insert for the widest built-in entity
//! - Sparse update
//! - Owner-scoped select with joins

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use survey_archive_core::models::core_schemas::archive_registry;
use survey_archive_core::{QueryBuilder, Record};

fn capture_instance() -> Record {
    json!({
        "plate_id": "P-1902-17",
        "fn_photo_reference": "WHE-17",
        "f_stop": 16.0,
        "shutter_speed": "1/25",
        "focal_length": 210,
        "capture_datetime": "1902-07-14T10:30:00",
        "comments": ""
    })
    .as_object()
    .cloned()
    .unwrap()
}

fn bench_build_insert(c: &mut Criterion) {
    let registry = archive_registry().unwrap();
    let schema = registry.require("historic_captures").unwrap();
    let builder = QueryBuilder::default();
    let instance = capture_instance();

    c.bench_function("build_insert_historic_capture", |b| {
        b.iter(|| builder.build_insert(black_box(schema), black_box(&instance)))
    });
}

fn bench_build_update(c: &mut Criterion) {
    let registry = archive_registry().unwrap();
    let schema = registry.require("historic_captures").unwrap();
    let builder = QueryBuilder::default();
    let mut instance = capture_instance();
    instance.insert("id".to_string(), json!(42));

    c.bench_function("build_update_historic_capture", |b| {
        b.iter(|| builder.build_update(black_box(schema), black_box(&instance)).unwrap())
    });
}

fn bench_build_select_by_owner(c: &mut Criterion) {
    let registry = archive_registry().unwrap();
    let schema = registry.require("modern_captures").unwrap();
    let owner = registry.require("locations").unwrap();
    let builder = QueryBuilder::default();

    c.bench_function("build_select_by_owner_modern_captures", |b| {
        b.iter(|| {
            builder
                .build_select_by_owner(black_box(schema), black_box(owner), black_box(7))
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_build_insert,
    bench_build_update,
    bench_build_select_by_owner
);
criterion_main!(benches);
