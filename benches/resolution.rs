extern crate wgpu_native_shim;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wgpu_native_shim::core::{
    config::{is_truthy, MapEnv, HOME_VAR, LIB_OVERRIDE_VAR},
    feature_gate::{decide, Feature},
    path::resolve_lib_path,
};

fn resolution_benchmark(c: &mut Criterion) {
    let home = MapEnv::new().with(HOME_VAR, "/home/bench");
    let overridden = MapEnv::new()
        .with(HOME_VAR, "/home/bench")
        .with(LIB_OVERRIDE_VAR, "/opt/wgpu/libwgpu_native.so");

    c.bench_function("resolve_lib_path_home", |b| {
        b.iter(|| resolve_lib_path(black_box(&home)))
    });
    c.bench_function("resolve_lib_path_override", |b| {
        b.iter(|| resolve_lib_path(black_box(&overridden)))
    });
    c.bench_function("is_truthy", |b| b.iter(|| is_truthy(black_box(Some("YES")))));
}

fn gate_benchmark(c: &mut Criterion) {
    // No marker on disk, so every decision reads the environment and misses.
    let dir = tempfile::tempdir().unwrap();
    let env = MapEnv::new()
        .with(HOME_VAR, dir.path().to_str().unwrap())
        .with(LIB_OVERRIDE_VAR, "/opt/wgpu/libwgpu_native.so");

    c.bench_function("decide_pipeline_async", |b| {
        b.iter(|| decide(Feature::PipelineAsync, black_box(&env)))
    });
}

criterion_group!(benches, resolution_benchmark, gate_benchmark);
criterion_main!(benches);
