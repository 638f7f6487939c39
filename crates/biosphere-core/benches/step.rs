//! Criterion benchmarks for stepping the demo habitat.

use biosphere_core::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const DEMO_JSON: &str = include_str!("../../../data/demo_habitat.json");

fn demo_config() -> SimulationConfig {
    let mut config = SimulationConfig::from_json(DEMO_JSON).unwrap();
    // Benchmarks step past the demo's 30 day limit.
    config.termination.clear();
    config
}

fn bench_build(c: &mut Criterion) {
    let config = demo_config();
    c.bench_function("build_demo", |b| {
        b.iter(|| black_box(Model::new(&config).unwrap()));
    });
}

fn bench_step(c: &mut Criterion) {
    let mut model = Model::new(&demo_config()).unwrap();

    // Warm up: one step so ratio caches are populated
    model.step();

    c.bench_function("step_demo", |b| {
        b.iter(|| black_box(model.step()));
    });
}

fn bench_one_day(c: &mut Criterion) {
    let config = demo_config();
    c.bench_function("day_demo", |b| {
        b.iter(|| {
            let mut model = Model::new(&config).unwrap();
            black_box(model.step_to(Some(24)));
        });
    });
}

fn bench_report(c: &mut Criterion) {
    let mut model = Model::new(&demo_config()).unwrap();
    model.step_to(Some(24));

    c.bench_function("report_demo", |b| {
        b.iter(|| black_box(model.report()));
    });
}

criterion_group!(benches, bench_build, bench_step, bench_one_day, bench_report);
criterion_main!(benches);
