//! Criterion benchmarks for calls through an in-process boundary.

use std::hint::black_box;

use charlie_host::PluginHost;
use criterion::{criterion_group, criterion_main, Criterion};

/// Benchmark: one `update` round trip to a counter instance.
fn bench_update_round_trip(c: &mut Criterion) {
    let host = PluginHost::in_process(charlie_plugins::registry(), "counter").unwrap();
    let counter = host.spawn().unwrap();
    counter.init(&Default::default()).unwrap();
    c.bench_function("boundary_update_round_trip", |b| {
        b.iter(|| counter.update(black_box(20)).unwrap());
    });
    host.unload();
}

/// Benchmark: render a 200x200 life frame and ship it back.
fn bench_render_round_trip(c: &mut Criterion) {
    let host = PluginHost::in_process(charlie_plugins::registry(), "life").unwrap();
    let life = host.spawn().unwrap();
    life.init(&charlie_core::parse_config("seed=9")).unwrap();
    c.bench_function("boundary_render_200x200", |b| {
        b.iter(|| black_box(life.render(200, 200).unwrap()));
    });
    host.unload();
}

criterion_group!(benches, bench_update_round_trip, bench_render_round_trip);
criterion_main!(benches);
