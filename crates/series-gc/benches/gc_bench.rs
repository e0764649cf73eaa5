//! GC Performance Benchmarks
//!
//! Measures pause times for wide and deep heaps.
//!
//! Run with: `cargo bench -p series-gc gc`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use series_gc::{Collector, ContextKind, GcConfig, SeriesId, Value};
use std::hint::black_box;
use std::time::{Duration, Instant};

fn collector() -> Collector {
    Collector::new(GcConfig {
        ballast: 100_000_000,
        ..GcConfig::default()
    })
}

/// Root context holding `n` blocks, every other one also holding a string.
fn build_wide(gc: &mut Collector, n: usize) {
    let heap = gc.heap_mut();
    let mut fields = Vec::with_capacity(n / 2);
    for i in 0..n {
        let text = heap.make_string("payload");
        heap.manage(text);
        let block = heap.make_array(vec![Value::string(text), Value::Integer(i as i64)]);
        heap.manage(block);
        if i % 2 == 0 {
            fields.push((heap.intern(&format!("f{i}")), Value::block(block)));
        }
    }
    let ctx = heap.make_context(ContextKind::Object, &fields);
    heap.manage_context(ctx);
    gc.set_root_context(Some(ctx)).expect("root context is managed");
}

/// Chain of `n` nested blocks.
fn build_deep(gc: &mut Collector, n: usize) -> SeriesId {
    let heap = gc.heap_mut();
    let mut tail = heap.make_array(Vec::new());
    heap.manage(tail);
    for _ in 1..n {
        tail = heap.make_array(vec![Value::block(tail)]);
        heap.manage(tail);
    }
    tail
}

/// Benchmark pause time for heaps where half the nodes are garbage
fn gc_pause_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc_pause");

    for n in [1_000, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::new("wide", n), &n, |b, &n| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let mut gc = collector();
                    build_wide(&mut gc, n);
                    let start = Instant::now();
                    black_box(gc.collect());
                    total += start.elapsed();
                }
                total
            });
        });
    }

    group.finish();
}

/// Benchmark marking a single long chain
fn gc_deep_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc_deep");
    group.sample_size(20);

    for n in [10_000, 200_000] {
        group.bench_with_input(BenchmarkId::new("chain", n), &n, |b, &n| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let mut gc = collector();
                    let head = build_deep(&mut gc, n);
                    let start = Instant::now();
                    let guard = gc.guard_series(head);
                    black_box(gc.collect());
                    total += start.elapsed();
                    gc.unguard_series(guard);
                }
                total
            });
        });
    }

    group.finish();
}

/// Benchmark a shutdown cycle, which skips marking
fn gc_shutdown_benchmark(c: &mut Criterion) {
    c.bench_function("gc_shutdown_10k", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let mut gc = collector();
                build_wide(&mut gc, 10_000);
                let start = Instant::now();
                black_box(gc.shutdown());
                total += start.elapsed();
            }
            total
        });
    });
}

criterion_group!(benches, gc_pause_benchmark, gc_deep_benchmark, gc_shutdown_benchmark);
criterion_main!(benches);
