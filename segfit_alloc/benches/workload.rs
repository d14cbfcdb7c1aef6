//! Allocation workload benchmarks.
//!
//! Replaces the teacher's nightly `#[bench]` trace-replay harness (which
//! depended on recorded `.trace` files this repository does not carry) with
//! `criterion` benchmarks over synthetic workloads representative of the
//! same three shapes: pure allocation, alloc/free churn, and a size mix
//! crossing several free-list size classes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use segfit_alloc::{AllocatorContext, VecHeapSource};

const ARENA_BYTES: usize = 64 * 1024 * 1024;

fn new_context() -> AllocatorContext<VecHeapSource> {
    AllocatorContext::new(VecHeapSource::new(ARENA_BYTES))
}

fn bench_sequential_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_allocate");
    for &size in &[16usize, 64, 256, 1024, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                new_context,
                |mut cx| {
                    for _ in 0..1000 {
                        criterion::black_box(cx.allocate(size));
                    }
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_alloc_free_churn(c: &mut Criterion) {
    c.bench_function("alloc_free_churn", |b| {
        b.iter_batched(
            new_context,
            |mut cx| {
                let mut live = Vec::with_capacity(256);
                for i in 0..4000 {
                    let size = 16 + (i % 200);
                    if let Some(p) = cx.allocate(size) {
                        live.push(p);
                    }
                    if live.len() > 256 {
                        cx.free(Some(live.remove(0)));
                    }
                }
                for p in live {
                    cx.free(Some(p));
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_mixed_size_classes(c: &mut Criterion) {
    c.bench_function("mixed_size_classes", |b| {
        b.iter_batched(
            new_context,
            |mut cx| {
                let sizes = [16usize, 48, 130, 512, 2000, 9000];
                let mut live = Vec::new();
                for &size in sizes.iter().cycle().take(2000) {
                    if let Some(p) = cx.allocate(size) {
                        live.push(p);
                    }
                }
                for p in live {
                    cx.free(Some(p));
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_sequential_allocate,
    bench_alloc_free_churn,
    bench_mixed_size_classes
);
criterion_main!(benches);
