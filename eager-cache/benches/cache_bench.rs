//! Criterion benchmarks for eagercache: fast-path reads, first reads, and sweep passes.

use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use eager_cache::{EagerCache, Registry};

const HOUR: Duration = Duration::from_secs(3600);

fn warm_cache(registry: &std::sync::Arc<Registry>, keys: usize) -> EagerCache<String> {
    let cache = registry
        .create_cache(HOUR, |key: &str| Ok(key.repeat(4)))
        .unwrap();
    for i in 0..keys {
        let key = format!("key-{i}");
        cache.get(&key).unwrap();
        cache.get(&key).unwrap();
    }
    cache
}

fn bench_get(c: &mut Criterion) {
    let registry = Registry::new();
    let cache = warm_cache(&registry, 1024);

    let mut g = c.benchmark_group("get");
    g.throughput(Throughput::Elements(1));
    g.bench_function("fast_path_hit", |b| {
        b.iter(|| black_box(cache.get(black_box("key-512")).unwrap()));
    });
    g.bench_function("miss_and_load", |b| {
        b.iter_batched(
            || {
                cache.invalidate("cold").unwrap();
            },
            |_| black_box(cache.get("cold").unwrap()),
            BatchSize::SmallInput,
        );
    });
    g.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let registry = Registry::new();

    let mut g = c.benchmark_group("sweep");
    g.throughput(Throughput::Elements(256));
    g.bench_function("refresh_256_accessed", |b| {
        b.iter_batched(
            || warm_cache(&registry, 256),
            |cache| black_box(cache.sweep_expired(Instant::now() + 2 * HOUR)),
            BatchSize::LargeInput,
        );
    });
    g.bench_function("evict_256_unread", |b| {
        b.iter_batched(
            || {
                let cache = registry
                    .create_cache(HOUR, |key: &str| Ok(key.to_string()))
                    .unwrap();
                for i in 0..256 {
                    cache.get(&format!("key-{i}")).unwrap();
                }
                cache
            },
            |cache| black_box(cache.sweep_expired(Instant::now() + 2 * HOUR)),
            BatchSize::LargeInput,
        );
    });
    g.finish();
}

criterion_group!(benches, bench_get, bench_sweep);
criterion_main!(benches);
