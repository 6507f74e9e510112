use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use shardlock::{DirectMap, DynamicPoolMap, LockStrategy, ShardedMap, StaticPoolMap};
use std::sync::Arc;

const THREADS: usize = 4;

fn run_increments<S: LockStrategy + 'static>(map: ShardedMap<u32, u32, S>, count: u32) {
    let map = Arc::new(map);
    let threads = (0..THREADS)
        .map(|_| {
            let map = map.clone();
            std::thread::spawn(move || {
                for key in 0..count {
                    *map.write_access(key) += 1;
                }
            })
        })
        .collect::<Vec<_>>();
    threads.into_iter().for_each(|t| t.join().unwrap());
    std::hint::black_box(map.len());
}

fn criterion_benchmark(c: &mut Criterion) {
    let count = 1 << 16;
    let mut group = c.benchmark_group("concurrent_increments");
    group.bench_with_input(BenchmarkId::new("direct", count), &count, |b, &count| {
        b.iter(|| run_increments(DirectMap::try_new(64, 64).unwrap(), count))
    });
    group.bench_with_input(BenchmarkId::new("static_pool", count), &count, |b, &count| {
        b.iter(|| run_increments(StaticPoolMap::try_new(64, 8).unwrap(), count))
    });
    group.bench_with_input(BenchmarkId::new("dynamic_pool", count), &count, |b, &count| {
        b.iter(|| run_increments(DynamicPoolMap::try_new(64, 8).unwrap(), count))
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
