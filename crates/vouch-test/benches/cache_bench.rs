//! Benchmarks for duplicate cache check and insert

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use vouch_cache::{CacheConfig, CachePolicy, DuplicateCache};
use vouch_core::{CacheKey, MessageRecord, NodeId};

fn keys(count: u32) -> Vec<CacheKey> {
    (0..count)
        .map(|n| MessageRecord::attestation(n, NodeId::new(10), NodeId::new(n as u16 % 7), 0).key())
        .collect()
}

fn filled(policy: CachePolicy, capacity: usize) -> DuplicateCache {
    let mut cache = DuplicateCache::new(&CacheConfig {
        capacity,
        policy,
        grace: Some(60_000),
    });
    for (i, key) in keys(capacity as u32).into_iter().enumerate() {
        let _ = cache.insert(key, i as u64);
    }
    cache
}

fn bench_is_duplicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_duplicate");
    for capacity in [16usize, 256] {
        let lookups = keys(capacity as u32 * 2);
        for (name, policy) in [
            ("round_robin", CachePolicy::RoundRobin),
            ("hashed", CachePolicy::Hashed { buckets: 64 }),
        ] {
            let cache = filled(policy, capacity);
            group.bench_with_input(BenchmarkId::new(name, capacity), &lookups, |b, lookups| {
                b.iter(|| lookups.iter().filter(|k| cache.is_duplicate(black_box(k))).count())
            });
        }
    }
    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_full");
    let fresh = keys(1024);
    for (name, policy) in [
        ("round_robin", CachePolicy::RoundRobin),
        ("hashed", CachePolicy::Hashed { buckets: 64 }),
    ] {
        group.bench_function(name, |b| {
            let mut cache = filled(policy, 16);
            let mut now = 16u64;
            b.iter(|| {
                for key in &fresh {
                    now += 1;
                    let _ = cache.insert(black_box(key.clone()), now);
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_is_duplicate, bench_insert);
criterion_main!(benches);
