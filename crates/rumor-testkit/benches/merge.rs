//! Merge, eviction and codec throughput.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rumor_core::{decode_state, encode_state, NodeIdentity, ReplicatedState, Timestamp};

fn state(n: usize, offset: i64) -> ReplicatedState {
    (0..n)
        .map(|i| {
            let id = NodeIdentity::new(format!("10.0.{}.{}", i / 256, i % 256), 7000);
            (id, Timestamp::from_millis(1_000_000 + offset + i as i64))
        })
        .collect()
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    for n in [16, 256, 4096] {
        let local = state(n, 0);
        let remote = state(n, 1);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| black_box(local.clone().merged(black_box(&remote))))
        });
    }
    group.finish();
}

fn bench_evict(c: &mut Criterion) {
    let mut group = c.benchmark_group("evict_expired");
    for n in [16, 256, 4096] {
        let s = state(n, 0);
        let now = Timestamp::from_millis(1_000_000 + n as i64 / 2 + 60_000);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut s = s.clone();
                black_box(s.evict_expired(now, Duration::from_secs(60)))
            })
        });
    }
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let s = state(1024, 0);
    let bytes = encode_state(&s);
    c.bench_function("encode_1024", |b| b.iter(|| encode_state(black_box(&s))));
    c.bench_function("decode_1024", |b| {
        b.iter(|| decode_state(black_box(&bytes)).unwrap())
    });
}

criterion_group!(benches, bench_merge, bench_evict, bench_codec);
criterion_main!(benches);
