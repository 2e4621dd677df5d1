//! 限流器性能基准测试

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use linkgate::ratelimit::{BucketTable, RateLimiter, RatePolicy};
use linkgate::utils::SystemClock;
use std::sync::Arc;
use std::time::Duration;

fn limiter(capacity: u32) -> Arc<RateLimiter> {
    Arc::new(
        RateLimiter::with_policy(
            Arc::new(BucketTable::new()),
            RatePolicy::new(capacity, Duration::from_secs(60)).unwrap(),
            Duration::from_secs(300),
            Arc::new(SystemClock),
        )
        .unwrap(),
    )
}

fn bench_allow_single_client(c: &mut Criterion) {
    let limiter = limiter(u32::MAX);
    c.bench_function("ratelimit/allow_single_client", |b| {
        b.iter(|| limiter.allow("10.0.0.1"));
    });
}

fn bench_allow_many_clients(c: &mut Criterion) {
    let mut group = c.benchmark_group("ratelimit/allow_many_clients");

    for clients in [100usize, 10_000] {
        let limiter = limiter(60);
        let ids: Vec<String> = (0..clients).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();
        let mut next = 0usize;

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(clients), &clients, |b, _| {
            b.iter(|| {
                next = (next + 1) % ids.len();
                limiter.allow(&ids[next])
            });
        });
    }
    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let limiter = limiter(60);
    for i in 0..10_000 {
        limiter.allow(&format!("client_{}", i));
    }

    c.bench_function("ratelimit/sweep_10k_active", |b| {
        b.iter(|| limiter.sweep());
    });
}

criterion_group!(
    benches,
    bench_allow_single_client,
    bench_allow_many_clients,
    bench_sweep
);
criterion_main!(benches);
