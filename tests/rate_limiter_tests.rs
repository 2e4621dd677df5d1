//! Rate limiter integration tests
//!
//! Driven by `ManualClock` so refill and idle cleanup are deterministic.

use std::sync::Arc;
use std::time::Duration;

use linkgate::config::RateLimitConfig;
use linkgate::ratelimit::{BucketTable, RateLimiter, RatePolicy};
use linkgate::utils::{Clock, ManualClock};

fn limiter_with(
    capacity: u32,
    window: Duration,
    cleanup: Duration,
) -> (Arc<RateLimiter>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let policy = RatePolicy::new(capacity, window).unwrap();
    let limiter =
        RateLimiter::with_policy(Arc::new(BucketTable::new()), policy, cleanup, clock.clone())
            .unwrap();
    (Arc::new(limiter), clock)
}

// =============================================================================
// Admission
// =============================================================================

#[test]
fn test_capacity_three_window_two_seconds() {
    let (limiter, clock) = limiter_with(3, Duration::from_secs(2), Duration::from_secs(60));
    let start = clock.now();

    let remaining: Vec<u32> = (0..3)
        .map(|_| {
            let d = limiter.allow("client");
            assert!(d.admitted);
            d.remaining
        })
        .collect();
    assert_eq!(remaining, vec![2, 1, 0]);

    let rejected = limiter.allow("client");
    assert!(!rejected.admitted);
    assert_eq!(rejected.remaining, 0);
    assert_eq!(rejected.limit, 3);
    assert_eq!(
        rejected.retry_after,
        Some(start + chrono::TimeDelta::seconds(2))
    );

    clock.advance(Duration::from_secs(2));
    let after = limiter.allow("client");
    assert!(after.admitted);
    assert_eq!(after.remaining, 2);
}

#[test]
fn test_identifiers_do_not_share_tokens() {
    let (limiter, _clock) = limiter_with(2, Duration::from_secs(10), Duration::from_secs(60));

    assert!(limiter.allow("a").admitted);
    assert!(limiter.allow("a").admitted);
    assert!(!limiter.allow("a").admitted);

    let other = limiter.allow("b");
    assert!(other.admitted);
    assert_eq!(other.remaining, 1);
    assert_eq!(limiter.bucket_count(), 2);
}

#[test]
fn test_partial_refill_is_truncated() {
    let (limiter, clock) = limiter_with(4, Duration::from_secs(4), Duration::from_secs(60));
    for _ in 0..4 {
        limiter.allow("c");
    }

    // 0.9s accrues 0.9 token: still empty
    clock.advance(Duration::from_millis(900));
    assert!(!limiter.allow("c").admitted);

    // accrual is measured from the last whole-token refill, so 1.0s total grants one
    clock.advance(Duration::from_millis(100));
    let d = limiter.allow("c");
    assert!(d.admitted);
    assert_eq!(d.remaining, 0);
}

#[test]
fn test_long_idle_refills_to_capacity_only() {
    let (limiter, clock) = limiter_with(5, Duration::from_secs(1), Duration::from_secs(3600));
    limiter.allow("d");
    clock.advance(Duration::from_secs(600));

    assert_eq!(limiter.allow("d").remaining, 4);
}

#[test]
fn test_invalid_configuration_rejected() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
    for config in [
        RateLimitConfig {
            capacity: 0,
            ..Default::default()
        },
        RateLimitConfig {
            window_secs: 0,
            ..Default::default()
        },
        RateLimitConfig {
            cleanup_interval_secs: 0,
            ..Default::default()
        },
    ] {
        let result = RateLimiter::new(Arc::new(BucketTable::new()), &config, clock.clone());
        assert!(result.is_err(), "{:?}", config);
    }
}

#[test]
fn test_concurrent_admission_never_over_admits() {
    let (limiter, _clock) = limiter_with(100, Duration::from_secs(3600), Duration::from_secs(60));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            std::thread::spawn(move || (0..50).filter(|_| limiter.allow("shared").admitted).count())
        })
        .collect();
    let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(admitted, 100);
}

// =============================================================================
// Cleanup task
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cleanup_task_removes_idle_buckets() {
    let (limiter, clock) = limiter_with(3, Duration::from_secs(2), Duration::from_secs(60));
    let handle = limiter.start_cleanup();

    limiter.allow("idle");
    clock.advance(Duration::from_secs(30));
    limiter.allow("active");

    clock.advance(Duration::from_secs(31));
    tokio::time::sleep(Duration::from_secs(61)).await;
    tokio::task::yield_now().await;

    assert_eq!(limiter.peek("idle"), None);
    assert_eq!(limiter.peek("active"), Some(2));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_stops_after_shutdown() {
    let (limiter, clock) = limiter_with(3, Duration::from_secs(2), Duration::from_secs(60));
    let handle = limiter.start_cleanup();
    handle.shutdown().await;

    limiter.allow("kept");
    clock.advance(Duration::from_secs(600));
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(limiter.bucket_count(), 1);
}
