//! Per-client admission control
//!
//! Every [`RateLimiter::allow`] call runs under one exclusive lock over the
//! whole [`BucketTable`]. Each check is O(1) and never awaits, so the lock is
//! only contended, never held across I/O. The single lock is the throughput
//! ceiling of this component; sharding the table would not change the
//! contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::bucket::{RatePolicy, TokenBucket};
use crate::config::RateLimitConfig;
use crate::errors::{LinkgateError, Result};
use crate::utils::Clock;

/// Owned bucket state, shared by the limiter and its cleanup task.
#[derive(Debug, Default)]
pub struct BucketTable {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl BucketTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }
}

/// Outcome of an admission check. Rejection is a normal value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub admitted: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Set only on rejection.
    pub retry_after: Option<DateTime<Utc>>,
}

impl Decision {
    /// Whole seconds until `retry_after`, rounded up.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        self.retry_after.map(|at| {
            let ms = (at - now).num_milliseconds().max(0) as u64;
            ms.div_ceil(1000)
        })
    }
}

pub struct RateLimiter {
    table: Arc<BucketTable>,
    policy: RatePolicy,
    cleanup_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(
        table: Arc<BucketTable>,
        config: &RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let policy = RatePolicy::new(config.capacity, config.window())?;
        Self::with_policy(table, policy, config.cleanup_interval(), clock)
    }

    pub fn with_policy(
        table: Arc<BucketTable>,
        policy: RatePolicy,
        cleanup_interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if cleanup_interval.is_zero() {
            return Err(LinkgateError::config(
                "rate limit cleanup interval must be greater than 0",
            ));
        }
        Ok(Self {
            table,
            policy,
            cleanup_interval,
            clock,
        })
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// Admit or reject one request for `identifier`.
    pub fn allow(&self, identifier: &str) -> Decision {
        let now = self.clock.now();
        let mut buckets = self.table.buckets.lock();

        let bucket = buckets.entry(identifier.to_string()).or_insert_with(|| {
            trace!("RateLimiter: new bucket for {}", identifier);
            TokenBucket::new(&self.policy, now)
        });

        bucket.refill(&self.policy, now);
        bucket.touch(now);

        if bucket.try_take() {
            Decision {
                admitted: true,
                limit: self.policy.capacity(),
                remaining: bucket.tokens(),
                retry_after: None,
            }
        } else {
            trace!("RateLimiter: rejected {}", identifier);
            Decision {
                admitted: false,
                limit: self.policy.capacity(),
                remaining: 0,
                retry_after: Some(bucket.retry_after(&self.policy)),
            }
        }
    }

    /// Tokens currently held for `identifier`, without refilling or consuming.
    pub fn peek(&self, identifier: &str) -> Option<u32> {
        self.table
            .buckets
            .lock()
            .get(identifier)
            .map(TokenBucket::tokens)
    }

    /// Forget `identifier`; its next request starts with a full bucket.
    pub fn reset(&self, identifier: &str) -> bool {
        self.table.buckets.lock().remove(identifier).is_some()
    }

    pub fn bucket_count(&self) -> usize {
        self.table.len()
    }

    /// One cleanup pass: drop buckets idle for longer than the cleanup
    /// interval. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let threshold = self.cleanup_interval;
        let mut buckets = self.table.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_idle(now, threshold));
        before - buckets.len()
    }

    /// Spawn the periodic cleanup task on the current tokio runtime.
    ///
    /// The task stops when [`CleanupHandle::shutdown`] is called or the
    /// handle is dropped.
    pub fn start_cleanup(self: &Arc<Self>) -> CleanupHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let limiter = Arc::clone(self);
        let interval = self.cleanup_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // 第一次 tick 立即返回，跳过
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            debug!(
                                "RateLimiter: cleanup removed {} idle buckets, {} remain",
                                removed,
                                limiter.bucket_count()
                            );
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }
            debug!("RateLimiter: cleanup task stopped");
        });

        CleanupHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Handle to the background cleanup task.
pub struct CleanupHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Stop the timer and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;

    fn limiter(capacity: u32, window_secs: u64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let policy = RatePolicy::new(capacity, Duration::from_secs(window_secs)).unwrap();
        let limiter = RateLimiter::with_policy(
            Arc::new(BucketTable::new()),
            policy,
            Duration::from_secs(60),
            clock.clone(),
        )
        .unwrap();
        (limiter, clock)
    }

    #[test]
    fn test_zero_cleanup_interval_rejected() {
        let policy = RatePolicy::new(1, Duration::from_secs(1)).unwrap();
        let result = RateLimiter::with_policy(
            Arc::new(BucketTable::new()),
            policy,
            Duration::ZERO,
            Arc::new(ManualClock::starting_now()),
        );
        assert!(matches!(result, Err(LinkgateError::Config(_))));
    }

    #[test]
    fn test_new_rejects_zero_config() {
        let config = RateLimitConfig {
            capacity: 0,
            ..Default::default()
        };
        let result = RateLimiter::new(
            Arc::new(BucketTable::new()),
            &config,
            Arc::new(ManualClock::starting_now()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_peek_and_reset() {
        let (limiter, _clock) = limiter(3, 2);
        assert_eq!(limiter.peek("a"), None);

        limiter.allow("a");
        assert_eq!(limiter.peek("a"), Some(2));

        assert!(limiter.reset("a"));
        assert!(!limiter.reset("a"));
        assert_eq!(limiter.allow("a").remaining, 2);
    }

    #[test]
    fn test_retry_after_secs_rounds_up() {
        let (limiter, clock) = limiter(1, 2);
        limiter.allow("a");
        clock.advance(Duration::from_millis(300));

        let decision = limiter.allow("a");
        assert!(!decision.admitted);
        assert_eq!(decision.retry_after_secs(clock.now()), Some(2));
    }

    #[test]
    fn test_sweep_only_removes_idle_buckets() {
        let (limiter, clock) = limiter(3, 2);
        limiter.allow("idle");
        clock.advance(Duration::from_secs(30));
        limiter.allow("busy");
        limiter.allow("busy");

        clock.advance(Duration::from_secs(31));
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.peek("idle"), None);
        assert_eq!(limiter.peek("busy"), Some(1));
    }
}
