use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use crate::errors::{LinkgateError, Result};

/// Admission policy: `capacity` tokens replenished over `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    capacity: u32,
    window: Duration,
}

impl RatePolicy {
    /// Rejects zero capacity and windows shorter than one millisecond, both
    /// of which would divide by zero during refill.
    pub fn new(capacity: u32, window: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(LinkgateError::config(
                "rate limit capacity must be greater than 0",
            ));
        }
        if window.as_millis() == 0 {
            return Err(LinkgateError::config(
                "rate limit window must be at least 1ms",
            ));
        }
        Ok(Self { capacity, window })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn window_millis(&self) -> u128 {
        self.window.as_millis()
    }

    fn window_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.window).unwrap_or(TimeDelta::MAX)
    }
}

/// Per-identifier token bucket with lazy refill.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: u32,
    last_refill: DateTime<Utc>,
    last_access: DateTime<Utc>,
}

impl TokenBucket {
    /// A new bucket starts full.
    pub fn new(policy: &RatePolicy, now: DateTime<Utc>) -> Self {
        Self {
            tokens: policy.capacity,
            last_refill: now,
            last_access: now,
        }
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    pub fn last_refill(&self) -> DateTime<Utc> {
        self.last_refill
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        self.last_access
    }

    /// Add `floor(elapsed / window * capacity)` tokens, capped at capacity.
    ///
    /// The refill timestamp only advances when at least one whole token was
    /// added, so partial progress towards the next token is kept.
    pub fn refill(&mut self, policy: &RatePolicy, now: DateTime<Utc>) {
        let elapsed_ms = (now - self.last_refill).num_milliseconds();
        if elapsed_ms <= 0 {
            return;
        }

        let to_add = (elapsed_ms as u128 * policy.capacity as u128) / policy.window_millis();
        if to_add == 0 {
            return;
        }

        let room = (policy.capacity - self.tokens.min(policy.capacity)) as u128;
        self.tokens += to_add.min(room) as u32;
        self.last_refill = now;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_access = now;
    }

    /// Take one token if available.
    pub fn try_take(&mut self) -> bool {
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Earliest instant at which a refill can grant a full window's worth.
    pub fn retry_after(&self, policy: &RatePolicy) -> DateTime<Utc> {
        self.last_refill
            .checked_add_signed(policy.window_delta())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_idle(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        let threshold = TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.last_access) > threshold
    }
}
