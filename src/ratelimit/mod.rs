//! Token-bucket rate limiting
//!
//! - `bucket`: policy and per-identifier bucket with lazy refill
//! - `limiter`: the shared bucket table, admission check and idle cleanup

pub mod bucket;
pub mod limiter;

pub use bucket::{RatePolicy, TokenBucket};
pub use limiter::{BucketTable, CleanupHandle, Decision, RateLimiter};
