//! HTTP surface
//!
//! - `error`: `LinkgateError` to HTTP response mapping
//! - `middleware`: per-client rate limiting
//! - `services`: redirect and link management handlers

pub mod error;
pub mod middleware;
pub mod services;
