//! Linkgate - short-link resolution core
//!
//! This library provides the runtime pieces that sit between an HTTP edge and
//! link storage: short-code generation, a two-key caching layer over link
//! resolution, and per-client token-bucket admission control.
//!
//! # Features
//! - **server**: actix-web middleware, routes and the server runtime (default)
//!
//! # Architecture
//! - `shortener`: content hashing and collision-resolving code generation
//! - `ratelimit`: token buckets, the admission check and idle-bucket cleanup
//! - `cache`: cache primitive trait, backends and the caching decorator
//! - `services`: link resolution service and background click dispatch
//! - `storage`: data model and the repository collaborator
//! - `config`: static configuration (TOML + environment)
//! - `system`: logging setup
//! - `api` / `runtime`: HTTP surface and server lifecycle

#[cfg(feature = "server")]
pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod ratelimit;
#[cfg(feature = "server")]
pub mod runtime;
pub mod services;
pub mod shortener;
pub mod storage;
pub mod system;
pub mod utils;
