//! Server runtime
//!
//! - `lifetime::startup`: builds the shared components from configuration
//! - `lifetime::shutdown`: signal handling and ordered teardown
//! - `modes::server`: the actix-web server

pub mod lifetime;
pub mod modes;
