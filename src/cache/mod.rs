//! Two-key caching over link resolution
//!
//! - `traits`: the `ObjectCache` primitive and `CacheValue`
//! - `object_cache`: moka, in-process map and no-op backends
//! - `decorator`: `CachedLinkService`, the `LinkResolver` wrapper

pub mod decorator;
pub mod object_cache;
pub mod register;
pub mod traits;

pub use decorator::{CachedLinkService, id_key};
pub use register::create_object_cache;
pub use traits::{CacheStats, CacheValue, ObjectCache};
