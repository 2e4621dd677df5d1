use std::sync::Arc;

use tracing::debug;

use crate::cache::ObjectCache;
use crate::cache::object_cache::{MemoryObjectCache, MokaObjectCache, NullObjectCache};
use crate::config::{CacheBackend, CacheConfig};

/// 根据配置构造缓存后端
pub fn create_object_cache(config: &CacheConfig) -> Arc<dyn ObjectCache> {
    let cache: Arc<dyn ObjectCache> = match config.backend {
        CacheBackend::Moka => Arc::new(MokaObjectCache::new(config.max_capacity)),
        CacheBackend::Memory => Arc::new(MemoryObjectCache::with_max_capacity(config.max_capacity)),
        CacheBackend::Null => Arc::new(NullObjectCache::new()),
    };
    debug!("Object cache backend selected: {}", cache.backend_name());
    cache
}
