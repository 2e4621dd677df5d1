use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

use crate::cache::{CacheStats, CacheValue, ObjectCache};

/// 不缓存任何内容，所有读取都是未命中
#[derive(Default)]
pub struct NullObjectCache {
    misses: std::sync::atomic::AtomicU64,
}

impl NullObjectCache {
    pub fn new() -> Self {
        trace!("Using NullObjectCache: lookups always go to the link service");
        Self::default()
    }
}

#[async_trait]
impl ObjectCache for NullObjectCache {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        trace!("NullObjectCache.get called for key: {}", key);
        self.misses
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        None
    }

    async fn set(&self, key: &str, _value: CacheValue, _ttl: Option<Duration>) {
        trace!("NullObjectCache.set called for key: {}", key);
    }

    async fn delete(&self, key: &str) {
        trace!("NullObjectCache.delete called for key: {}", key);
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
            ..Default::default()
        }
    }

    fn backend_name(&self) -> &'static str {
        "null"
    }
}
