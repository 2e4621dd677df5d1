use async_trait::async_trait;
use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::policy::Expiry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::cache::{CacheStats, CacheValue, ObjectCache};

#[derive(Clone)]
struct Entry {
    value: CacheValue,
    ttl: Option<Duration>,
}

/// 按条目自带的 TTL 计算过期时间，`None` 表示永不过期
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// 基于 moka 的有界缓存
///
/// 超出容量或过期的条目由 moka 淘汰，并计入 `evicted`。
pub struct MokaObjectCache {
    inner: Cache<String, Entry>,
    hits: AtomicU64,
    misses: AtomicU64,
    evicted: Arc<AtomicU64>,
}

impl MokaObjectCache {
    pub fn new(max_capacity: u64) -> Self {
        let evicted = Arc::new(AtomicU64::new(0));
        let evicted_counter = Arc::clone(&evicted);

        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .eviction_listener(move |_key, _value, cause: RemovalCause| {
                if cause.was_evicted() {
                    evicted_counter.fetch_add(1, Ordering::Relaxed);
                }
            })
            .build();

        debug!(
            "MokaObjectCache initialized with max capacity: {}",
            max_capacity
        );
        Self {
            inner,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evicted,
        }
    }

    /// 执行 moka 挂起的维护任务（淘汰、计数），测试中用于获得确定的统计
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }
}

#[async_trait]
impl ObjectCache for MokaObjectCache {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        match self.inner.get(key).await {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) {
        self.inner.insert(key.to_string(), Entry { value, ttl }).await;
    }

    async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    async fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks().await;
        CacheStats {
            size: self.inner.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }

    fn backend_name(&self) -> &'static str {
        "moka"
    }
}
