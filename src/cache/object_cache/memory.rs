use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::cache::{CacheStats, CacheValue, ObjectCache};

struct Entry {
    value: CacheValue,
    expires_at: Option<Instant>,
}

/// 基于 DashMap 的缓存
///
/// 过期条目在下一次读取时惰性移除，并计入 `evicted`。
/// 设置了容量上限时，写入新键前若已满，先清理过期条目，仍满则淘汰任意一条；
/// 没有 LRU 语义。`new()` 不设上限。
#[derive(Default)]
pub struct MemoryObjectCache {
    inner: DashMap<String, Entry>,
    max_capacity: Option<u64>,
    hits: AtomicU64,
    misses: AtomicU64,
    evicted: AtomicU64,
}

impl MemoryObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity: Some(max_capacity),
            ..Self::default()
        }
    }

    /// 为新键腾出空间；容量为 0 时返回 false，不写入
    fn make_room(&self, key: &str, max_capacity: u64) -> bool {
        if max_capacity == 0 {
            return false;
        }
        if self.inner.contains_key(key) || (self.inner.len() as u64) < max_capacity {
            return true;
        }

        let now = Instant::now();
        let before = self.inner.len();
        self.inner
            .retain(|_, e| !e.expires_at.is_some_and(|at| at <= now));
        let mut removed = before.saturating_sub(self.inner.len()) as u64;

        while self.inner.len() as u64 >= max_capacity {
            let Some(victim) = self.inner.iter().next().map(|e| e.key().clone()) else {
                break;
            };
            if self.inner.remove(&victim).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            self.evicted.fetch_add(removed, Ordering::Relaxed);
            trace!("MemoryObjectCache: evicted {} entries to admit {}", removed, key);
        }
        true
    }
}

#[async_trait]
impl ObjectCache for MemoryObjectCache {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        let now = Instant::now();
        let found = self.inner.get(key).map(|entry| {
            let expired = entry.expires_at.is_some_and(|at| at <= now);
            (entry.value.clone(), expired)
        });

        match found {
            Some((value, false)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some((_, true)) => {
                if self
                    .inner
                    .remove_if(key, |_, e| e.expires_at.is_some_and(|at| at <= now))
                    .is_some()
                {
                    self.evicted.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) {
        if let Some(max_capacity) = self.max_capacity
            && !self.make_room(key, max_capacity)
        {
            return;
        }
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.inner
            .insert(key.to_string(), Entry { value, expires_at });
    }

    async fn delete(&self, key: &str) {
        self.inner.remove(key);
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.inner.len() as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
