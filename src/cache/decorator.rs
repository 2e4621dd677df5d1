//! Caching decorator over [`LinkResolver`]
//!
//! Each link is cached under two keys: its code and `id:<id>`. Reads populate
//! both; writes invalidate every key of the old state before installing the
//! new one. The sequence is not atomic, so a reader racing an update may
//! briefly repopulate a stale entry. A stale entry whose contents no longer
//! match its key is discarded on the next read.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::cache::{CacheStats, CacheValue, ObjectCache};
use crate::errors::Result;
use crate::services::LinkResolver;
use crate::storage::{CreateLinkRequest, LinkStats, ShortLink, UpdateLinkRequest};

const ID_KEY_PREFIX: &str = "id:";

/// Cache key for lookups by link id.
pub fn id_key(id: &str) -> String {
    format!("{}{}", ID_KEY_PREFIX, id)
}

pub struct CachedLinkService {
    inner: Arc<dyn LinkResolver>,
    cache: Arc<dyn ObjectCache>,
}

impl CachedLinkService {
    pub fn new(inner: Arc<dyn LinkResolver>, cache: Arc<dyn ObjectCache>) -> Self {
        debug!("CachedLinkService using {} cache", cache.backend_name());
        Self { inner, cache }
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    /// Look up `key`, accepting the entry only if `matches` holds for it.
    async fn cached(&self, key: &str, matches: impl Fn(&ShortLink) -> bool) -> Option<ShortLink> {
        let link = self.cache.get(key).await?.into_link()?;
        if matches(&link) {
            trace!("Cache hit: {}", key);
            Some(link)
        } else {
            debug!("Discarding mismatched cache entry: {}", key);
            self.cache.delete(key).await;
            None
        }
    }

    async fn store_both(&self, link: &ShortLink) {
        self.cache
            .set(&link.code, CacheValue::Link(link.clone()), None)
            .await;
        self.cache
            .set(&id_key(&link.id), CacheValue::Link(link.clone()), None)
            .await;
    }

    async fn forget(&self, link: &ShortLink) {
        self.cache.delete(&link.code).await;
        self.cache.delete(&id_key(&link.id)).await;
    }
}

#[async_trait]
impl LinkResolver for CachedLinkService {
    async fn create(&self, req: CreateLinkRequest) -> Result<ShortLink> {
        let link = self.inner.create(req).await?;
        self.cache
            .set(&link.code, CacheValue::Link(link.clone()), None)
            .await;
        Ok(link)
    }

    async fn get(&self, id: &str) -> Result<ShortLink> {
        let key = id_key(id);
        if let Some(link) = self.cached(&key, |l| l.id == id).await {
            return Ok(link);
        }

        trace!("Cache miss: {}", key);
        let link = self.inner.get(id).await?;
        self.store_both(&link).await;
        Ok(link)
    }

    async fn get_by_code(&self, code: &str) -> Result<ShortLink> {
        if let Some(link) = self.cached(code, |l| l.code == code).await {
            return Ok(link);
        }

        trace!("Cache miss: {}", code);
        let link = self.inner.get_by_code(code).await?;
        self.store_both(&link).await;
        Ok(link)
    }

    async fn update(&self, id: &str, req: UpdateLinkRequest) -> Result<ShortLink> {
        let old = self.inner.get(id).await?;
        self.cache.delete(&old.code).await;

        let updated = self.inner.update(id, req).await?;

        // 读者可能在委托期间回填了旧状态
        self.cache.delete(&id_key(id)).await;
        if old.code != updated.code {
            self.cache.delete(&old.code).await;
        }
        self.store_both(&updated).await;

        debug!(
            "Cache refreshed for link {}: {} -> {}",
            id, old.code, updated.code
        );
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let old = self.inner.get(id).await?;
        self.inner.delete(id).await?;
        self.forget(&old).await;
        debug!("Cache cleared for deleted link {} ({})", id, old.code);
        Ok(())
    }

    async fn list(&self, page: u64, page_size: u64) -> Result<(Vec<ShortLink>, u64)> {
        self.inner.list(page, page_size).await
    }

    async fn record_click(
        &self,
        id: &str,
        referrer: Option<&str>,
        user_agent: Option<&str>,
        ip: Option<&str>,
    ) -> Result<()> {
        self.inner.record_click(id, referrer, user_agent, ip).await
    }

    async fn get_link_stats(&self, id: &str) -> Result<LinkStats> {
        self.inner.get_link_stats(id).await
    }
}
