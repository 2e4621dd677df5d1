use async_trait::async_trait;

use crate::errors::Result;
use crate::storage::{CreateLinkRequest, LinkStats, ShortLink, UpdateLinkRequest};

/// Link resolution contract shared by [`LinkService`](super::LinkService)
/// and the caching decorator wrapping it.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn create(&self, req: CreateLinkRequest) -> Result<ShortLink>;

    async fn get(&self, id: &str) -> Result<ShortLink>;

    async fn get_by_code(&self, code: &str) -> Result<ShortLink>;

    async fn update(&self, id: &str, req: UpdateLinkRequest) -> Result<ShortLink>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// 1-based page; returns (page items, total count)
    async fn list(&self, page: u64, page_size: u64) -> Result<(Vec<ShortLink>, u64)>;

    async fn record_click(
        &self,
        id: &str,
        referrer: Option<&str>,
        user_agent: Option<&str>,
        ip: Option<&str>,
    ) -> Result<()>;

    async fn get_link_stats(&self, id: &str) -> Result<LinkStats>;
}
