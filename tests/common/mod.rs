//! Shared test doubles
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use linkgate::errors::Result;
use linkgate::services::{LinkResolver, LinkService};
use linkgate::shortener::CodeGenerator;
use linkgate::storage::{
    CreateLinkRequest, LinkStats, MemoryRepository, ShortLink, UpdateLinkRequest,
};

/// Per-method call counters
#[derive(Default)]
pub struct CallCounts {
    pub create: AtomicUsize,
    pub get: AtomicUsize,
    pub get_by_code: AtomicUsize,
    pub update: AtomicUsize,
    pub delete: AtomicUsize,
    pub record_click: AtomicUsize,
}

impl CallCounts {
    pub fn get_by_code(&self) -> usize {
        self.get_by_code.load(Ordering::SeqCst)
    }

    pub fn get(&self) -> usize {
        self.get.load(Ordering::SeqCst)
    }
}

/// Wraps a resolver and counts every delegated call
pub struct CountingResolver {
    inner: Arc<dyn LinkResolver>,
    pub calls: CallCounts,
    /// Artificial latency added to `record_click`
    pub click_delay: Option<Duration>,
}

impl CountingResolver {
    pub fn new(inner: Arc<dyn LinkResolver>) -> Self {
        Self {
            inner,
            calls: CallCounts::default(),
            click_delay: None,
        }
    }

    pub fn with_click_delay(mut self, delay: Duration) -> Self {
        self.click_delay = Some(delay);
        self
    }
}

#[async_trait]
impl LinkResolver for CountingResolver {
    async fn create(&self, req: CreateLinkRequest) -> Result<ShortLink> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        self.inner.create(req).await
    }

    async fn get(&self, id: &str) -> Result<ShortLink> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id).await
    }

    async fn get_by_code(&self, code: &str) -> Result<ShortLink> {
        self.calls.get_by_code.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_code(code).await
    }

    async fn update(&self, id: &str, req: UpdateLinkRequest) -> Result<ShortLink> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        self.inner.update(id, req).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(id).await
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
        self.calls.record_click.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.click_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.record_click(id, referrer, user_agent, ip).await
    }

    async fn get_link_stats(&self, id: &str) -> Result<LinkStats> {
        self.inner.get_link_stats(id).await
    }
}

pub fn memory_service() -> (Arc<LinkService>, Arc<MemoryRepository>) {
    let repo = Arc::new(MemoryRepository::new());
    let service = Arc::new(LinkService::new(repo.clone(), CodeGenerator::default()));
    (service, repo)
}
