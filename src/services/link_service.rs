//! Link management service
//!
//! Owns the create/update/delete flows on top of [`LinkRepository`], and
//! invokes the [`CodeGenerator`] when a link has no custom alias.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::StaticConfig;
use crate::errors::{LinkgateError, Result};
use crate::services::LinkResolver;
use crate::shortener::{CodeGenerator, content_hash, validate_alias};
use crate::storage::{
    ClickDetail, CreateLinkRequest, LinkRepository, LinkStats, ShortLink, UpdateLinkRequest,
    UrlRecord,
};
use crate::utils::url_validator::validate_url;
use crate::utils::{Clock, SystemClock};

/// 单页上限
pub const MAX_PAGE_SIZE: u64 = 100;

pub struct LinkService {
    repo: Arc<dyn LinkRepository>,
    generator: CodeGenerator,
    op_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl LinkService {
    pub fn new(repo: Arc<dyn LinkRepository>, generator: CodeGenerator) -> Self {
        Self {
            repo,
            generator,
            op_timeout: crate::config::StorageConfig::default().operation_timeout(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(repo: Arc<dyn LinkRepository>, config: &StaticConfig) -> Result<Self> {
        let generator = CodeGenerator::from_config(&config.shortener)?;
        Ok(Self::new(repo, generator).with_operation_timeout(config.storage.operation_timeout()))
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn generator(&self) -> &CodeGenerator {
        &self.generator
    }

    /// Run one repository step under the configured timeout.
    async fn storage_call<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "LinkService: {} timed out after {}ms",
                    op,
                    self.op_timeout.as_millis()
                );
                Err(LinkgateError::storage(format!(
                    "{} timed out after {}ms",
                    op,
                    self.op_timeout.as_millis()
                )))
            }
        }
    }

    async fn require_link(&self, id: &str) -> Result<ShortLink> {
        self.storage_call("get_link", self.repo.get_link(id))
            .await?
            .ok_or_else(|| LinkgateError::not_found(format!("Link not found: {}", id)))
    }

    /// Pick a code: the alias verbatim, or the first free generated
    /// candidate at or after `first_attempt`. Returns the attempt used.
    async fn resolve_code(
        &self,
        alias: Option<&str>,
        hash: &str,
        first_attempt: u32,
    ) -> Result<(String, u32)> {
        match alias {
            Some(alias) => {
                validate_alias(alias)?;
                if self
                    .storage_call("code_exists", self.repo.code_exists(alias))
                    .await?
                {
                    return Err(LinkgateError::conflict(format!(
                        "Alias already in use: {}",
                        alias
                    )));
                }
                Ok((alias.to_string(), first_attempt))
            }
            None => {
                self.storage_call(
                    "generate_code",
                    self.generator
                        .next_free(hash, first_attempt, self.repo.as_ref()),
                )
                .await
            }
        }
    }

    async fn find_or_insert_url(&self, url: &str, hash: &str) -> Result<UrlRecord> {
        if let Some(existing) = self
            .storage_call("find_url_by_hash", self.repo.find_url_by_hash(hash))
            .await?
        {
            debug!("LinkService: reusing URL record {} for {}", existing.id, url);
            return Ok(existing);
        }

        let record = UrlRecord {
            id: Uuid::new_v4().to_string(),
            original_url: url.to_string(),
            hash: hash.to_string(),
            created_at: self.clock.now(),
        };
        self.storage_call("insert_url", self.repo.insert_url(record))
            .await
    }
}

#[async_trait]
impl LinkResolver for LinkService {
    async fn create(&self, req: CreateLinkRequest) -> Result<ShortLink> {
        let url = req.url.trim();
        validate_url(url)?;

        let now = self.clock.now();
        if let Some(expires_at) = req.expires_at
            && expires_at <= now
        {
            return Err(LinkgateError::validation(
                "Expiration time must be in the future",
            ));
        }

        let hash = content_hash(url);
        let alias = req.custom_alias.as_deref();
        let mut next_attempt = 0;
        let mut record: Option<UrlRecord> = None;

        loop {
            let (code, attempt) = self.resolve_code(alias, &hash, next_attempt).await?;
            let url_record = match record.take() {
                Some(existing) => existing,
                None => self.find_or_insert_url(url, &hash).await?,
            };

            let link = ShortLink {
                id: Uuid::new_v4().to_string(),
                code,
                custom_alias: req.custom_alias.clone(),
                url_id: url_record.id.clone(),
                target: url_record.original_url.clone(),
                expires_at: req.expires_at,
                is_active: true,
                created_at: now,
                updated_at: now,
            };

            match self
                .storage_call("insert_link", self.repo.insert_link(link.clone()))
                .await
            {
                Ok(()) => {
                    info!("Link created: {} -> {} ({})", link.code, link.target, link.id);
                    return Ok(link);
                }
                // 生成的短码在检查与插入之间被并发占用，换下一个候选
                Err(e) if e.is_conflict() && alias.is_none() => {
                    debug!(
                        "LinkService: code {} taken concurrently, retrying from attempt {}",
                        link.code,
                        attempt + 1
                    );
                    next_attempt = attempt + 1;
                    record = Some(url_record);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get(&self, id: &str) -> Result<ShortLink> {
        self.require_link(id).await
    }

    async fn get_by_code(&self, code: &str) -> Result<ShortLink> {
        self.storage_call("get_link_by_code", self.repo.get_link_by_code(code))
            .await?
            .ok_or_else(|| LinkgateError::not_found(format!("Short code not found: {}", code)))
    }

    async fn update(&self, id: &str, req: UpdateLinkRequest) -> Result<ShortLink> {
        let mut link = self.require_link(id).await?;
        let now = self.clock.now();

        if let Some(alias) = req.custom_alias.as_deref()
            && alias != link.code
        {
            validate_alias(alias)?;
            if self
                .storage_call("code_exists", self.repo.code_exists(alias))
                .await?
            {
                return Err(LinkgateError::conflict(format!(
                    "Alias already in use: {}",
                    alias
                )));
            }
            link.code = alias.to_string();
            link.custom_alias = Some(alias.to_string());
        }

        if req.clear_expiration {
            link.expires_at = None;
        } else if let Some(expires_at) = req.expires_at {
            if expires_at <= now {
                return Err(LinkgateError::validation(
                    "Expiration time must be in the future",
                ));
            }
            link.expires_at = Some(expires_at);
        }

        if let Some(is_active) = req.is_active {
            link.is_active = is_active;
        }
        link.updated_at = now;

        self.storage_call("update_link", self.repo.update_link(link.clone()))
            .await?;

        info!("Link updated: {} ({})", link.code, link.id);
        Ok(link)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self
            .storage_call("delete_link", self.repo.delete_link(id))
            .await?
        {
            Some(link) => {
                info!("Link deleted: {} ({})", link.code, link.id);
                Ok(())
            }
            None => Err(LinkgateError::not_found(format!("Link not found: {}", id))),
        }
    }

    async fn list(&self, page: u64, page_size: u64) -> Result<(Vec<ShortLink>, u64)> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(page_size);
        self.storage_call("list_links", self.repo.list_links(offset, page_size))
            .await
    }

    async fn record_click(
        &self,
        id: &str,
        referrer: Option<&str>,
        user_agent: Option<&str>,
        ip: Option<&str>,
    ) -> Result<()> {
        self.require_link(id).await?;
        let click = ClickDetail {
            link_id: id.to_string(),
            referrer: referrer.map(str::to_string),
            user_agent: user_agent.map(str::to_string),
            ip: ip.map(str::to_string),
            clicked_at: self.clock.now(),
        };
        self.storage_call("insert_click", self.repo.insert_click(click))
            .await
    }

    async fn get_link_stats(&self, id: &str) -> Result<LinkStats> {
        self.require_link(id).await?;
        self.storage_call("link_stats", self.repo.link_stats(id))
            .await
    }
}
