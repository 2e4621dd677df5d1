use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::trace;

use super::{ClickDetail, LinkRepository, LinkStats, ShortLink, UrlRecord};
use crate::errors::{LinkgateError, Result};

/// 统计中保留的来源数量
const TOP_REFERRERS: usize = 5;

/// 无来源时的统计键
const DIRECT_REFERRER: &str = "direct";

/// 基于 DashMap 的内存存储
///
/// 维护三张表：id -> 链接、短码 -> id 索引、哈希 -> URL 记录，
/// 以及按链接分组的点击日志。
#[derive(Default)]
pub struct MemoryRepository {
    links: DashMap<String, ShortLink>,
    codes: DashMap<String, String>,
    urls: DashMap<String, UrlRecord>,
    clicks: DashMap<String, Vec<ClickDetail>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn url_count(&self) -> usize {
        self.urls.len()
    }
}

#[async_trait]
impl LinkRepository for MemoryRepository {
    async fn find_url_by_hash(&self, hash: &str) -> Result<Option<UrlRecord>> {
        Ok(self.urls.get(hash).map(|r| r.clone()))
    }

    async fn insert_url(&self, record: UrlRecord) -> Result<UrlRecord> {
        let stored = self
            .urls
            .entry(record.hash.clone())
            .or_insert(record)
            .clone();
        Ok(stored)
    }

    async fn code_exists(&self, code: &str) -> Result<bool> {
        Ok(self.codes.contains_key(code))
    }

    async fn insert_link(&self, link: ShortLink) -> Result<()> {
        match self.codes.entry(link.code.clone()) {
            Entry::Occupied(_) => {
                return Err(LinkgateError::conflict(format!(
                    "Code '{}' already exists",
                    link.code
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(link.id.clone());
            }
        }
        trace!("MemoryRepository: inserted link {} ({})", link.id, link.code);
        self.links.insert(link.id.clone(), link);
        Ok(())
    }

    async fn get_link(&self, id: &str) -> Result<Option<ShortLink>> {
        Ok(self.links.get(id).map(|l| l.clone()))
    }

    async fn get_link_by_code(&self, code: &str) -> Result<Option<ShortLink>> {
        let Some(id) = self.codes.get(code).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self.links.get(&id).map(|l| l.clone()))
    }

    async fn update_link(&self, link: ShortLink) -> Result<()> {
        // 整个更新期间持有条目写锁，并发删除只能排在前面（NotFound）或后面
        let Some(mut current) = self.links.get_mut(&link.id) else {
            return Err(LinkgateError::not_found(format!(
                "Link '{}' not found",
                link.id
            )));
        };

        if current.code != link.code {
            match self.codes.entry(link.code.clone()) {
                Entry::Occupied(slot) if slot.get() != &link.id => {
                    return Err(LinkgateError::conflict(format!(
                        "Code '{}' already exists",
                        link.code
                    )));
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(link.id.clone());
                }
            }
            self.codes.remove_if(&current.code, |_, id| id == &link.id);
        }

        *current = link;
        Ok(())
    }

    async fn delete_link(&self, id: &str) -> Result<Option<ShortLink>> {
        let Some((_, removed)) = self.links.remove(id) else {
            return Ok(None);
        };
        self.codes.remove_if(&removed.code, |_, owner| owner == id);
        self.clicks.remove(id);
        Ok(Some(removed))
    }

    async fn list_links(&self, offset: u64, limit: u64) -> Result<(Vec<ShortLink>, u64)> {
        let mut all: Vec<ShortLink> = self.links.iter().map(|r| r.value().clone()).collect();
        let total = all.len() as u64;

        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let page = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn insert_click(&self, click: ClickDetail) -> Result<()> {
        self.clicks
            .entry(click.link_id.clone())
            .or_default()
            .push(click);
        Ok(())
    }

    async fn link_stats(&self, link_id: &str) -> Result<LinkStats> {
        let Some(clicks) = self.clicks.get(link_id).map(|c| c.clone()) else {
            return Ok(LinkStats {
                link_id: link_id.to_string(),
                ..Default::default()
            });
        };

        let unique_ips: HashSet<&str> = clicks.iter().filter_map(|c| c.ip.as_deref()).collect();

        let mut referrers: HashMap<&str, u64> = HashMap::new();
        for click in &clicks {
            let key = click.referrer.as_deref().unwrap_or(DIRECT_REFERRER);
            *referrers.entry(key).or_insert(0) += 1;
        }
        let mut top_referrers: Vec<(String, u64)> = referrers
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        top_referrers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_referrers.truncate(TOP_REFERRERS);

        Ok(LinkStats {
            link_id: link_id.to_string(),
            total_clicks: clicks.len() as u64,
            unique_ips: unique_ips.len() as u64,
            last_clicked_at: clicks.iter().map(|c| c.clicked_at).max(),
            top_referrers,
        })
    }
}
