use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::storage::ShortLink;

/// 可缓存的实体
///
/// 缓存层只存放这里列出的类型，读取方通过模式匹配取回；
/// 类型不符时按未命中处理。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Link(ShortLink),
}

impl CacheValue {
    pub fn into_link(self) -> Option<ShortLink> {
        match self {
            CacheValue::Link(link) => Some(link),
        }
    }
}

impl From<ShortLink> for CacheValue {
    fn from(link: ShortLink) -> Self {
        CacheValue::Link(link)
    }
}

/// 缓存统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: u64,
    pub hits: u64,
    pub misses: u64,
    pub evicted: u64,
}

/// 键值缓存原语
///
/// 约定为不会失败：读取失败即未命中，写入和删除尽力而为。
/// 实现必须支持多个 worker 并发调用。
#[async_trait]
pub trait ObjectCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<CacheValue>;

    /// `ttl` 为 `None` 时不设置显式过期，仅受后端自身淘汰策略影响
    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>);

    async fn delete(&self, key: &str);

    async fn stats(&self) -> CacheStats;

    fn backend_name(&self) -> &'static str;
}
