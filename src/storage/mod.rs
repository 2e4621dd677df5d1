//! Link storage collaborator
//!
//! The core only depends on [`LinkRepository`]; [`memory::MemoryRepository`]
//! is the in-process implementation used by the server and the tests.

pub mod memory;
pub mod models;

use async_trait::async_trait;

use crate::errors::Result;

pub use memory::MemoryRepository;
pub use models::{
    ClickDetail, CreateLinkRequest, LinkStats, ShortLink, UpdateLinkRequest, UrlRecord,
};

#[async_trait]
pub trait LinkRepository: Send + Sync {
    async fn find_url_by_hash(&self, hash: &str) -> Result<Option<UrlRecord>>;

    /// 插入 URL 记录；同一哈希已存在时返回已有记录
    async fn insert_url(&self, record: UrlRecord) -> Result<UrlRecord>;

    async fn code_exists(&self, code: &str) -> Result<bool>;

    /// 插入短链接；短码已被占用时返回 `Conflict`
    async fn insert_link(&self, link: ShortLink) -> Result<()>;

    async fn get_link(&self, id: &str) -> Result<Option<ShortLink>>;

    async fn get_link_by_code(&self, code: &str) -> Result<Option<ShortLink>>;

    /// 覆盖已有短链接并维护短码索引
    /// - 链接不存在：`NotFound`
    /// - 新短码属于其他链接：`Conflict`
    async fn update_link(&self, link: ShortLink) -> Result<()>;

    /// 删除短链接，返回被删除的记录
    async fn delete_link(&self, id: &str) -> Result<Option<ShortLink>>;

    /// 按创建时间倒序分页，返回 (当前页, 总数)
    async fn list_links(&self, offset: u64, limit: u64) -> Result<(Vec<ShortLink>, u64)>;

    async fn insert_click(&self, click: ClickDetail) -> Result<()>;

    async fn link_stats(&self, link_id: &str) -> Result<LinkStats>;
}
