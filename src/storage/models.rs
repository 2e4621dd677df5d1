use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 短链接
///
/// `code` 始终是对外可见的查找键：未设置别名时为生成的短码，
/// 设置别名后等于别名本身。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub custom_alias: Option<String>,
    pub url_id: String,
    pub target: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShortLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// 是否可以用于重定向：已启用且未过期
    pub fn is_resolvable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }
}

/// 目标地址记录，按内容哈希去重
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub id: String,
    pub original_url: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

/// 单次点击
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickDetail {
    pub link_id: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub clicked_at: DateTime<Utc>,
}

/// 单个链接的点击统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LinkStats {
    pub link_id: String,
    pub total_clicks: u64,
    pub unique_ips: u64,
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub top_referrers: Vec<(String, u64)>,
}

/// 创建短链接请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,
    #[serde(default)]
    pub custom_alias: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateLinkRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.custom_alias = Some(alias.into());
        self
    }
}

/// 更新短链接请求（补丁语义，`None` 表示保持不变）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLinkRequest {
    #[serde(default)]
    pub custom_alias: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// 为 true 时移除过期时间（优先于 `expires_at`）
    #[serde(default)]
    pub clear_expiration: bool,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UpdateLinkRequest {
    pub fn alias(alias: impl Into<String>) -> Self {
        Self {
            custom_alias: Some(alias.into()),
            ..Default::default()
        }
    }
}
