use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::errors::{LinkgateError, Result};
use crate::shortener::{DEFAULT_CODE_LENGTH, DEFAULT_MAX_ATTEMPTS, MAX_CODE_LENGTH, MIN_CODE_LENGTH};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - server: 监听地址、端口、worker 数量
/// - shortener: 短码长度与碰撞重试上限
/// - rate_limit: 令牌桶容量、窗口与空闲桶清理间隔
/// - cache: 缓存后端与容量
/// - click: 点击记录工作池
/// - storage: 存储调用超时
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub shortener: ShortenerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub click: ClickConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从默认路径加载配置
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：LG，分隔符：__
    /// 示例：LG__RATE_LIMIT__CAPACITY=120
    /// 列表以逗号分隔：LG__SERVER__TRUSTED_PROXIES=10.0.0.0/8,127.0.0.1
    pub fn load_from(path: &str) -> Result<Self> {
        use config::{Config, Environment, File};

        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("LG")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.trusted_proxies"),
            )
            .build()?;

        let config: StaticConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置，拒绝会导致运行期异常的取值
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.shortener.validate()?;
        self.rate_limit.validate()?;
        self.click.validate()?;

        if self.storage.operation_timeout_ms == 0 {
            return Err(LinkgateError::config(
                "storage.operation_timeout_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// 渲染短链接时使用的公开地址，为空时使用 `http://host:port`
    #[serde(default)]
    pub base_url: Option<String>,
    /// 允许携带 `X-Forwarded-For` 的反向代理（单 IP 或 CIDR）。
    /// 为空时仅信任私有地址与 localhost 的转发头
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            base_url: None,
            trusted_proxies: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn public_base_url(&self) -> String {
        match &self.base_url {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://{}:{}", self.host, self.port),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(bad) = self
            .trusted_proxies
            .iter()
            .find(|proxy| !is_ip_or_cidr(proxy))
        {
            return Err(LinkgateError::config(format!(
                "server.trusted_proxies entry is not an IP or CIDR: {}",
                bad
            )));
        }
        Ok(())
    }
}

fn is_ip_or_cidr(raw: &str) -> bool {
    let raw = raw.trim();
    match raw.split_once('/') {
        None => raw.parse::<IpAddr>().is_ok(),
        Some((network, prefix)) => match (network.parse::<IpAddr>(), prefix.parse::<u8>()) {
            (Ok(IpAddr::V4(_)), Ok(len)) => len <= 32,
            (Ok(IpAddr::V6(_)), Ok(len)) => len <= 128,
            _ => false,
        },
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ShortenerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&self.code_length) {
            return Err(LinkgateError::config(format!(
                "shortener.code_length must be within {}..={}, got {}",
                MIN_CODE_LENGTH, MAX_CODE_LENGTH, self.code_length
            )));
        }
        if self.max_attempts == 0 {
            return Err(LinkgateError::config(
                "shortener.max_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 每个窗口内的令牌数（桶容量）
    #[serde(default = "default_rate_capacity")]
    pub capacity: u32,
    /// 补满整个桶所需的时间
    #[serde(default = "default_rate_window_secs")]
    pub window_secs: u64,
    /// 空闲桶清理间隔，同时也是空闲判定阈值
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_rate_capacity(),
            window_secs: default_rate_window_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(LinkgateError::config(
                "rate_limit.capacity must be greater than 0",
            ));
        }
        if self.window_secs == 0 {
            return Err(LinkgateError::config(
                "rate_limit.window_secs must be greater than 0",
            ));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(LinkgateError::config(
                "rate_limit.cleanup_interval_secs must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// 缓存后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// moka，带容量上限与淘汰
    #[default]
    Moka,
    /// DashMap，按 `max_capacity` 限制条目数（无 LRU，满时先清理过期条目）
    Memory,
    /// 不缓存
    Null,
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Moka => write!(f, "moka"),
            Self::Memory => write!(f, "memory"),
            Self::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            max_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickConfig {
    #[serde(default = "default_click_workers")]
    pub workers: usize,
    #[serde(default = "default_click_queue_size")]
    pub queue_size: usize,
    /// 单次点击记录的超时
    #[serde(default = "default_click_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            workers: default_click_workers(),
            queue_size: default_click_queue_size(),
            timeout_ms: default_click_timeout_ms(),
        }
    }
}

impl ClickConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 || self.queue_size == 0 {
            return Err(LinkgateError::config(
                "click.workers and click.queue_size must be greater than 0",
            ));
        }
        if self.timeout_ms == 0 {
            return Err(LinkgateError::config(
                "click.timeout_ms must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_timeout_ms")]
    pub operation_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: default_storage_timeout_ms(),
        }
    }
}

impl StorageConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" 或 "json"
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub enable_rotation: bool,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            enable_rotation: false,
            max_backups: default_max_backups(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get().clamp(1, 32)
}

fn default_code_length() -> usize {
    DEFAULT_CODE_LENGTH
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_true() -> bool {
    true
}

fn default_rate_capacity() -> u32 {
    60
}

fn default_rate_window_secs() -> u64 {
    60
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_click_workers() -> usize {
    2
}

fn default_click_queue_size() -> usize {
    1024
}

fn default_click_timeout_ms() -> u64 {
    5_000
}

fn default_storage_timeout_ms() -> u64 {
    3_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}
