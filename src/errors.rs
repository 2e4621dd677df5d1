use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkgateError {
    NotFound(String),
    Conflict(String),
    Validation(String),
    Exhausted(String),
    Storage(String),
    Config(String),
}

impl LinkgateError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            LinkgateError::NotFound(_) => "E001",
            LinkgateError::Conflict(_) => "E002",
            LinkgateError::Validation(_) => "E003",
            LinkgateError::Exhausted(_) => "E004",
            LinkgateError::Storage(_) => "E005",
            LinkgateError::Config(_) => "E006",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            LinkgateError::NotFound(_) => "Resource Not Found",
            LinkgateError::Conflict(_) => "Conflict",
            LinkgateError::Validation(_) => "Validation Error",
            LinkgateError::Exhausted(_) => "Code Generation Exhausted",
            LinkgateError::Storage(_) => "Storage Error",
            LinkgateError::Config(_) => "Configuration Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            LinkgateError::NotFound(msg)
            | LinkgateError::Conflict(msg)
            | LinkgateError::Validation(msg)
            | LinkgateError::Exhausted(msg)
            | LinkgateError::Storage(msg)
            | LinkgateError::Config(msg) => msg,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LinkgateError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, LinkgateError::Conflict(_))
    }

    /// 格式化为彩色输出（用于启动失败时的终端提示）
    #[cfg(feature = "server")]
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for LinkgateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for LinkgateError {}

// 便捷的构造函数
impl LinkgateError {
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkgateError::NotFound(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        LinkgateError::Conflict(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        LinkgateError::Validation(msg.into())
    }

    pub fn exhausted<T: Into<String>>(msg: T) -> Self {
        LinkgateError::Exhausted(msg.into())
    }

    pub fn storage<T: Into<String>>(msg: T) -> Self {
        LinkgateError::Storage(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        LinkgateError::Config(msg.into())
    }
}

impl From<config::ConfigError> for LinkgateError {
    fn from(err: config::ConfigError) -> Self {
        LinkgateError::Config(err.to_string())
    }
}

impl From<crate::utils::url_validator::UrlValidationError> for LinkgateError {
    fn from(err: crate::utils::url_validator::UrlValidationError) -> Self {
        LinkgateError::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkgateError>;
