pub mod clock;
#[cfg(feature = "server")]
pub mod ip;
pub mod url_validator;

pub use clock::{Clock, ManualClock, SystemClock};

/// 短码最大长度
pub const MAX_SHORT_CODE_LEN: usize = 64;

/// 与内置路由冲突的保留短码
const RESERVED_SHORT_CODES: &[&str] = &["api", "health", "favicon.ico", "robots.txt"];

/// 短码只允许 `[A-Za-z0-9_-]`，长度 1..=64
pub fn is_valid_short_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_SHORT_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// 检查短码是否与保留路由冲突（大小写不敏感）
pub fn is_reserved_short_code(code: &str) -> bool {
    RESERVED_SHORT_CODES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(code))
}
