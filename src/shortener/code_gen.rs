//! Short code generation
//!
//! Codes are content-addressed: the destination is hashed, the hash (plus an
//! attempt counter after the first try) is re-digested and the digest is
//! encoded with the URL-safe base64 alphabet. A taken candidate is perturbed
//! and regenerated up to a fixed bound.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_128;

use crate::errors::{LinkgateError, Result};
use crate::storage::LinkRepository;
use crate::utils::{is_reserved_short_code, is_valid_short_code};

pub const DEFAULT_CODE_LENGTH: usize = 6;
pub const MIN_CODE_LENGTH: usize = 4;
/// 128-bit digest -> 22 base64 characters
pub const MAX_CODE_LENGTH: usize = 22;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Stable digest of a destination, used for URL-record deduplication and as
/// the generation seed.
pub fn content_hash(url: &str) -> String {
    format!("{:032x}", xxh3_128(url.trim().as_bytes()))
}

/// Candidate code for `hash` on the given attempt (0-based).
pub fn candidate_code(hash: &str, attempt: u32, length: usize) -> String {
    let digest = if attempt == 0 {
        xxh3_128(hash.as_bytes())
    } else {
        xxh3_128(format!("{}:{}", hash, attempt).as_bytes())
    };
    let mut encoded = URL_SAFE_NO_PAD.encode(digest.to_be_bytes());
    encoded.truncate(length.clamp(MIN_CODE_LENGTH, MAX_CODE_LENGTH));
    encoded
}

/// Validate a caller-chosen alias before it is used verbatim as a code.
pub fn validate_alias(alias: &str) -> Result<()> {
    if !is_valid_short_code(alias) {
        return Err(LinkgateError::validation(format!(
            "Invalid alias '{}'. Use 1-64 characters of letters, digits, '_' or '-'",
            alias
        )));
    }
    if is_reserved_short_code(alias) {
        return Err(LinkgateError::validation(format!(
            "Alias '{}' conflicts with a reserved route",
            alias
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    length: usize,
    max_attempts: u32,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_CODE_LENGTH,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl CodeGenerator {
    pub fn new(length: usize, max_attempts: u32) -> Result<Self> {
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&length) {
            return Err(LinkgateError::config(format!(
                "code length must be within {}..={}, got {}",
                MIN_CODE_LENGTH, MAX_CODE_LENGTH, length
            )));
        }
        if max_attempts == 0 {
            return Err(LinkgateError::config("max_attempts must be at least 1"));
        }
        Ok(Self {
            length,
            max_attempts,
        })
    }

    pub fn from_config(config: &crate::config::ShortenerConfig) -> Result<Self> {
        Self::new(config.code_length, config.max_attempts)
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Find a free code for `hash`, checking existence once per attempt.
    ///
    /// Returns `Exhausted` once every attempt collided. Repository errors are
    /// propagated unchanged.
    pub async fn generate<R>(&self, hash: &str, repo: &R) -> Result<String>
    where
        R: LinkRepository + ?Sized,
    {
        self.next_free(hash, 0, repo).await.map(|(code, _)| code)
    }

    /// Like [`generate`](Self::generate), but starts at `first_attempt` and
    /// also returns the attempt that produced the code.
    ///
    /// A caller whose insert lost a race for the returned code resumes at
    /// `attempt + 1`, so the bound covers existence checks and lost inserts
    /// together.
    pub async fn next_free<R>(
        &self,
        hash: &str,
        first_attempt: u32,
        repo: &R,
    ) -> Result<(String, u32)>
    where
        R: LinkRepository + ?Sized,
    {
        for attempt in first_attempt..self.max_attempts {
            let candidate = candidate_code(hash, attempt, self.length);
            // 生成的短码同样不能占用保留路由
            if is_reserved_short_code(&candidate) {
                continue;
            }
            if !repo.code_exists(&candidate).await? {
                if attempt > 0 {
                    debug!(
                        "CodeGenerator: resolved collision for {} after {} attempts",
                        hash,
                        attempt + 1
                    );
                }
                return Ok((candidate, attempt));
            }
        }

        warn!(
            "CodeGenerator: no free code for {} after {} attempts",
            hash, self.max_attempts
        );
        Err(LinkgateError::exhausted(format!(
            "Could not generate a unique code after {} attempts",
            self.max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryRepository, ShortLink};
    use chrono::Utc;

    fn occupy(code: &str) -> ShortLink {
        let now = Utc::now();
        ShortLink {
            id: format!("id-{}", code),
            code: code.to_string(),
            custom_alias: None,
            url_id: "u".to_string(),
            target: "https://example.com".to_string(),
            expires_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash("https://example.com");
        let b = content_hash("https://example.com");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, content_hash("https://example.org"));
        assert_eq!(a, content_hash("  https://example.com "));
    }

    #[test]
    fn test_candidate_code_shape() {
        let hash = content_hash("https://example.com");
        let code = candidate_code(&hash, 0, DEFAULT_CODE_LENGTH);
        assert_eq!(code.len(), DEFAULT_CODE_LENGTH);
        assert!(is_valid_short_code(&code));
        assert_eq!(code, candidate_code(&hash, 0, DEFAULT_CODE_LENGTH));
        assert_ne!(code, candidate_code(&hash, 1, DEFAULT_CODE_LENGTH));
        assert_eq!(candidate_code(&hash, 0, MAX_CODE_LENGTH).len(), MAX_CODE_LENGTH);
    }

    #[test]
    fn test_generator_rejects_bad_settings() {
        assert!(CodeGenerator::new(MIN_CODE_LENGTH - 1, 5).is_err());
        assert!(CodeGenerator::new(MAX_CODE_LENGTH + 1, 5).is_err());
        assert!(CodeGenerator::new(6, 0).is_err());
        assert!(CodeGenerator::new(8, 3).is_ok());
    }

    #[test]
    fn test_validate_alias() {
        assert!(validate_alias("promo-2024").is_ok());
        assert!(matches!(
            validate_alias("bad alias"),
            Err(LinkgateError::Validation(_))
        ));
        assert!(matches!(
            validate_alias("api"),
            Err(LinkgateError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_first_candidate_when_free() {
        let repo = MemoryRepository::new();
        let hash = content_hash("https://example.com");
        let code = CodeGenerator::default().generate(&hash, &repo).await.unwrap();
        assert_eq!(code, candidate_code(&hash, 0, DEFAULT_CODE_LENGTH));
    }

    #[tokio::test]
    async fn test_generate_perturbs_on_collision() {
        let repo = MemoryRepository::new();
        let hash = content_hash("https://example.com/b");
        let taken = candidate_code(&hash, 0, DEFAULT_CODE_LENGTH);
        repo.insert_link(occupy(&taken)).await.unwrap();

        let code = CodeGenerator::default().generate(&hash, &repo).await.unwrap();
        assert_ne!(code, taken);
        assert_eq!(code, candidate_code(&hash, 1, DEFAULT_CODE_LENGTH));
    }

    #[tokio::test]
    async fn test_generate_exhausted_after_bound() {
        let repo = MemoryRepository::new();
        let hash = content_hash("https://example.com/c");
        for attempt in 0..DEFAULT_MAX_ATTEMPTS {
            let taken = candidate_code(&hash, attempt, DEFAULT_CODE_LENGTH);
            repo.insert_link(occupy(&taken)).await.unwrap();
        }

        let err = CodeGenerator::default()
            .generate(&hash, &repo)
            .await
            .unwrap_err();
        assert!(matches!(err, LinkgateError::Exhausted(_)));
    }

    #[tokio::test]
    async fn test_next_free_resumes_after_lost_insert() {
        let repo = MemoryRepository::new();
        let hash = content_hash("https://example.com/d");
        let generator = CodeGenerator::new(DEFAULT_CODE_LENGTH, 3).unwrap();

        let (code, attempt) = generator.next_free(&hash, 1, &repo).await.unwrap();
        assert_eq!(attempt, 1);
        assert_eq!(code, candidate_code(&hash, 1, DEFAULT_CODE_LENGTH));

        let err = generator.next_free(&hash, 3, &repo).await.unwrap_err();
        assert!(matches!(err, LinkgateError::Exhausted(_)));
    }
}
