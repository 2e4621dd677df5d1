use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::services::{AppStartTime, PublicBaseUrl};
use crate::cache::{CachedLinkService, create_object_cache};
use crate::config::StaticConfig;
use crate::ratelimit::{BucketTable, CleanupHandle, RateLimiter};
use crate::services::{ClickDispatcher, LinkResolver, LinkService};
use crate::storage::{LinkRepository, MemoryRepository};
use crate::utils::ip::TrustedProxies;
use crate::utils::{Clock, SystemClock};

/// Components shared by every HTTP worker
pub struct StartupContext {
    pub links: Arc<CachedLinkService>,
    pub clicks: Arc<ClickDispatcher>,
    pub limiter: Arc<RateLimiter>,
    /// Present only when rate limiting is enabled
    pub cleanup: Option<CleanupHandle>,
    pub base_url: PublicBaseUrl,
    pub trusted_proxies: TrustedProxies,
    /// Shared by the link service, the limiter and the HTTP handlers
    pub clock: Arc<dyn Clock>,
    pub started: AppStartTime,
}

/// Build storage, services, cache and rate limiter from `config`.
///
/// Must run inside a tokio runtime: the click workers and the bucket cleanup
/// task are spawned here.
pub fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryRepository::new());
    let service = LinkService::from_config(repo, config)
        .context("Failed to build link service")?
        .with_clock(Arc::clone(&clock));
    let service: Arc<dyn LinkResolver> = Arc::new(service);

    let cache = create_object_cache(&config.cache);
    let links = Arc::new(CachedLinkService::new(service, cache));
    let clicks = Arc::new(ClickDispatcher::start(links.clone(), &config.click));

    let limiter = Arc::new(
        RateLimiter::new(
            Arc::new(BucketTable::new()),
            &config.rate_limit,
            Arc::clone(&clock),
        )
            .context("Failed to build rate limiter")?,
    );
    let cleanup = if config.rate_limit.enabled {
        info!(
            "Rate limiting enabled: {} requests per {}s, cleanup every {}s",
            config.rate_limit.capacity,
            config.rate_limit.window_secs,
            config.rate_limit.cleanup_interval_secs
        );
        Some(limiter.start_cleanup())
    } else {
        info!("Rate limiting disabled");
        None
    };

    if !config.server.trusted_proxies.is_empty() {
        info!(
            "Forwarded client IPs trusted from: {}",
            config.server.trusted_proxies.join(", ")
        );
    }

    debug!(
        "Server components ready in {:?} (cache: {})",
        start_time.elapsed(),
        links.backend_name()
    );

    Ok(StartupContext {
        links,
        clicks,
        limiter,
        cleanup,
        base_url: PublicBaseUrl(config.server.public_base_url()),
        trusted_proxies: TrustedProxies::new(config.server.trusted_proxies.clone()),
        started: AppStartTime {
            start_datetime: clock.now(),
        },
        clock,
    })
}
