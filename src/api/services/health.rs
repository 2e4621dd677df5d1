use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, trace};

use crate::cache::CachedLinkService;
use crate::services::{ClickDispatcher, DispatcherStats, LinkResolver};
use crate::utils::{Clock, SystemClock};

const STORAGE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// 应用启动时间
#[derive(Debug, Clone)]
pub struct AppStartTime {
    pub start_datetime: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthStorageCheck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthCacheCheck {
    pub backend: &'static str,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<i64>,
    pub storage: HealthStorageCheck,
    pub cache: HealthCacheCheck,
    pub clicks: DispatcherStats,
    pub response_time_ms: u64,
}

/// Health Service
///
/// 只读检查：存储以一次单条分页查询探测，缓存和点击队列直接读取统计。
pub struct HealthService;

impl HealthService {
    pub async fn health_check(
        links: web::Data<CachedLinkService>,
        clicks: web::Data<ClickDispatcher>,
        started: Option<web::Data<AppStartTime>>,
        clock: Option<web::Data<dyn Clock>>,
    ) -> HttpResponse {
        let start_time = Instant::now();
        trace!("Received health check request");

        let storage = match tokio::time::timeout(STORAGE_CHECK_TIMEOUT, links.list(1, 1)).await {
            Ok(Ok((_, total))) => HealthStorageCheck {
                status: "healthy",
                links_count: Some(total),
                error: None,
            },
            Ok(Err(e)) => {
                error!("Storage health check failed: {}", e);
                HealthStorageCheck {
                    status: "unhealthy",
                    links_count: None,
                    error: Some(e.to_string()),
                }
            }
            Err(_) => {
                error!("Storage health check timeout");
                HealthStorageCheck {
                    status: "unhealthy",
                    links_count: None,
                    error: Some("timeout".to_string()),
                }
            }
        };

        let cache = HealthCacheCheck {
            backend: links.backend_name(),
            size: links.cache_stats().await.size,
        };

        let now = match &clock {
            Some(clock) => clock.now(),
            None => SystemClock.now(),
        };
        let healthy = storage.status == "healthy";
        let response = HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
            uptime_secs: started.map(|s| (now - s.start_datetime).num_seconds()),
            storage,
            cache,
            clicks: clicks.stats(),
            response_time_ms: start_time.elapsed().as_millis() as u64,
        };

        if healthy {
            HttpResponse::Ok().json(response)
        } else {
            HttpResponse::ServiceUnavailable().json(response)
        }
    }
}

pub fn health_routes() -> actix_web::Resource {
    web::resource("/health")
        .route(web::get().to(HealthService::health_check))
        .route(web::head().to(HealthService::health_check))
}
