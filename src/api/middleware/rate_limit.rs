//! Per-client rate limiting middleware
//!
//! Clients are keyed by IP. The first forwarded hop is used only when the peer
//! is a trusted proxy (see [`extract_client_ip`]), else the peer address. Every
//! response carries `X-RateLimit-Limit` and `X-RateLimit-Remaining`; a
//! rejected request gets 429 with `Retry-After` and `X-RateLimit-Reset`.

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::{HeaderMap, HeaderName, HeaderValue},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde_json::json;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::ratelimit::{Decision, RateLimiter};
use crate::utils::ip::{TrustedProxies, extract_client_ip};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";
pub const RETRY_AFTER: &str = "retry-after";

/// Rate limiting middleware factory
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
    trusted_proxies: Arc<TrustedProxies>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            trusted_proxies: Arc::new(TrustedProxies::default()),
        }
    }

    pub fn trusted_proxies(mut self, proxies: TrustedProxies) -> Self {
        self.trusted_proxies = Arc::new(proxies);
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            limiter: Arc::clone(&self.limiter),
            trusted_proxies: Arc::clone(&self.trusted_proxies),
        }))
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
    trusted_proxies: Arc<TrustedProxies>,
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

fn insert_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    insert_header(headers, X_RATELIMIT_LIMIT, decision.limit);
    insert_header(headers, X_RATELIMIT_REMAINING, decision.remaining);
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let client = extract_client_ip(
            &req.connection_info(),
            req.headers(),
            self.trusted_proxies.as_slice(),
        );
        let decision = self.limiter.allow(&client);

        if !decision.admitted {
            let now = self.limiter.clock().now();
            let retry_secs = decision.retry_after_secs(now).unwrap_or(0);
            let reset = decision.retry_after.map(|at| at.timestamp()).unwrap_or(0);
            debug!(
                "Rate limit exceeded for {} on {}, retry in {}s",
                client,
                req.path(),
                retry_secs
            );

            let mut response = HttpResponse::TooManyRequests().json(json!({
                "code": "RATE_LIMITED",
                "error": "Too Many Requests",
                "message": format!("Rate limit exceeded, retry in {} seconds", retry_secs),
            }));
            let headers = response.headers_mut();
            insert_limit_headers(headers, &decision);
            insert_header(headers, RETRY_AFTER, retry_secs);
            insert_header(headers, X_RATELIMIT_RESET, reset);

            return Box::pin(async move { Ok(req.into_response(response.map_into_right_body())) });
        }

        trace!(
            "Rate limit admitted {}: {}/{} remaining",
            client, decision.remaining, decision.limit
        );
        let srv = Rc::clone(&self.service);
        Box::pin(async move {
            let mut res = srv.call(req).await?;
            insert_limit_headers(res.headers_mut(), &decision);
            Ok(res.map_into_left_body())
        })
    }
}
