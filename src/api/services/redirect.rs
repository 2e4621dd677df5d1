use actix_web::http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION, REFERER, USER_AGENT};
use actix_web::{HttpRequest, HttpResponse, web};
use tracing::{debug, instrument};

use crate::cache::CachedLinkService;
use crate::errors::LinkgateError;
use crate::services::{ClickDispatcher, ClickEvent, LinkResolver};
use crate::utils::ip::{TrustedProxies, extract_client_ip};
use crate::utils::{Clock, SystemClock, is_valid_short_code};

pub struct RedirectService;

impl RedirectService {
    /// `clock` and `proxies` fall back to the wall clock and an empty trust
    /// list when the app does not register them.
    #[instrument(skip(req, links, clicks, clock, proxies), fields(code = %path))]
    pub async fn handle_redirect(
        path: web::Path<String>,
        req: HttpRequest,
        links: web::Data<CachedLinkService>,
        clicks: web::Data<ClickDispatcher>,
        clock: Option<web::Data<dyn Clock>>,
        proxies: Option<web::Data<TrustedProxies>>,
    ) -> Result<HttpResponse, LinkgateError> {
        let code = path.into_inner();
        if !is_valid_short_code(&code) {
            debug!("Rejecting malformed short code");
            return Ok(Self::not_found());
        }

        let link = match links.get_by_code(&code).await {
            Ok(link) => link,
            Err(e) if e.is_not_found() => {
                debug!("Redirect link not found: {}", code);
                return Ok(Self::not_found());
            }
            Err(e) => return Err(e),
        };

        let now = match &clock {
            Some(clock) => clock.now(),
            None => SystemClock.now(),
        };
        if !link.is_resolvable(now) {
            debug!("Redirect link inactive or expired: {}", code);
            return Ok(Self::not_found());
        }

        clicks.submit(ClickEvent {
            link_id: link.id.clone(),
            referrer: Self::header(&req, REFERER),
            user_agent: Self::header(&req, USER_AGENT),
            ip: Some(extract_client_ip(
                &req.connection_info(),
                req.headers(),
                proxies.as_deref().map(|p| p.as_slice()).unwrap_or_default(),
            )),
        });

        Ok(HttpResponse::TemporaryRedirect()
            .insert_header((LOCATION, link.target))
            .finish())
    }

    fn header(req: &HttpRequest, name: actix_web::http::header::HeaderName) -> Option<String> {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn not_found() -> HttpResponse {
        HttpResponse::NotFound()
            .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
            .insert_header((CACHE_CONTROL, "public, max-age=60"))
            .body("Not Found")
    }
}

/// Redirect routes, registered last so `/api` takes precedence
pub fn redirect_routes() -> actix_web::Scope {
    web::scope("")
        .route("/{code}", web::get().to(RedirectService::handle_redirect))
        .route("/{code}", web::head().to(RedirectService::handle_redirect))
}
