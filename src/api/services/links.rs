//! Link management endpoints under `/api`

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheStats, CachedLinkService};
use crate::errors::LinkgateError;
use crate::services::{ClickDispatcher, DispatcherStats, LinkResolver, MAX_PAGE_SIZE};
use crate::storage::{CreateLinkRequest, ShortLink, UpdateLinkRequest};

pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Public address prefix used to render `short_url`
#[derive(Debug, Clone)]
pub struct PublicBaseUrl(pub String);

#[derive(Debug, Serialize)]
pub struct LinkView {
    #[serde(flatten)]
    pub link: ShortLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_url: Option<String>,
}

impl LinkView {
    fn new(link: ShortLink, base: Option<&web::Data<PublicBaseUrl>>) -> Self {
        let short_url = base.map(|base| format!("{}/{}", base.0, link.code));
        Self { link, short_url }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct LinkPage {
    pub items: Vec<LinkView>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub backend: &'static str,
    pub cache: CacheStats,
    pub clicks: DispatcherStats,
}

pub struct LinkApi;

impl LinkApi {
    pub async fn create_link(
        links: web::Data<CachedLinkService>,
        base: Option<web::Data<PublicBaseUrl>>,
        body: web::Json<CreateLinkRequest>,
    ) -> Result<HttpResponse, LinkgateError> {
        let link = links.create(body.into_inner()).await?;
        Ok(HttpResponse::Created().json(LinkView::new(link, base.as_ref())))
    }

    pub async fn list_links(
        links: web::Data<CachedLinkService>,
        base: Option<web::Data<PublicBaseUrl>>,
        query: web::Query<ListQuery>,
    ) -> Result<HttpResponse, LinkgateError> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let (items, total) = links.list(page, page_size).await?;
        debug!("Listing links page {} ({} of {})", page, items.len(), total);

        Ok(HttpResponse::Ok().json(LinkPage {
            items: items
                .into_iter()
                .map(|link| LinkView::new(link, base.as_ref()))
                .collect(),
            page,
            page_size,
            total,
        }))
    }

    pub async fn get_link(
        links: web::Data<CachedLinkService>,
        base: Option<web::Data<PublicBaseUrl>>,
        id: web::Path<String>,
    ) -> Result<HttpResponse, LinkgateError> {
        let link = links.get(&id).await?;
        Ok(HttpResponse::Ok().json(LinkView::new(link, base.as_ref())))
    }

    pub async fn update_link(
        links: web::Data<CachedLinkService>,
        base: Option<web::Data<PublicBaseUrl>>,
        id: web::Path<String>,
        body: web::Json<UpdateLinkRequest>,
    ) -> Result<HttpResponse, LinkgateError> {
        let link = links.update(&id, body.into_inner()).await?;
        Ok(HttpResponse::Ok().json(LinkView::new(link, base.as_ref())))
    }

    pub async fn delete_link(
        links: web::Data<CachedLinkService>,
        id: web::Path<String>,
    ) -> Result<HttpResponse, LinkgateError> {
        links.delete(&id).await?;
        Ok(HttpResponse::NoContent().finish())
    }

    pub async fn link_stats(
        links: web::Data<CachedLinkService>,
        id: web::Path<String>,
    ) -> Result<HttpResponse, LinkgateError> {
        let stats = links.get_link_stats(&id).await?;
        Ok(HttpResponse::Ok().json(stats))
    }

    pub async fn cache_stats(
        links: web::Data<CachedLinkService>,
        clicks: web::Data<ClickDispatcher>,
    ) -> HttpResponse {
        HttpResponse::Ok().json(CacheReport {
            backend: links.backend_name(),
            cache: links.cache_stats().await,
            clicks: clicks.stats(),
        })
    }
}

pub fn link_routes() -> actix_web::Scope {
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| LinkgateError::validation(err.to_string()).into());

    web::scope("/api")
        .app_data(json_config)
        .route("/links", web::post().to(LinkApi::create_link))
        .route("/links", web::get().to(LinkApi::list_links))
        .route("/links/{id}", web::get().to(LinkApi::get_link))
        .route("/links/{id}", web::put().to(LinkApi::update_link))
        .route("/links/{id}", web::delete().to(LinkApi::delete_link))
        .route("/links/{id}/stats", web::get().to(LinkApi::link_stats))
        .route("/cache/stats", web::get().to(LinkApi::cache_stats))
}
