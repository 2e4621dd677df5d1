//! Server mode
//!
//! Builds the shared components, mounts the routes behind the rate limiter
//! and runs until a shutdown signal arrives.

use actix_web::{
    App, HttpServer,
    middleware::{Compress, Condition},
    web,
};
use anyhow::Result;
use tracing::{error, info, warn};

use crate::api::middleware::RateLimit;
use crate::api::services::{health_routes, link_routes, redirect_routes};
use crate::config::get_config;
use crate::runtime::lifetime;
use crate::utils::Clock;

/// Run the HTTP server
///
/// **Note**: configuration and logging must be initialized before calling
/// this function
pub async fn run_server() -> Result<()> {
    let config = get_config();

    let startup = lifetime::startup::prepare_server_startup(&config).map_err(|e| {
        error!("Server startup failed: {:#}", e);
        e
    })?;

    let links = web::Data::from(startup.links.clone());
    let clicks = web::Data::from(startup.clicks.clone());
    let base_url = web::Data::new(startup.base_url.clone());
    let proxies = web::Data::new(startup.trusted_proxies.clone());
    let clock: web::Data<dyn Clock> = web::Data::from(startup.clock.clone());
    let started = web::Data::new(startup.started.clone());
    let limiter = startup.limiter.clone();
    let limiter_proxies = startup.trusted_proxies.clone();
    let rate_limit_enabled = config.rate_limit.enabled;

    let workers = if config.server.workers == 0 {
        num_cpus::get()
    } else {
        config.server.workers
    }
    .min(32);
    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(Condition::new(
                rate_limit_enabled,
                RateLimit::new(limiter.clone()).trusted_proxies(limiter_proxies.clone()),
            ))
            .app_data(links.clone())
            .app_data(clicks.clone())
            .app_data(base_url.clone())
            .app_data(proxies.clone())
            .app_data(clock.clone())
            .app_data(started.clone())
            .service(health_routes())
            .service(link_routes())
            .service(redirect_routes())
    })
    .workers(workers)
    .disable_signals()
    .bind(&bind_address)?
    .run();

    warn!(
        "Starting server at http://{} with {} workers",
        bind_address, workers
    );
    info!("Short links served from {}", startup.base_url.0);

    let handle = server.handle();
    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::wait_for_signal() => {
            handle.stop(true).await;
        }
    }

    lifetime::shutdown::perform_shutdown(startup.cleanup, &startup.clicks).await;
    Ok(())
}
