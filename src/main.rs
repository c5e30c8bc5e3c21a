use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use snip::analytics::GeoIpService;
use snip::api::{create_app, AppState};
use snip::clicks::BufferedClickLogger;
use snip::config::Config;
use snip::creator::DefaultCreator;
use snip::links::LinkBuilder;
use snip::pipeline::RequestPipeline;
use snip::qr::PngQrGenerator;
use snip::ratelimit::KeyRateLimiter;
use snip::storage::{self, CachedStorage, ShortUrlStore};
use snip::useragent::HeuristicClassifier;
use snip::validation::Validator;

/// Rendered QR images kept in memory
const QR_CACHE_ENTRIES: u64 = 1_000;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let database = storage::connect(&config.database).await?;
    let storage: Arc<dyn ShortUrlStore> = Arc::new(CachedStorage::new(
        database,
        config.cache.max_entries,
        config.cache.ttl_secs,
    ));
    info!("Database initialized successfully");

    let validator = Arc::new(Validator::from_config(Arc::clone(&storage), &config.validation)?);
    let mut creator = DefaultCreator::new(
        Arc::clone(&storage),
        validator,
        config.default_redirect_mode,
        Duration::from_millis(config.validation.wait_ms),
    );
    if let Some(path) = &config.geoip_country_db_path {
        let geoip = GeoIpService::new(path)?;
        info!("GeoIP country lookup enabled ({path})");
        creator = creator.with_geoip(Arc::new(geoip));
    }

    let clicks = Arc::new(BufferedClickLogger::new(
        Arc::clone(&storage),
        config.clicks.buffer_size,
        config.clicks.flush_interval_ms,
    ));

    let links = LinkBuilder::new(config.public_base_url.clone());
    let qr = PngQrGenerator::new(Arc::clone(&storage), links.clone(), QR_CACHE_ENTRIES);

    let limiter = KeyRateLimiter::from_limit(config.rate_limit_per_minute);
    match &limiter {
        Some(_) => info!("Rate limit: {} requests per key per minute", config.rate_limit_per_minute),
        None => warn!("Rate limiting is disabled"),
    }

    let pipeline = Arc::new(
        RequestPipeline::new(
            Arc::clone(&storage),
            Arc::new(creator),
            clicks.clone(),
            Arc::new(HeuristicClassifier),
            Arc::new(qr),
            links,
        )
        .with_rate_limiter(limiter),
    );

    if pipeline.rate_limiter().is_some() {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                if let Some(limiter) = pipeline.rate_limiter() {
                    limiter.retain_recent();
                }
            }
        });
    }

    let app = create_app(Arc::new(AppState {
        pipeline,
        proxy: config.proxy.clone(),
    }));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Server listening on http://{}", addr);
    info!("   - Short links served as {}/<key>", config.public_base_url);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutting down, flushing buffered clicks...");
    clicks.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
