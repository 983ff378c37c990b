// Main entry point for the metadata server

use std::sync::Arc;

use anyhow::{Context, Result};
use metadata_extractor::{
    Extractor, HttpFetcher, MetadataExtractor, UrlValidator, ValidatedFetcher,
};
use server_core::{kernel::ServerDeps, server::build_app, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn build_extractor(config: &Config) -> Result<Arc<dyn Extractor>> {
    let extractor: Arc<dyn Extractor> = if config.block_private_networks {
        let validator = UrlValidator::new();
        let fetcher =
            HttpFetcher::with_redirect_guard(&config.crawler_user_agent, validator.clone())
                .context("Failed to build HTTP client")?
                .with_max_page_bytes(config.max_page_bytes);
        Arc::new(MetadataExtractor::with_config(
            ValidatedFetcher::with_validator(fetcher, validator),
            config.extractor(),
        ))
    } else {
        tracing::warn!("Private network blocking disabled");
        let fetcher = HttpFetcher::with_user_agent(&config.crawler_user_agent)
            .context("Failed to build HTTP client")?
            .with_max_page_bytes(config.max_page_bytes);
        Arc::new(MetadataExtractor::with_config(fetcher, config.extractor()))
    };
    Ok(extractor)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,metadata_extractor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting metadata server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        rate_limit = config.rate_limit_max_requests,
        window_secs = config.rate_limit_window_secs,
        cache_max_entries = config.cache_max_entries,
        trust_proxy_headers = config.trust_proxy_headers,
        "Configuration loaded"
    );

    let extractor = build_extractor(&config)?;
    let deps = ServerDeps::with_system_clock(extractor, config.gateway());
    let app = build_app(deps, &config.app_options());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
