//! HTTP service exposing the PPP price comparison.

pub mod handlers;

use crate::commands::build_normalizer;
use crate::config::{Config, ServerConfig};
use crate::normalizer::PriceNormalizer;
use crate::regions::RegionCode;
use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub normalizer: PriceNormalizer,
    /// Regions priced for every request
    pub regions: Arc<Vec<RegionCode>>,
}

impl AppState {
    pub fn new(normalizer: PriceNormalizer, regions: Vec<RegionCode>) -> Self {
        Self { normalizer, regions: Arc::new(regions) }
    }
}

/// Starts the server and runs until Ctrl-C.
pub async fn start_server(config: Config) -> Result<()> {
    let normalizer = build_normalizer(&config)?;
    let state = AppState::new(normalizer, config.regions.clone());
    let app = create_router(state, &config.server)?;

    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.server.host))?;
    let addr = SocketAddr::from((host, config.server.port));

    info!("Starting steam-ppp server on {}", addr);
    info!(
        "Pricing {} regions, CORS origins: {}",
        config.regions.len(),
        config.server.cors_origins.join(", ")
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Builds the router with CORS and request tracing.
pub fn create_router(state: AppState, server: &ServerConfig) -> Result<Router> {
    let origins = server
        .cors_origins
        .iter()
        .map(|o| o.parse::<HeaderValue>().with_context(|| format!("Invalid CORS origin: {}", o)))
        .collect::<Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/api/get_prices", post(handlers::get_prices))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
