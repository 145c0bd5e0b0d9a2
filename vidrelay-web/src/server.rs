//! HTTP server for Vidrelay
//!
//! Wires the resolver, search service and media relay into an axum router
//! and runs it until Ctrl-C.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use vidrelay_core::{
    ConfigError, HttpTransport, MediaRelay, RelayConfig, ResilientFetcher, StreamResolver,
    UpstreamConfig,
};
use vidrelay_search::SearchService;

use crate::handlers::{api_search, api_video, health, legacy_video, proxy_video};

/// Errors that prevent the server from starting or keep it from serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Mirror list empty or malformed
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client could not be initialized
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Listener address unavailable
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Address passed to `bind`
        address: String,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// Accept loop failed
    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Shared state handed to every handler.
///
/// Everything inside is immutable and cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Mirror-walking fetcher shared by resolver and search
    pub fetcher: Arc<ResilientFetcher>,
    /// Video id to stream resolution
    pub resolver: StreamResolver,
    /// Search and result normalization
    pub search: SearchService,
    /// Media byte relay for `/proxy-video`
    pub relay: MediaRelay,
    /// Process start, reported by `/health`
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Builds state around an existing fetcher and relay.
    pub fn new(fetcher: Arc<ResilientFetcher>, relay: MediaRelay) -> Self {
        Self {
            resolver: StreamResolver::new(Arc::clone(&fetcher)),
            search: SearchService::new(Arc::clone(&fetcher)),
            fetcher,
            relay,
            started_at: Utc::now(),
        }
    }

    /// Builds production state with real HTTP clients.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` - Mirror list is empty or malformed
    /// - `ServerError::HttpClient` - HTTP client initialization failed
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ServerError> {
        let registry = Arc::new(config.registry()?);
        let transport = Arc::new(HttpTransport::new(config)?);
        let fetcher = ResilientFetcher::new(registry, transport, config.retry_policy());
        let relay = MediaRelay::new(config)?;
        Ok(Self::new(Arc::new(fetcher), relay))
    }
}

/// Builds the application router.
///
/// When `static_dir` is given, paths not matched by an API route are served
/// from it.
pub fn build_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route("/api/video/{id}", get(api_video))
        .route("/api/search", get(api_search))
        .route("/video", get(legacy_video))
        .route("/proxy-video", get(proxy_video))
        .route("/health", get(health));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(CorsLayer::permissive()).with_state(state)
}

/// Runs the relay server until Ctrl-C.
///
/// # Errors
///
/// - `ServerError::Config` / `ServerError::HttpClient` - State could not be built
/// - `ServerError::Bind` - Listener address unavailable
/// - `ServerError::Serve` - Accept loop failed
pub async fn run_server(config: RelayConfig) -> Result<(), ServerError> {
    let state = AppState::from_config(&config.upstream)?;
    let mirrors = state.fetcher.registry().len();
    let primary = state.fetcher.registry().primary().to_string();
    let app = build_router(state, config.server.static_dir.as_deref());

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;

    tracing::info!(mirrors, %primary, "Vidrelay running on http://{address}");
    if let Some(dir) = &config.server.static_dir {
        tracing::info!("Serving static files from {}", dir.display());
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    }
}
