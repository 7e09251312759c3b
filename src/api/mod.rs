//! HTTP API.
//!
//! Endpoints:
//! - `GET  /`           welcome message
//! - `GET  /health`     node status and model state
//! - `GET  /match/test` liveness of the match route
//! - `POST /match`      rank public users against wanted skills

mod error;
pub mod handlers;

pub use error::ApiError;
pub use handlers::{HealthResponse, MatchRequest, MatchedUser};

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::directory::DirectoryProvider;
use crate::error::{Error, Result};
use crate::matching::{EmbeddingService, MatchOptions, MatchOrchestrator};

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen_address: String,
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,
}

impl From<&ServiceConfig> for ApiConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            listen_address: config.api.listen_address.clone(),
            cors_enabled: config.api.cors_enabled,
            cors_origins: config.api.cors_origins.clone(),
        }
    }
}

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub embedding: Arc<EmbeddingService>,
    pub orchestrator: MatchOrchestrator,
    pub directory: Arc<dyn DirectoryProvider>,
    pub match_options: MatchOptions,
    pub score_precision: u32,
    pub request_timeout: Duration,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: &ServiceConfig,
        embedding: Arc<EmbeddingService>,
        directory: Arc<dyn DirectoryProvider>,
    ) -> Self {
        Self {
            orchestrator: MatchOrchestrator::new(embedding.clone()),
            embedding,
            directory,
            match_options: config.matching.options(),
            score_precision: config.matching.score_precision,
            request_timeout: config.api.request_timeout(),
            start_time: Instant::now(),
        }
    }
}

/// Build the router with all routes and layers.
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/match", post(handlers::skill_match))
        .route("/match/", post(handlers::skill_match))
        .route("/match/test", get(handlers::match_test))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.cors_enabled {
        router.layer(cors_layer(&config.cors_origins))
    } else {
        router
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
}

/// HTTP server for the matching API.
pub struct ApiServer {
    config: ApiConfig,
    state: AppState,
}

impl ApiServer {
    pub fn with_state(config: ApiConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone(), &self.config)
    }

    /// Serve until the process exits.
    pub async fn run(&self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Api(format!("Failed to bind {}: {}", addr, e)))?;
        info!("API server listening on {}", addr);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Api(format!("Server error: {}", e)))
    }
}
