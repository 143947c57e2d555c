//! HTTP API surface.
//!
//! A thin axum layer over the engine: route handlers parse requests, hand
//! the work to the synchronous service on the blocking pool, and render
//! results or the standard error envelope.

mod handlers;
/// Request and response DTOs plus hash-count limits.
pub mod types;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::service::Service;
use crate::storage::Database;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;
/// Environment variable overriding the listen port.
pub const ENV_PORT: &str = "ACOUSTIC_PORT";
/// Environment variable carrying a comma-separated origin allow-list.
pub const ENV_ALLOWED_ORIGINS: &str = "ACOUSTIC_ALLOWED_ORIGINS";

/// Largest accepted request body. Uploads dominate; 100 MB covers them.
const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Server-specific settings layered over the engine configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Allowed CORS origins; `["*"]` or an empty list allows everyone.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `ACOUSTIC_PORT` and `ACOUSTIC_ALLOWED_ORIGINS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = std::env::var(ENV_PORT) {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(origins) = std::env::var(ENV_ALLOWED_ORIGINS) {
            let origins: Vec<String> = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
            if !origins.is_empty() {
                config.allowed_origins = origins;
            }
        }
        config
    }
}

/// Shared state behind every handler.
pub struct AppState {
    pub service: Service<Database>,
    pub config: Config,
    pub server_config: ServerConfig,
}

/// Build the API router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/health/metrics", get(handlers::metrics))
        .route(
            "/api/songs",
            get(handlers::list_songs).post(handlers::add_song),
        )
        .route("/api/songs/youtube", post(handlers::add_song_youtube))
        .route(
            "/api/songs/{id}",
            get(handlers::get_song).delete(handlers::delete_song),
        )
        .route("/api/match", post(handlers::match_file))
        .route("/api/match/hashes", post(handlers::match_hashes))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<AppState>) -> Result<(), std::io::Error> {
    let addr = format!("0.0.0.0:{}", state.server_config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");
    tracing::info!("Database: {}", state.config.db_path.display());
    tracing::info!("Sample rate: {} Hz", state.config.sample_rate);
    tracing::info!("CORS origins: {:?}", state.server_config.allowed_origins);
    axum::serve(listener, router(state)).await
}

/// CORS layer: allow-list or wildcard, with preflight short-circuiting.
async fn cors(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let allow = allow_origin_value(&state.server_config.allowed_origins, origin.as_deref());

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(response.headers_mut(), allow.as_deref());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut(), allow.as_deref());
    response
}

/// Resolve the `Access-Control-Allow-Origin` value for a request origin.
fn allow_origin_value(allowed: &[String], origin: Option<&str>) -> Option<String> {
    if allowed.is_empty() || (allowed.len() == 1 && allowed[0] == "*") {
        return Some("*".to_string());
    }
    origin
        .filter(|origin| allowed.iter().any(|candidate| candidate == origin))
        .map(str::to_owned)
}

fn apply_cors_headers(headers: &mut axum::http::HeaderMap, allow: Option<&str>) {
    let Some(origin) = allow else {
        return;
    };
    let Ok(origin) = HeaderValue::from_str(origin) else {
        return;
    };
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-Requested-With"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("3600"),
    );
}
