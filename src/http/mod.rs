//! HTTP API server.
//!
//! ## Endpoints
//!
//! ### Timers
//! - `GET /timestamps` - List all timers
//! - `GET /timestamps/{name}` - Get one timer (`+` in the name means a space)
//! - `POST /timestamps` - Create or overwrite a timer
//! - `DELETE /timestamps/{id}` - Delete a timer by derived id
//!
//! ### Janitor
//! - `GET /janitor` - Status and recent passes
//! - `POST /janitor/run` - Run an eviction pass now
//!
//! ### System
//! - `GET /health` - Health check (no auth)
//! - `GET /metrics` - Prometheus metrics (no auth)
//!
//! ## Authentication
//!
//! Every other route requires HTTP Basic credentials matching
//! `auth.username` / `auth.password`:
//!
//! ```bash
//! curl -u admin:password http://localhost:8080/timestamps
//! ```

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, MatchedPath, Request},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::constants::{HEADER_REQUEST_ID, MAX_BODY_SIZE_BYTES};
use crate::error::Error;
use crate::janitor::{Janitor, JanitorScheduler, validate_schedule};
use crate::logging::generate_request_id;
use crate::metrics;
use crate::service::TimerService;
use crate::store::RecordStore;

mod auth;
mod handlers;
pub mod types;

pub use auth::{Credentials, parse_basic_auth};
pub use types::*;

use handlers::{
    delete_timer, get_timer, health, janitor_run, janitor_status, list_timers, metrics_endpoint,
    set_timer,
};

#[cfg(test)]
mod tests;

// =============================================================================
// App State
// =============================================================================

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    service: TimerService,
    janitor: Arc<Janitor>,
    credentials: Arc<Credentials>,
    started_at: Instant,
}

impl AppState {
    pub fn new(service: TimerService, janitor: Arc<Janitor>, credentials: Credentials) -> Self {
        Self {
            service,
            janitor,
            credentials: Arc::new(credentials),
            started_at: Instant::now(),
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Builds the full router with auth, body limit and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/timestamps", get(list_timers).post(set_timer))
        // GET takes a name, DELETE takes a derived id
        .route("/timestamps/{key}", get(get_timer).delete(delete_timer))
        .route("/janitor", get(janitor_status))
        .route("/janitor/run", post(janitor_run))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::basic_auth_middleware,
        ))
        .layer(middleware::from_fn(request_middleware))
        .with_state(state)
}

// =============================================================================
// HTTP API Server
// =============================================================================

/// Opens the store, starts the janitor and serves until Ctrl+C or SIGTERM.
pub async fn serve(config: AppConfig) -> Result<()> {
    let _metrics_handle = metrics::init_metrics().context("Failed to initialize metrics")?;
    tracing::info!("Prometheus metrics initialized");

    let store =
        RecordStore::open(&config.database.path).context("Failed to open timer database")?;
    tracing::info!(path = %config.database.path.display(), "Timer database opened");

    let schedule = validate_schedule(&config.janitor.schedule)?;
    let janitor = Arc::new(Janitor::new(store.clone(), config.retention(), &schedule));
    let mut scheduler = JanitorScheduler::new(Arc::clone(&janitor), &schedule)
        .await
        .context("Failed to create janitor scheduler")?;
    scheduler
        .start()
        .await
        .context("Failed to start janitor scheduler")?;

    let state = AppState::new(
        TimerService::new(store),
        janitor,
        Credentials::new(&config.auth.username, &config.auth.password),
    );
    let app = router(state);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!("Starting upload-time HTTP API on {}", addr);

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error");

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Failed to stop janitor scheduler");
    }
    tracing::info!("Graceful shutdown complete");

    served
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server...");
}

// =============================================================================
// Middleware
// =============================================================================

/// Tags each request with an ID, logs it and records HTTP metrics.
async fn request_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = generate_request_id();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span.clone()).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();
    metrics::record_http_request(&method, &route, status, duration);

    span.in_scope(|| {
        tracing::info!(status, duration_ms = duration * 1000.0, "Request completed");
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(HEADER_REQUEST_ID, value);
    }
    response
}

// =============================================================================
// Error Handling
// =============================================================================

/// Application error types for HTTP responses.
///
/// Every variant renders as `{"message": ...}`.
#[derive(Debug)]
pub(crate) enum AppError {
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    /// Maps a library error, using `fallback` for anything that is not a
    /// not-found or conflict.
    pub(crate) fn from_error(err: &Error, fallback: &str) -> Self {
        match err {
            Error::NotFound { .. } => Self::NotFound(err.client_message().to_string()),
            Error::Conflict { .. } => Self::Conflict(err.client_message().to_string()),
            _ => Self::Internal(fallback.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(MessageResponse { message })).into_response()
    }
}
