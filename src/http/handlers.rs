//! Route handlers.
//!
//! Timer routes, janitor routes and the unauthenticated system endpoints.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::types::{HealthResponse, MessageResponse, SetTimerRequest};
use super::{AppError, AppState};
use crate::constants::{CONTENT_TYPE_HTML, CONTENT_TYPE_JSON};
use crate::janitor::{JanitorRun, JanitorStatus};
use crate::metrics;
use crate::error::Error;
use crate::service::now_seconds;
use crate::store::{TimerRecord, UpsertOutcome};

/// Path segments encode spaces as `+`.
fn decode_name(raw: &str) -> String {
    raw.replace('+', " ")
}

/// True when the request declares a JSON body type.
fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(CONTENT_TYPE_JSON))
}

/// Reads the first JSON value of a `POST /timestamps` body.
///
/// `null` yields the default request and anything after the first value is
/// ignored. An empty body is an error.
fn decode_set_request(body: &[u8]) -> serde_json::Result<SetTimerRequest> {
    serde_json::Deserializer::from_slice(body)
        .into_iter::<Option<SetTimerRequest>>()
        .next()
        .unwrap_or_else(|| Err(serde::de::Error::custom("empty request body")))
        .map(Option::unwrap_or_default)
}

// =============================================================================
// Timers
// =============================================================================

/// GET /timestamps - Every stored timer.
pub(crate) async fn list_timers(
    State(state): State<AppState>,
) -> Result<Json<Vec<TimerRecord>>, AppError> {
    let timers = state.service.list_timers().await.map_err(|e| {
        tracing::error!(error = %e, "Error in getting all timestamps");
        AppError::from_error(&e, "Error in getting all timestamps")
    })?;
    tracing::info!(count = timers.len(), "Requested all timestamps");
    Ok(Json(timers))
}

/// GET /timestamps/{name} - One timer.
///
/// A JSON `Content-Type` on the request selects the full record; otherwise
/// the response is the bare seconds value.
pub(crate) async fn get_timer(
    State(state): State<AppState>,
    Path(raw_name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let name = decode_name(&raw_name);

    let record = state
        .service
        .get_timer(&name)
        .await
        .map_err(|e| {
            tracing::error!(name = %name, error = %e, "Error in getting timestamp");
            AppError::from_error(&e, "Error in getting timestamp")
        })?
        .ok_or_else(|| {
            tracing::info!(name = %name, "Timestamp not found");
            AppError::NotFound("Timestamp not found".to_string())
        })?;

    tracing::info!(name = %name, "Requested timestamp");

    if wants_json(&headers) {
        return Ok(Json(record).into_response());
    }

    let body = serde_json::to_string(&record.seconds).map_err(|e| {
        tracing::error!(name = %name, error = %e, "Error in encoding timestamp");
        AppError::Internal("Error in encoding timestamp".to_string())
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE_HTML)],
        format!("{body}\n"),
    )
        .into_response())
}

/// POST /timestamps - Create or overwrite a timer.
pub(crate) async fn set_timer(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    let request = decode_set_request(&body).map_err(|e| {
        tracing::error!(error = %e, "Error in decoding timestamp");
        AppError::Internal("Error in decoding timestamp".to_string())
    })?;

    state
        .service
        .set_timer(&request.name, request.seconds)
        .await
        .map_err(|e| {
            let fallback = match &e {
                Error::Write {
                    outcome: UpsertOutcome::Updated,
                    ..
                } => "Error in updating timestamp",
                Error::Write {
                    outcome: UpsertOutcome::Inserted,
                    ..
                } => "Error in inserting timestamp",
                _ => "Error in saving timestamp",
            };
            tracing::error!(name = %request.name, error = %e, "{fallback}");
            AppError::from_error(&e, fallback)
        })?;

    Ok(Json(MessageResponse::new("Timestamp saved successfully")))
}

/// DELETE /timestamps/{id} - Remove a timer by id.
pub(crate) async fn delete_timer(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: i64 = raw_id.parse().map_err(|e| {
        tracing::error!(id = %raw_id, error = %e, "Error in decoding timestamp");
        AppError::Internal("Error in decoding timestamp".to_string())
    })?;

    state
        .service
        .delete_timer(id)
        .await
        .map_err(|e| AppError::from_error(&e, "Error in deleting timestamp"))?;

    Ok(Json(MessageResponse::new("Timestamp deleted successfully")))
}

// =============================================================================
// Janitor
// =============================================================================

/// GET /janitor - Janitor status and recent passes.
pub(crate) async fn janitor_status(State(state): State<AppState>) -> Json<JanitorStatus> {
    Json(state.janitor.status().await)
}

/// POST /janitor/run - Run an eviction pass now.
pub(crate) async fn janitor_run(
    State(state): State<AppState>,
) -> Result<Json<JanitorRun>, AppError> {
    state
        .janitor
        .run_pass(now_seconds(), true)
        .await
        .map(Json)
        .ok_or_else(|| AppError::Conflict("Janitor pass already running".to_string()))
}

// =============================================================================
// System
// =============================================================================

/// GET /health - Liveness plus a store round-trip.
pub(crate) async fn health(State(state): State<AppState>) -> Response {
    let uptime_secs = state.started_at.elapsed().as_secs();
    let version = env!("CARGO_PKG_VERSION").to_string();

    match state.service.store().count_async().await {
        Ok(count) => Json(HealthResponse {
            status: "healthy".to_string(),
            version,
            uptime_secs,
            timers: Some(count),
            error: None,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    version,
                    uptime_secs,
                    timers: None,
                    error: Some(e.client_message().to_string()),
                }),
            )
                .into_response()
        },
    }
}

/// GET /metrics - Prometheus text exposition.
pub(crate) async fn metrics_endpoint() -> impl IntoResponse {
    let body = metrics::render_metrics();
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}
