//! System endpoints: health, readiness, and liveness checks.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
}

impl HealthResponse {
    fn new(status: &str, database: Option<&str>) -> Self {
        Self {
            status: status.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.map(str::to_string),
        }
    }
}

/// `GET /health`: service health including the storage backend.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service status, version, timestamp, and whether the storage backend answers.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Storage backend unavailable", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse::new("healthy", Some("up"))),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::new("unhealthy", Some("down"))),
            )
        }
    }
}

/// `GET /ready`: whether the service can take traffic.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "System",
    summary = "Readiness check",
    responses(
        (status = 200, description = "Ready", body = HealthResponse),
        (status = 503, description = "Not ready", body = HealthResponse),
    )
)]
pub async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::new("ready", None))),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse::new("not_ready", None)),
        ),
    }
}

/// `GET /live`: process liveness. Never touches the backend.
#[utoipa::path(
    get,
    path = "/live",
    tag = "System",
    summary = "Liveness check",
    responses(
        (status = 200, description = "Alive", body = HealthResponse),
    )
)]
pub async fn live_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::new("alive", None)))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/live", get(live_handler))
}
