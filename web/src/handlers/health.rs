//! Health, readiness and metrics endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems.

use crate::{AppError, AppState, WebResult};
use axum::{Json, extract::State, http::StatusCode};
use order_mirror_core::lifecycle::IngestState;
use serde::Serialize;

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK while the process serves requests. Does NOT check the
/// ingestor or its dependencies.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Body of `/ready`.
#[derive(Debug, Serialize)]
pub struct Readiness {
    /// Current ingestor state.
    pub state: IngestState,
}

/// Readiness based on the ingestor lifecycle.
///
/// # Status Codes
///
/// - 200 OK: ingestor is `running`
/// - 503 Service Unavailable: `starting`, `draining` or `stopped`
///
/// # Response
///
/// ```json
/// { "state": "running" }
/// ```
#[allow(clippy::unused_async)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let current = *state.ingest_state.borrow();

    let status = if current.is_running() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(Readiness { state: current }))
}

/// Prometheus text exposition.
///
/// # Errors
///
/// Returns a 503 [`AppError`] if no recorder is installed.
#[allow(clippy::unused_async)]
pub async fn metrics(State(state): State<AppState>) -> WebResult<String> {
    state
        .metrics
        .as_ref()
        .map(metrics_exporter_prometheus::PrometheusHandle::render)
        .ok_or_else(|| AppError::unavailable("Metrics recorder not installed"))
}
