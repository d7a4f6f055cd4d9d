//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status: "healthy" or "degraded"
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
    /// Whether a platform authenticator is currently usable
    pub platform_authenticator_available: bool,
    pub pending_sessions: usize,
    pub dispatched_sessions: usize,
    pub parked_results: usize,
}

/// GET /health - Health check endpoint
///
/// Reports "degraded" while the broker is not running.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.service.registry().stats();

    Json(HealthResponse {
        status: if state.service.is_started() {
            "healthy"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        service: "fido-broker-server",
        platform_authenticator_available: state.service.is_platform_authenticator_available(),
        pending_sessions: stats.pending,
        dispatched_sessions: stats.dispatched,
        parked_results: state.mailbox.len(),
    })
}

/// Readiness response for Kubernetes
#[derive(Serialize)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /ready - Kubernetes readiness probe
///
/// Returns 200 once the broker is started, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    if state.service.is_started() {
        (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some("broker not started"),
            }),
        )
    }
}
