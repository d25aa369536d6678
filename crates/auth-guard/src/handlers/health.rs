//! Health check handlers.
//!
//! - `/health` is a liveness probe and never touches the network.
//! - `/ready` checks that the issuer's signing keys can be resolved.

use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Readiness probe body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Number of usable signing keys (omitted when not ready).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_keys: Option<usize>,
}

/// Handler for GET /health
#[instrument(name = "guard.health.check")]
pub async fn health_check() -> &'static str {
    "OK"
}

/// Handler for GET /ready
///
/// Resolves the signing keys through the shared cache, so a ready instance
/// has its key set warm for the first request.
///
/// ## Responses
///
/// - 200 `{"status":"ready","signing_keys":2}`
/// - 503 `{"status":"not_ready"}`
#[instrument(skip_all, name = "guard.health.ready")]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    match state.authenticator.signing_keys().await {
        Ok(keys) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                signing_keys: Some(keys.len()),
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "guard.health", error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    signing_keys: None,
                }),
            )
        }
    }
}
