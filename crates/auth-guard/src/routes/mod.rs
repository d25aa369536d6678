//! HTTP routes for Auth Guard.
//!
//! Defines the Axum router and application state.

use crate::auth::Authenticator;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authenticator shared by every protected route.
    pub authenticator: Arc<Authenticator>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            authenticator: Arc::new(Authenticator::from_config(config)),
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (resolves the signing keys) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/headers` - requires the `get:images` permission
/// - `/api/v1/me` - requires a valid token
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // One auth layer per required permission
    let headers_auth = Arc::new(AuthState::requiring(
        state.authenticator.clone(),
        handlers::HEADERS_PERMISSION,
    ));
    let headers_routes = Router::new()
        .route("/headers", get(handlers::get_headers))
        .route_layer(middleware::from_fn_with_state(headers_auth, require_auth));

    let me_auth = Arc::new(AuthState::new(state.authenticator.clone()));
    let me_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(me_auth, require_auth));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(headers_routes)
        .merge(me_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
