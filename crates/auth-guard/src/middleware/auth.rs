//! Authorization middleware for protected routes.
//!
//! Runs the full pipeline (bearer token, signing keys, verification,
//! permission) and injects the verified [`ClaimSet`](crate::auth::ClaimSet)
//! into request extensions.
//! The wrapped handler never runs when any step fails.

use crate::auth::Authenticator;
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authorization middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Shared authenticator (and its key-set cache).
    pub authenticator: Arc<Authenticator>,

    /// Permission the route requires; empty means any valid token with a
    /// `permissions` claim.
    pub required_permission: String,
}

impl AuthState {
    /// Require only a valid token.
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self {
            authenticator,
            required_permission: String::new(),
        }
    }

    /// Require a valid token granting `permission`.
    pub fn requiring(authenticator: Arc<Authenticator>, permission: impl Into<String>) -> Self {
        Self {
            authenticator,
            required_permission: permission.into(),
        }
    }
}

/// Middleware that authorizes the request before running the handler.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 with `WWW-Authenticate` for missing/invalid headers, expired tokens
///   and wrong audience/issuer
/// - 400 for malformed tokens, unknown keys and a missing `permissions` claim
/// - 403 when the permission is not granted
/// - 503 when the signing keys cannot be fetched
/// - Otherwise continues with the claims in extensions
#[instrument(skip(state, req, next), name = "guard.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let claims = state
        .authenticator
        .authorize(req.headers(), &state.required_permission)
        .await
        .map_err(|e| {
            tracing::debug!(target: "guard.middleware.auth", code = e.code(), "Request rejected");
            e
        })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    // Flows that reach the JWKS endpoint are covered by the integration tests
    // in tests/auth_tests.rs against a mocked key set.

    use super::*;
    use crate::auth::{JwksClient, VerificationSettings};
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    static HANDLER_CALLS: AtomicUsize = AtomicUsize::new(0);

    async fn counted_handler() -> &'static str {
        HANDLER_CALLS.fetch_add(1, Ordering::SeqCst);
        "reached"
    }

    fn test_app() -> Router {
        let authenticator = Arc::new(Authenticator::new(
            Arc::new(JwksClient::with_settings(
                Duration::from_secs(60),
                Duration::ZERO,
                Duration::from_secs(1),
            )),
            "http://127.0.0.1:9/.well-known/jwks.json",
            VerificationSettings::new("image", "https://tenant.example.com/"),
        ));
        let state = Arc::new(AuthState::requiring(authenticator, "get:images"));

        Router::new()
            .route("/protected", get(counted_handler))
            .route_layer(middleware::from_fn_with_state(state, require_auth))
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_auth_state_new_requires_no_permission() {
        let authenticator = Arc::new(Authenticator::new(
            Arc::new(JwksClient::new()),
            "https://tenant.example.com/.well-known/jwks.json",
            VerificationSettings::new("image", "https://tenant.example.com/"),
        ));
        assert!(AuthState::new(authenticator).required_permission.is_empty());
    }

    #[tokio::test]
    async fn test_rejections_never_reach_handler() {
        let before = HANDLER_CALLS.load(Ordering::SeqCst);

        let cases = [
            (None, StatusCode::UNAUTHORIZED),
            (Some("Basic dXNlcjpwYXNz"), StatusCode::UNAUTHORIZED),
            (Some("Bearer"), StatusCode::UNAUTHORIZED),
            (Some("Bearer a b"), StatusCode::UNAUTHORIZED),
            (Some("Bearer not-a-jwt"), StatusCode::BAD_REQUEST),
        ];

        for (value, expected) in cases {
            let mut builder = HttpRequest::builder().uri("/protected");
            if let Some(value) = value {
                builder = builder.header(header::AUTHORIZATION, value);
            }
            let response = test_app()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), expected, "header {value:?}");
        }

        assert_eq!(HANDLER_CALLS.load(Ordering::SeqCst), before);
    }
}
