//! Auth Guard error types.
//!
//! Every failure of the authentication pipeline is an [`AuthError`]. Each
//! variant carries a stable machine-readable code, a human-readable
//! description and an HTTP status; the mapping to a response happens only in
//! the `IntoResponse` impl.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Authentication / authorization failure.
///
/// Maps to HTTP status codes:
/// - AuthorizationHeaderMissing, InvalidHeader, TokenExpired, InvalidClaims: 401 Unauthorized
/// - MalformedToken, NoMatchingKey, MissingPermissionsClaim: 400 Bad Request
/// - PermissionDenied: 403 Forbidden
/// - KeySetUnavailable: 503 Service Unavailable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header is expected.")]
    AuthorizationHeaderMissing,

    #[error("{0}")]
    InvalidHeader(&'static str),

    #[error("Token expired.")]
    TokenExpired,

    #[error("Incorrect claims. Please, check the audience and issuer.")]
    InvalidClaims,

    #[error("Unable to parse authentication token.")]
    MalformedToken,

    #[error("Unable to find the appropriate key.")]
    NoMatchingKey,

    #[error("Permissions not included in JWT.")]
    MissingPermissionsClaim,

    #[error("Permission not found.")]
    PermissionDenied,

    #[error("Signing keys are temporarily unavailable.")]
    KeySetUnavailable,
}

impl AuthError {
    /// Machine-readable error code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::AuthorizationHeaderMissing => "authorization_header_missing",
            AuthError::InvalidHeader(_) => "invalid_header",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidClaims => "invalid_claims",
            AuthError::MalformedToken => "malformed_token",
            AuthError::NoMatchingKey => "no_matching_key",
            AuthError::MissingPermissionsClaim => "missing_permissions_claim",
            AuthError::PermissionDenied => "permission_denied",
            AuthError::KeySetUnavailable => "jwks_unavailable",
        }
    }

    /// Human-readable description returned to clients.
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        self.status().as_u16()
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::AuthorizationHeaderMissing
            | AuthError::InvalidHeader(_)
            | AuthError::TokenExpired
            | AuthError::InvalidClaims => StatusCode::UNAUTHORIZED,
            AuthError::MalformedToken
            | AuthError::NoMatchingKey
            | AuthError::MissingPermissionsClaim => StatusCode::BAD_REQUEST,
            AuthError::PermissionDenied => StatusCode::FORBIDDEN,
            AuthError::KeySetUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// `WWW-Authenticate` challenge per RFC 6750, for 401 and 403 responses.
    fn challenge(&self) -> Option<&'static str> {
        match self.status() {
            StatusCode::UNAUTHORIZED => {
                Some("Bearer realm=\"auth-guard\", error=\"invalid_token\"")
            }
            StatusCode::FORBIDDEN => {
                Some("Bearer realm=\"auth-guard\", error=\"insufficient_scope\"")
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    description: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let AuthError::KeySetUnavailable = self {
            // Fetch failure details were logged where they happened
            tracing::warn!(target: "guard.availability", "Rejecting request: signing keys unavailable");
        }

        let body = ErrorResponse {
            code: self.code(),
            description: self.description(),
        };

        let mut response = (status, Json(body)).into_response();

        if let Some(challenge) = self.challenge() {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }

        response
    }
}
