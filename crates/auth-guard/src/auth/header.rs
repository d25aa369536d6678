//! Bearer token extraction from the `Authorization` header.

use crate::errors::AuthError;
use axum::http::{header::AUTHORIZATION, HeaderMap};

/// Extract the bearer token from request headers.
///
/// The header value is split on whitespace and must consist of exactly the
/// scheme `Bearer` (case-insensitive) followed by the token.
///
/// # Errors
///
/// - `AuthorizationHeaderMissing` if there is no `Authorization` header, or
///   its value is empty
/// - `InvalidHeader` if the scheme is not `Bearer`, the token is missing, or
///   there are more than two segments
pub fn extract_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or_else(|| {
        tracing::debug!(target: "guard.auth.header", "Missing Authorization header");
        AuthError::AuthorizationHeaderMissing
    })?;

    let value = value.to_str().map_err(|_| {
        tracing::debug!(target: "guard.auth.header", "Authorization header is not visible ASCII");
        AuthError::InvalidHeader("Authorization header must be bearer token.")
    })?;

    let mut parts = value.split_whitespace();

    let scheme = parts
        .next()
        .ok_or(AuthError::AuthorizationHeaderMissing)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        tracing::debug!(target: "guard.auth.header", "Authorization scheme is not Bearer");
        return Err(AuthError::InvalidHeader(
            "Authorization header must start with \"Bearer\".",
        ));
    }

    let token = parts
        .next()
        .ok_or(AuthError::InvalidHeader("Token not found."))?;

    if parts.next().is_some() {
        tracing::debug!(target: "guard.auth.header", "Authorization header has extra segments");
        return Err(AuthError::InvalidHeader(
            "Authorization header must be bearer token.",
        ));
    }

    Ok(token)
}
