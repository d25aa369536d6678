//! Current caller handler.
//!
//! Returns the verified claims of the bearer token.

use crate::auth::ClaimSet;
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/v1/me
///
/// ## Response
///
/// Returns 200 OK with the token's claims:
///
/// ```json
/// {
///   "iss": "https://tenant.example.com/",
///   "sub": "auth0|5d03d3e6726b8f0cb4bf71c9",
///   "aud": "image",
///   "iat": 1560556174,
///   "exp": 1560563374,
///   "permissions": ["get:images"]
/// }
/// ```
#[instrument(skip_all, name = "guard.handlers.me")]
pub async fn get_me(Extension(claims): Extension<ClaimSet>) -> Json<ClaimSet> {
    tracing::debug!(target: "guard.handlers.me", "Returning caller claims");
    Json(claims)
}
