//! Handler behind the `get:images` permission.

use crate::auth::ClaimSet;
use axum::Extension;
use tracing::instrument;

/// Permission required by `GET /headers`.
pub const HEADERS_PERMISSION: &str = "get:images";

/// Handler for GET /headers
///
/// Only reached once the auth middleware has granted [`HEADERS_PERMISSION`].
#[instrument(skip_all, name = "guard.handlers.headers")]
pub async fn get_headers(Extension(_claims): Extension<ClaimSet>) -> &'static str {
    "Access Granted"
}
