//! Permission checks on verified claims.

use crate::auth::claims::ClaimSet;
use crate::errors::AuthError;

/// Check that `claims` grant `required_permission`.
///
/// An empty `required_permission` only requires the `permissions` claim to be
/// present.
///
/// # Errors
///
/// - `MissingPermissionsClaim` - the token has no `permissions` claim
/// - `PermissionDenied` - the permission is not in the list (exact match)
pub fn check_permission(required_permission: &str, claims: &ClaimSet) -> Result<(), AuthError> {
    let Some(permissions) = claims.permissions() else {
        tracing::debug!(target: "guard.auth.permissions", "Token has no permissions claim");
        return Err(AuthError::MissingPermissionsClaim);
    };

    if required_permission.is_empty() {
        return Ok(());
    }

    if permissions.iter().any(|p| p == required_permission) {
        Ok(())
    } else {
        tracing::debug!(
            target: "guard.auth.permissions",
            required = %required_permission,
            "Permission not granted"
        );
        Err(AuthError::PermissionDenied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::claims::tests::claims_from_json;
    use serde_json::json;

    fn with_permissions(permissions: serde_json::Value) -> ClaimSet {
        claims_from_json(json!({
            "iss": "https://tenant.example.com/",
            "aud": "image",
            "exp": 4_102_444_800_i64,
            "permissions": permissions
        }))
    }

    fn without_permissions() -> ClaimSet {
        claims_from_json(json!({
            "iss": "https://tenant.example.com/",
            "aud": "image",
            "exp": 4_102_444_800_i64
        }))
    }

    #[test]
    fn test_granted_permission() {
        let claims = with_permissions(json!(["get:images", "post:images"]));
        assert_eq!(check_permission("get:images", &claims), Ok(()));
    }

    #[test]
    fn test_absent_permission_is_denied() {
        let claims = with_permissions(json!(["get:images"]));
        assert_eq!(
            check_permission("delete:images", &claims),
            Err(AuthError::PermissionDenied)
        );
    }

    #[test]
    fn test_match_is_exact() {
        let claims = with_permissions(json!(["get:images"]));
        assert_eq!(
            check_permission("get:image", &claims),
            Err(AuthError::PermissionDenied)
        );
        assert_eq!(
            check_permission("GET:IMAGES", &claims),
            Err(AuthError::PermissionDenied)
        );
    }

    #[test]
    fn test_missing_claim_regardless_of_requirement() {
        let claims = without_permissions();
        assert_eq!(
            check_permission("get:images", &claims),
            Err(AuthError::MissingPermissionsClaim)
        );
        assert_eq!(
            check_permission("", &claims),
            Err(AuthError::MissingPermissionsClaim)
        );
    }

    #[test]
    fn test_empty_requirement_with_empty_list() {
        let claims = with_permissions(json!([]));
        assert_eq!(check_permission("", &claims), Ok(()));
        assert_eq!(
            check_permission("get:images", &claims),
            Err(AuthError::PermissionDenied)
        );
    }
}
