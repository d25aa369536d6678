//! Authentication pipeline: header → signing keys → verified claims → permission.

use crate::auth::claims::ClaimSet;
use crate::auth::header::extract_token;
use crate::auth::jwks::{JwksClient, SigningKeySet};
use crate::auth::jwt::{header_error, verify_and_decode, VerificationSettings};
use crate::auth::permissions::check_permission;
use crate::config::Config;
use crate::errors::AuthError;
use crate::observability::metrics;
use axum::http::HeaderMap;
use common::jwt::extract_kid;
use std::future::Future;
use std::sync::Arc;
use tracing::instrument;

/// Verifies bearer tokens for one issuer.
///
/// Built once at startup from an explicit configuration and shared behind an
/// `Arc`; the only mutable state is the key-set cache inside the
/// [`JwksClient`].
pub struct Authenticator {
    jwks_client: Arc<JwksClient>,
    jwks_url: String,
    settings: VerificationSettings,
}

impl Authenticator {
    /// Create an authenticator.
    ///
    /// # Arguments
    ///
    /// * `jwks_client` - Client (and cache) for the issuer's signing keys
    /// * `jwks_url` - Where the issuer publishes its key set
    /// * `settings` - Expected audience, issuer, algorithms and leeway
    pub fn new(
        jwks_client: Arc<JwksClient>,
        jwks_url: impl Into<String>,
        settings: VerificationSettings,
    ) -> Self {
        Self {
            jwks_client,
            jwks_url: jwks_url.into(),
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(JwksClient::from_config(config)),
            config.jwks_url.clone(),
            VerificationSettings::from_config(config),
        )
    }

    pub fn jwks_client(&self) -> &Arc<JwksClient> {
        &self.jwks_client
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    pub fn settings(&self) -> &VerificationSettings {
        &self.settings
    }

    /// Current signing keys for the configured issuer (cached).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` if the key set cannot be fetched.
    pub async fn signing_keys(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        self.jwks_client.signing_keys(&self.jwks_url).await
    }

    /// Verify a raw token and return its claims.
    ///
    /// Resolves the key set through the cache, refetching once when the token
    /// names a key the cached set doesn't have.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: &str) -> Result<ClaimSet, AuthError> {
        let kid = extract_kid(token).map_err(header_error)?;

        let signing_keys = self
            .jwks_client
            .signing_keys_for(&self.jwks_url, &kid)
            .await?;

        verify_and_decode(token, &signing_keys, &self.settings)
    }

    /// Authenticate the request headers and check `required_permission`.
    ///
    /// An empty `required_permission` accepts any valid token that carries a
    /// `permissions` claim.
    #[instrument(skip(self, headers))]
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        required_permission: &str,
    ) -> Result<ClaimSet, AuthError> {
        let result = self.authorize_inner(headers, required_permission).await;

        match &result {
            Ok(_) => metrics::record_auth_outcome("granted"),
            Err(e) => metrics::record_auth_outcome(e.code()),
        }

        result
    }

    async fn authorize_inner(
        &self,
        headers: &HeaderMap,
        required_permission: &str,
    ) -> Result<ClaimSet, AuthError> {
        let token = extract_token(headers)?;
        let claims = self.authenticate(token).await?;
        check_permission(required_permission, &claims)?;
        Ok(claims)
    }

    /// Run `operation` with the verified claims if the request is authorized.
    ///
    /// On any failure the operation is not invoked and the error is returned.
    pub async fn guard<F, Fut, T>(
        &self,
        headers: &HeaderMap,
        required_permission: &str,
        operation: F,
    ) -> Result<T, AuthError>
    where
        F: FnOnce(ClaimSet) -> Fut,
        Fut: Future<Output = T>,
    {
        let claims = self.authorize(headers, required_permission).await?;
        Ok(operation(claims).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use guard_test_utils::{TestClaimsBuilder, TestKeypair, TEST_AUDIENCE, TEST_ISSUER};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    // Never contacted: every test here fails before key resolution
    fn offline_authenticator() -> Authenticator {
        Authenticator::new(
            Arc::new(JwksClient::with_settings(
                Duration::from_secs(60),
                Duration::ZERO,
                Duration::from_secs(1),
            )),
            "http://127.0.0.1:9/.well-known/jwks.json",
            VerificationSettings::new(TEST_AUDIENCE, TEST_ISSUER),
        )
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_guard_skips_operation_without_header() {
        let auth = offline_authenticator();
        let ran = AtomicBool::new(false);

        let result = auth
            .guard(&HeaderMap::new(), "get:images", |_claims| async {
                ran.store(true, Ordering::SeqCst);
            })
            .await;

        assert_eq!(result, Err(AuthError::AuthorizationHeaderMissing));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_malformed_before_fetching() {
        let auth = offline_authenticator();
        assert_eq!(
            auth.authenticate("not-a-jwt").await,
            Err(AuthError::MalformedToken)
        );
    }

    #[tokio::test]
    async fn test_authenticate_requires_kid() {
        let auth = offline_authenticator();
        let token = TestKeypair::rsa_primary().sign_without_kid(&TestClaimsBuilder::new().build());

        assert_eq!(
            auth.authorize(&bearer(&token), "").await,
            Err(AuthError::InvalidHeader("Authorization malformed."))
        );
    }

    #[tokio::test]
    async fn test_unreachable_key_set_is_unavailable() {
        let auth = offline_authenticator();
        let token = TestKeypair::rsa_primary().sign(&TestClaimsBuilder::new().build());

        assert_eq!(
            auth.authenticate(&token).await,
            Err(AuthError::KeySetUnavailable)
        );
    }

    #[test]
    fn test_from_config_uses_config_values() {
        let vars = std::collections::HashMap::from([
            ("AUTH_ISSUER_DOMAIN".to_string(), "tenant.example.com".to_string()),
            ("AUTH_AUDIENCE".to_string(), "image".to_string()),
        ]);
        let config = Config::from_vars(&vars).unwrap();

        let auth = Authenticator::from_config(&config);

        assert_eq!(
            auth.jwks_url(),
            "https://tenant.example.com/.well-known/jwks.json"
        );
        assert_eq!(auth.settings().audience, "image");
        assert_eq!(auth.settings().issuer, "https://tenant.example.com/");
    }
}
