//! JWKS client for fetching and caching the issuer's public signing keys.
//!
//! The issuer publishes its keys at `https://{issuer_domain}/.well-known/jwks.json`.
//! [`JwksClient::fetch_signing_keys`] performs exactly one GET per call;
//! [`JwksClient::signing_keys_for`] layers a per-URL cache on top of it.
//!
//! # Caching
//!
//! - Each key set is cached with a TTL, keyed by its JWKS URL (one per issuer)
//! - A `kid` missing from a fresh entry invalidates and refetches the entry,
//!   so key rotation is picked up before the TTL expires
//! - Refetching on a missing `kid` is suppressed while the entry is younger
//!   than the refresh cooldown, which bounds the fetch rate under a flood of
//!   tokens with unknown key ids
//!
//! # Security
//!
//! - HTTPS is used for every derived JWKS URL
//! - Every fetch is bounded by the HTTP client timeout

use crate::config::{
    jwks_url_for, Config, DEFAULT_JWKS_CACHE_TTL_SECONDS, DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
    DEFAULT_JWKS_REFRESH_COOLDOWN_SECONDS,
};
use crate::errors::AuthError;
use crate::observability::metrics;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// JSON Web Key from the JWKS endpoint.
///
/// RSA keys carry `n`/`e`; OKP (Ed25519) keys carry `crv`/`x`; EC keys carry
/// `crv`/`x`/`y`. Fields such as `x5c` and `x5t` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "OKP" or "EC").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Algorithm the key is intended for (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for OKP / EC keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// OKP public key or EC x coordinate (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS document as published by the issuer.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Signing keys indexed by key ID.
///
/// Keys without a `kid`, or whose `use` is something other than `sig`, are
/// not usable for token verification and are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningKeySet {
    keys: HashMap<String, Jwk>,
}

impl SigningKeySet {
    pub fn from_keys(keys: impl IntoIterator<Item = Jwk>) -> Self {
        let keys = keys
            .into_iter()
            .filter(|key| key.key_use.as_deref().map_or(true, |u| u == "sig"))
            .filter_map(|key| {
                let kid = key.kid.clone()?;
                Some((kid, key))
            })
            .collect();

        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<&Jwk> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

impl From<JwksResponse> for SigningKeySet {
    fn from(response: JwksResponse) -> Self {
        Self::from_keys(response.keys)
    }
}

/// Cached key set with the time it was fetched.
#[derive(Clone)]
struct CachedKeySet {
    keys: Arc<SigningKeySet>,
    fetched_at: Instant,
}

/// JWKS client for fetching and caching public keys.
///
/// Thread-safe; share it behind an `Arc`.
pub struct JwksClient {
    /// HTTP client for fetching JWKS (carries the fetch timeout).
    http_client: reqwest::Client,

    /// Cached key sets by JWKS URL.
    cache: Arc<RwLock<HashMap<String, CachedKeySet>>>,

    /// How long a fetched key set stays fresh.
    cache_ttl: Duration,

    /// Minimum entry age before an unknown `kid` may force a refetch.
    refresh_cooldown: Duration,
}

impl Default for JwksClient {
    fn default() -> Self {
        Self::new()
    }
}

impl JwksClient {
    /// Create a JWKS client with default TTL, cooldown and timeout.
    pub fn new() -> Self {
        Self::with_settings(
            Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECONDS),
            Duration::from_secs(DEFAULT_JWKS_REFRESH_COOLDOWN_SECONDS),
            Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS),
        )
    }

    /// Create a JWKS client with the cache and timeout settings from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::with_settings(
            Duration::from_secs(config.jwks_cache_ttl_seconds),
            Duration::from_secs(config.jwks_refresh_cooldown_seconds),
            Duration::from_secs(config.jwks_fetch_timeout_seconds),
        )
    }

    /// Create a JWKS client with explicit settings.
    ///
    /// # Arguments
    ///
    /// * `cache_ttl` - How long to serve a key set before refetching
    /// * `refresh_cooldown` - Minimum entry age before an unknown `kid` refetches
    /// * `fetch_timeout` - Upper bound on a single JWKS request
    pub fn with_settings(
        cache_ttl: Duration,
        refresh_cooldown: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "guard.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            http_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
            refresh_cooldown,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn refresh_cooldown(&self) -> Duration {
        self.refresh_cooldown
    }

    /// Fetch and parse the key set at `jwks_url`, bypassing the cache.
    ///
    /// One outbound request per call.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` on transport errors, timeouts,
    /// non-success statuses and undecodable bodies.
    #[instrument(skip(self))]
    pub async fn fetch_signing_keys(&self, jwks_url: &str) -> Result<SigningKeySet, AuthError> {
        tracing::debug!(target: "guard.auth.jwks", url = %jwks_url, "Fetching JWKS");
        let start = Instant::now();

        let result = self.fetch_inner(jwks_url).await;

        metrics::record_jwks_fetch(
            if result.is_ok() { "success" } else { "error" },
            start.elapsed(),
        );

        result
    }

    /// Fetch the key set an issuer publishes at its well-known location,
    /// `https://{issuer_domain}/.well-known/jwks.json` (see
    /// [`jwks_url_for`]), bypassing the cache.
    ///
    /// # Errors
    ///
    /// Same as [`JwksClient::fetch_signing_keys`].
    pub async fn fetch_signing_keys_for_domain(
        &self,
        issuer_domain: &str,
    ) -> Result<SigningKeySet, AuthError> {
        self.fetch_signing_keys(&jwks_url_for(issuer_domain)).await
    }

    async fn fetch_inner(&self, jwks_url: &str) -> Result<SigningKeySet, AuthError> {
        let response = self
            .http_client
            .get(jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "guard.auth.jwks", error = %e, "Failed to fetch JWKS");
                AuthError::KeySetUnavailable
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "guard.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthError::KeySetUnavailable);
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "guard.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::KeySetUnavailable
        })?;

        let published = jwks.keys.len();
        let keys = SigningKeySet::from(jwks);

        tracing::info!(
            target: "guard.auth.jwks",
            published,
            usable = keys.len(),
            "JWKS fetched"
        );

        Ok(keys)
    }

    /// Get the key set for `jwks_url`, serving from cache while fresh.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` if a fetch is needed and fails.
    #[instrument(skip(self))]
    pub async fn signing_keys(&self, jwks_url: &str) -> Result<Arc<SigningKeySet>, AuthError> {
        if let Some(cached) = self.cached(jwks_url).await {
            if cached.fetched_at.elapsed() < self.cache_ttl {
                metrics::record_jwks_cache("hit");
                return Ok(cached.keys);
            }
        }

        metrics::record_jwks_cache("miss");
        self.refresh(jwks_url).await
    }

    /// Get a key set for `jwks_url` that should contain `kid`.
    ///
    /// Serves from cache when the fresh entry has the key. When it doesn't,
    /// the entry is refetched (key rotation) unless it is younger than the
    /// refresh cooldown. The returned set may still lack `kid`; the caller
    /// reports that as `NoMatchingKey`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` if a fetch is needed and fails.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn signing_keys_for(
        &self,
        jwks_url: &str,
        kid: &str,
    ) -> Result<Arc<SigningKeySet>, AuthError> {
        if let Some(cached) = self.cached(jwks_url).await {
            let age = cached.fetched_at.elapsed();
            if age < self.cache_ttl {
                if cached.keys.contains(kid) {
                    tracing::debug!(target: "guard.auth.jwks", "JWKS cache hit");
                    metrics::record_jwks_cache("hit");
                    return Ok(cached.keys);
                }

                if age < self.refresh_cooldown {
                    tracing::debug!(
                        target: "guard.auth.jwks",
                        "Key not in JWKS cache, refresh suppressed by cooldown"
                    );
                    metrics::record_jwks_cache("cooldown");
                    return Ok(cached.keys);
                }

                tracing::info!(
                    target: "guard.auth.jwks",
                    "Key not in JWKS cache, refetching for possible rotation"
                );
                metrics::record_jwks_cache("refresh");
                self.invalidate(jwks_url).await;
                return self.refresh(jwks_url).await;
            }
        }

        metrics::record_jwks_cache("miss");
        self.refresh(jwks_url).await
    }

    /// Drop the cached entry for `jwks_url`.
    pub async fn invalidate(&self, jwks_url: &str) {
        let mut cache = self.cache.write().await;
        cache.remove(jwks_url);
    }

    /// Drop every cached entry.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    async fn cached(&self, jwks_url: &str) -> Option<CachedKeySet> {
        let cache = self.cache.read().await;
        cache.get(jwks_url).cloned()
    }

    /// Fetch `jwks_url` and store the result.
    async fn refresh(&self, jwks_url: &str) -> Result<Arc<SigningKeySet>, AuthError> {
        let keys = Arc::new(self.fetch_signing_keys(jwks_url).await?);

        let mut cache = self.cache.write().await;
        cache.insert(
            jwks_url.to_string(),
            CachedKeySet {
                keys: Arc::clone(&keys),
                fetched_at: Instant::now(),
            },
        );

        Ok(keys)
    }
}
