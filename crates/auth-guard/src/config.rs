//! Auth Guard configuration.
//!
//! Configuration is loaded from environment variables. The identity provider
//! account (domain, audience, issuer) is always supplied here and handed to
//! the [`Authenticator`](crate::auth::Authenticator) at construction time.

use common::jwt::{parse_algorithm_list, DEFAULT_LEEWAY, MAX_LEEWAY};
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default signature algorithm allow-list.
pub const DEFAULT_ALGORITHMS: &str = "RS256";

/// Path of the published key set, relative to the issuer domain.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Default JWKS cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default minimum age of a cached key set before an unknown `kid` may
/// trigger a refetch.
pub const DEFAULT_JWKS_REFRESH_COOLDOWN_SECONDS: u64 = 30;

/// Default timeout for a single JWKS fetch.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the JWKS fetch timeout.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Default graceful-shutdown drain period.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Auth Guard configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Token issuer's domain, without scheme (e.g. "tenant.example.com").
    pub issuer_domain: String,

    /// Expected `aud` claim.
    pub audience: String,

    /// Expected `iss` claim (default: "https://{issuer_domain}/").
    pub issuer: String,

    /// URL of the issuer's key set (default: "https://{issuer_domain}/.well-known/jwks.json").
    pub jwks_url: String,

    /// Signature algorithms accepted for verification.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Leeway in seconds applied to `exp` and `nbf` validation (default 0).
    pub jwt_leeway_seconds: u64,

    /// How long a fetched key set is served from cache.
    pub jwks_cache_ttl_seconds: u64,

    /// Minimum age of a cached key set before an unknown `kid` forces a refetch.
    pub jwks_refresh_cooldown_seconds: u64,

    /// Timeout for a single JWKS HTTP request.
    pub jwks_fetch_timeout_seconds: u64,

    /// Connection drain period on shutdown.
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let algorithms: Vec<String> = self
            .allowed_algorithms
            .iter()
            .map(|alg| format!("{alg:?}"))
            .collect();

        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("issuer_domain", &self.issuer_domain)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("jwks_url", &self.jwks_url)
            .field("allowed_algorithms", &algorithms)
            .field("jwt_leeway_seconds", &self.jwt_leeway_seconds)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field(
                "jwks_refresh_cooldown_seconds",
                &self.jwks_refresh_cooldown_seconds,
            )
            .field("jwks_fetch_timeout_seconds", &self.jwks_fetch_timeout_seconds)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid issuer domain: {0}")]
    InvalidIssuerDomain(String),

    #[error("Invalid algorithm configuration: {0}")]
    InvalidAlgorithms(String),

    #[error("Invalid JWT leeway configuration: {0}")]
    InvalidJwtLeeway(String),

    #[error("Invalid JWKS cache configuration: {0}")]
    InvalidJwksCache(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidJwksTimeout(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainPeriod(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let issuer_domain = normalize_domain(
            vars.get("AUTH_ISSUER_DOMAIN")
                .ok_or_else(|| ConfigError::MissingEnvVar("AUTH_ISSUER_DOMAIN".to_string()))?,
        )?;

        let audience = vars
            .get("AUTH_AUDIENCE")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("AUTH_AUDIENCE".to_string()))?
            .clone();

        let issuer = vars
            .get("AUTH_ISSUER")
            .cloned()
            .unwrap_or_else(|| format!("https://{issuer_domain}/"));

        let jwks_url = vars
            .get("AUTH_JWKS_URL")
            .cloned()
            .unwrap_or_else(|| jwks_url_for(&issuer_domain));

        let algorithms_str = vars
            .get("AUTH_ALGORITHMS")
            .map(String::as_str)
            .unwrap_or(DEFAULT_ALGORITHMS);
        let allowed_algorithms = parse_algorithm_list(algorithms_str).map_err(|e| {
            ConfigError::InvalidAlgorithms(format!(
                "AUTH_ALGORITHMS '{}' is not usable: {}",
                algorithms_str, e
            ))
        })?;

        let jwt_leeway_seconds =
            parse_u64(vars, "JWT_LEEWAY_SECONDS", DEFAULT_LEEWAY.as_secs())
                .map_err(ConfigError::InvalidJwtLeeway)?;
        if jwt_leeway_seconds > MAX_LEEWAY.as_secs() {
            return Err(ConfigError::InvalidJwtLeeway(format!(
                "JWT_LEEWAY_SECONDS must not exceed {} seconds, got {}",
                MAX_LEEWAY.as_secs(),
                jwt_leeway_seconds
            )));
        }

        let jwks_cache_ttl_seconds = parse_u64(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
        )
        .map_err(ConfigError::InvalidJwksCache)?;
        if jwks_cache_ttl_seconds == 0 {
            return Err(ConfigError::InvalidJwksCache(
                "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
            ));
        }

        let jwks_refresh_cooldown_seconds = parse_u64(
            vars,
            "JWKS_REFRESH_COOLDOWN_SECONDS",
            DEFAULT_JWKS_REFRESH_COOLDOWN_SECONDS,
        )
        .map_err(ConfigError::InvalidJwksCache)?;
        if jwks_refresh_cooldown_seconds > jwks_cache_ttl_seconds {
            return Err(ConfigError::InvalidJwksCache(format!(
                "JWKS_REFRESH_COOLDOWN_SECONDS ({}) must not exceed JWKS_CACHE_TTL_SECONDS ({})",
                jwks_refresh_cooldown_seconds, jwks_cache_ttl_seconds
            )));
        }

        let jwks_fetch_timeout_seconds = parse_u64(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
        )
        .map_err(ConfigError::InvalidJwksTimeout)?;
        if jwks_fetch_timeout_seconds == 0
            || jwks_fetch_timeout_seconds > MAX_JWKS_FETCH_TIMEOUT_SECONDS
        {
            return Err(ConfigError::InvalidJwksTimeout(format!(
                "JWKS_FETCH_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                MAX_JWKS_FETCH_TIMEOUT_SECONDS, jwks_fetch_timeout_seconds
            )));
        }

        let drain_seconds = parse_u64(vars, "GUARD_DRAIN_SECONDS", DEFAULT_DRAIN_SECONDS)
            .map_err(ConfigError::InvalidDrainPeriod)?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        Ok(Config {
            bind_address,
            issuer_domain,
            audience,
            issuer,
            jwks_url,
            allowed_algorithms,
            jwt_leeway_seconds,
            jwks_cache_ttl_seconds,
            jwks_refresh_cooldown_seconds,
            jwks_fetch_timeout_seconds,
            drain_seconds,
        })
    }
}

/// Build the well-known key set URL for an issuer domain.
///
/// A bare domain is served over https. A domain that already carries an
/// `http://` or `https://` scheme (a local issuer) keeps it.
pub fn jwks_url_for(issuer_domain: &str) -> String {
    let domain = issuer_domain.trim_end_matches('/');
    if domain.starts_with("http://") || domain.starts_with("https://") {
        format!("{}{}", domain, JWKS_PATH)
    } else {
        format!("https://{}{}", domain, JWKS_PATH)
    }
}

/// Accept "tenant.example.com", "https://tenant.example.com/" and similar,
/// keeping only the host part.
fn normalize_domain(raw: &str) -> Result<String, ConfigError> {
    let domain = raw
        .trim()
        .trim_start_matches("https://")
        .trim_end_matches('/');

    if domain.is_empty() || domain.contains('/') || domain.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidIssuerDomain(format!(
            "AUTH_ISSUER_DOMAIN must be a bare host name, got '{}'",
            raw
        )));
    }

    Ok(domain.to_string())
}

fn parse_u64(vars: &HashMap<String, String>, key: &str, default: u64) -> Result<u64, String> {
    match vars.get(key) {
        Some(value_str) => value_str.trim().parse().map_err(|e| {
            format!(
                "{} must be a valid non-negative integer, got '{}': {}",
                key, value_str, e
            )
        }),
        None => Ok(default),
    }
}
