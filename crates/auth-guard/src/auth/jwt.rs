//! Token verification against a trusted signing key set.
//!
//! Verification order:
//! 1. Decode the unverified header (size limit first, see `common::jwt`)
//! 2. Select the signing key by `kid`
//! 3. Pin the algorithm: the header `alg` must be allow-listed and agree with
//!    the key's declared `alg`
//! 4. Verify signature, `exp` and `nbf` (with leeway), `aud` and `iss`
//!
//! The algorithm is never taken from the token alone. `jsonwebtoken` is given
//! exactly one algorithm, chosen after the allow-list check.

use crate::auth::claims::{ClaimSet, RawClaims};
use crate::auth::jwks::{Jwk, SigningKeySet};
use crate::config::Config;
use crate::errors::AuthError;
use common::jwt::{decode_unverified_header, JwtValidationError, DEFAULT_LEEWAY};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::str::FromStr;

/// What a token must satisfy besides a valid signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationSettings {
    /// Expected `aud` value.
    pub audience: String,

    /// Expected `iss` value.
    pub issuer: String,

    /// Header algorithms accepted for verification.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Clock skew tolerance for `exp` and `nbf`, in seconds.
    pub leeway_seconds: u64,
}

impl VerificationSettings {
    /// Settings with the default algorithm (RS256) and no leeway.
    pub fn new(audience: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            issuer: issuer.into(),
            allowed_algorithms: vec![Algorithm::RS256],
            leeway_seconds: DEFAULT_LEEWAY.as_secs(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            audience: config.audience.clone(),
            issuer: config.issuer.clone(),
            allowed_algorithms: config.allowed_algorithms.clone(),
            leeway_seconds: config.jwt_leeway_seconds,
        }
    }

    #[must_use]
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    #[must_use]
    pub fn with_leeway(mut self, leeway_seconds: u64) -> Self {
        self.leeway_seconds = leeway_seconds;
        self
    }
}

/// Verify `token` with `signing_keys` and return its claims.
///
/// Deterministic given its inputs and the current time.
///
/// # Errors
///
/// - `MalformedToken` - undecodable header, algorithm not allowed or not
///   matching the key, bad signature, unparsable payload
/// - `InvalidHeader` - header has no usable `kid`
/// - `NoMatchingKey` - `kid` not in `signing_keys`
/// - `TokenExpired` - `exp` (plus leeway) is in the past
/// - `InvalidClaims` - `aud` or `iss` missing or not as expected, or `nbf`
///   (minus leeway) in the future
pub fn verify_and_decode(
    token: &str,
    signing_keys: &SigningKeySet,
    settings: &VerificationSettings,
) -> Result<ClaimSet, AuthError> {
    let header = decode_unverified_header(token).map_err(header_error)?;

    let kid = header
        .kid
        .as_deref()
        .ok_or_else(|| header_error(JwtValidationError::MissingKid))?;

    let jwk = signing_keys.get(kid).ok_or_else(|| {
        tracing::debug!(target: "guard.auth.jwt", kid = %kid, "No signing key for kid");
        AuthError::NoMatchingKey
    })?;

    let algorithm = pinned_algorithm(&header.alg, jwk, &settings.allowed_algorithms)?;
    let decoding_key = decoding_key_for(jwk, algorithm)?;

    let mut validation = Validation::new(algorithm);
    validation.set_audience(&[&settings.audience]);
    validation.set_issuer(&[&settings.issuer]);
    validation.set_required_spec_claims(&["exp", "aud", "iss"]);
    validation.validate_nbf = true;
    validation.leeway = settings.leeway_seconds;

    let token_data = decode::<RawClaims>(token, &decoding_key, &validation).map_err(|e| {
        let error = match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::ImmatureSignature => AuthError::InvalidClaims,
            ErrorKind::MissingRequiredClaim(claim) if claim == "aud" || claim == "iss" => {
                AuthError::InvalidClaims
            }
            _ => AuthError::MalformedToken,
        };
        tracing::debug!(target: "guard.auth.jwt", error = ?e, "Token verification failed");
        error
    })?;

    let claims = ClaimSet::from_verified(token_data.claims).ok_or_else(|| {
        tracing::debug!(target: "guard.auth.jwt", "Verified token lacks aud or iss");
        AuthError::InvalidClaims
    })?;

    tracing::debug!(target: "guard.auth.jwt", kid = %kid, "Token verified");

    Ok(claims)
}

/// Map a pre-verification header failure onto the client-facing error.
pub(crate) fn header_error(error: JwtValidationError) -> AuthError {
    tracing::debug!(target: "guard.auth.jwt", error = ?error, "Token header rejected");
    match error {
        JwtValidationError::MissingKid => AuthError::InvalidHeader("Authorization malformed."),
        JwtValidationError::TokenTooLarge | JwtValidationError::MalformedToken => {
            AuthError::MalformedToken
        }
    }
}

/// Resolve the single algorithm verification is pinned to.
fn pinned_algorithm(
    header_alg: &str,
    jwk: &Jwk,
    allowed: &[Algorithm],
) -> Result<Algorithm, AuthError> {
    let algorithm = Algorithm::from_str(header_alg).map_err(|_| {
        tracing::debug!(target: "guard.auth.jwt", alg = %header_alg, "Unknown token algorithm");
        AuthError::MalformedToken
    })?;

    if !allowed.contains(&algorithm) {
        tracing::debug!(target: "guard.auth.jwt", alg = %header_alg, "Token algorithm not allowed");
        return Err(AuthError::MalformedToken);
    }

    if let Some(key_alg) = jwk.alg.as_deref() {
        if key_alg != header_alg {
            tracing::debug!(
                target: "guard.auth.jwt",
                alg = %header_alg,
                key_alg = %key_alg,
                "Token algorithm does not match signing key"
            );
            return Err(AuthError::MalformedToken);
        }
    }

    Ok(algorithm)
}

/// Build a `DecodingKey` for `algorithm` from a JWK.
///
/// # Errors
///
/// Returns `AuthError::MalformedToken` if the key type does not fit the
/// algorithm family or the key material is missing or invalid.
pub fn decoding_key_for(jwk: &Jwk, algorithm: Algorithm) -> Result<DecodingKey, AuthError> {
    let unusable = |reason: &'static str| {
        tracing::warn!(
            target: "guard.auth.jwt",
            kid = ?jwk.kid,
            kty = %jwk.kty,
            reason,
            "Signing key unusable"
        );
        AuthError::MalformedToken
    };

    match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => {
            if jwk.kty != "RSA" {
                return Err(unusable("expected RSA key"));
            }
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                return Err(unusable("missing n or e"));
            };
            DecodingKey::from_rsa_components(n, e).map_err(|_| unusable("invalid RSA components"))
        }
        Algorithm::EdDSA => {
            if jwk.kty != "OKP" {
                return Err(unusable("expected OKP key"));
            }
            let x = jwk.x.as_deref().ok_or_else(|| unusable("missing x"))?;
            DecodingKey::from_ed_components(x).map_err(|_| unusable("invalid OKP component"))
        }
        Algorithm::ES256 | Algorithm::ES384 => {
            if jwk.kty != "EC" {
                return Err(unusable("expected EC key"));
            }
            let (Some(x), Some(y)) = (jwk.x.as_deref(), jwk.y.as_deref()) else {
                return Err(unusable("missing x or y"));
            };
            DecodingKey::from_ec_components(x, y).map_err(|_| unusable("invalid EC components"))
        }
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Err(unusable("symmetric algorithm"))
        }
    }
}
