//! JWT structure utilities shared across Auth Guard crates.
//!
//! This module provides the pieces of token handling that happen *before* any
//! signature verification:
//! - Size limits for DoS prevention
//! - Leeway constants for `exp` validation
//! - Unverified header decoding and key ID extraction
//! - Parsing of configured algorithm allow-lists
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing returned from this module is trusted; the header is only used to
//!   select a key from a trusted JWKS and to check the algorithm against an
//!   explicit allow-list
//! - Symmetric (HMAC) algorithms are never accepted in an allow-list, since
//!   keys come from a public JWKS document
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_unverified_header, parse_algorithm_list};
//!
//! let allowed = parse_algorithm_list("RS256")?;
//! let header = decode_unverified_header(token)?;
//! let kid = header.kid.ok_or(MyError::MissingKid)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any base64 decoding or
/// cryptographic operations.
///
/// # Rationale
///
/// - Typical identity-provider access tokens are 700-1500 bytes
/// - A long `permissions` array still fits comfortably
/// - Checked before base64 decode so oversized input costs almost nothing
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default leeway applied to `exp` and `nbf` validation (none).
///
/// A token is expired as soon as `exp` is in the past. Deployments with
/// clock drift between the issuer and this service can raise it.
pub const DEFAULT_LEEWAY: Duration = Duration::ZERO;

/// Maximum configurable leeway (10 minutes).
pub const MAX_LEEWAY: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a token before verification.
///
/// Note: Display messages are intentionally generic. Detailed information is
/// logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid")]
    MalformedToken,

    /// Token is missing the `kid` header (or it is empty / not a string).
    #[error("The access token is invalid")]
    MissingKid,
}

/// Errors produced when parsing a configured algorithm list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlgorithmListError {
    /// The list contained no algorithms.
    #[error("algorithm list must not be empty")]
    Empty,

    /// A name did not match any known JWS algorithm.
    #[error("unknown algorithm '{0}'")]
    Unknown(String),

    /// A symmetric algorithm was listed; JWKS keys are public keys.
    #[error("symmetric algorithm '{0}' cannot be verified with a published key set")]
    Symmetric(String),
}

// =============================================================================
// Header Types
// =============================================================================

/// The JOSE header of a token, decoded WITHOUT verifying the signature.
///
/// Only the fields needed for key selection and algorithm pinning are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedHeader {
    /// Algorithm name as written in the header (e.g. `"RS256"`).
    pub alg: String,

    /// Key ID, if present as a non-empty string.
    pub kid: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Decode the header segment of a compact JWT without verifying anything.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - The result MUST NOT be trusted beyond key selection
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - Not three segments, bad base64url, invalid JSON, or
///   missing / non-string `alg`
pub fn decode_unverified_header(token: &str) -> Result<UnverifiedHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = header
        .get("alg")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "common.jwt", "JWT header has no string alg");
            JwtValidationError::MalformedToken
        })?;

    let kid = header
        .get("kid")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    Ok(UnverifiedHeader { alg, kid })
}

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// # Errors
///
/// Same as [`decode_unverified_header`], plus `MissingKid` when the header has
/// no non-empty string `kid`.
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    decode_unverified_header(token)?
        .kid
        .ok_or(JwtValidationError::MissingKid)
}

/// Returns true for HMAC algorithms, which need a shared secret.
#[must_use]
pub fn is_symmetric(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Parse a comma-separated list of JWS algorithm names (e.g. `"RS256,ES256"`).
///
/// Whitespace around names is ignored and duplicates are collapsed.
///
/// # Errors
///
/// - `Empty` - No names in the list
/// - `Unknown` - A name is not a JWS algorithm known to `jsonwebtoken`
/// - `Symmetric` - An HMAC algorithm was listed
pub fn parse_algorithm_list(list: &str) -> Result<Vec<Algorithm>, AlgorithmListError> {
    let mut algorithms = Vec::new();

    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alg = Algorithm::from_str(name)
            .map_err(|_| AlgorithmListError::Unknown(name.to_string()))?;
        if is_symmetric(alg) {
            return Err(AlgorithmListError::Symmetric(name.to_string()));
        }
        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }

    if algorithms.is_empty() {
        return Err(AlgorithmListError::Empty);
    }

    Ok(algorithms)
}

// =============================================================================
// Tests
// =============================================================================
