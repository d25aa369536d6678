//! Verified token claims.
//!
//! A [`ClaimSet`] has no public constructor and does not implement
//! `Deserialize`: it is built only by [`verify_and_decode`](super::jwt::verify_and_decode)
//! after the signature and standard claims have been checked. The `sub` field
//! is redacted in Debug output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The `aud` claim, which may be a single string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }

    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            Audience::Single(aud) => vec![aud.as_str()],
            Audience::Multiple(auds) => auds.iter().map(String::as_str).collect(),
        }
    }
}

/// Token payload as it comes out of `jsonwebtoken::decode`.
///
/// `iss` and `aud` are optional here so that a token lacking them reaches
/// the required-claim check instead of failing payload deserialization.
#[derive(Deserialize)]
pub(crate) struct RawClaims {
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    aud: Option<Audience>,
    #[serde(default)]
    iat: Option<i64>,
    exp: i64,
    #[serde(default)]
    permissions: Option<Vec<String>>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Claims of a successfully verified token.
///
/// Example payload:
///
/// ```json
/// {
///   "iss": "https://tenant.example.com/",
///   "sub": "auth0|5d03d3e6726b8f0cb4bf71c9",
///   "aud": "image",
///   "iat": 1560556174,
///   "exp": 1560563374,
///   "azp": "ki4B6jZkuJd87bpB2Mw8zdkj1l3ofpzj",
///   "permissions": ["get:images", "post:images"]
/// }
/// ```
#[derive(Clone, PartialEq, Serialize)]
pub struct ClaimSet {
    iss: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    aud: Audience,
    #[serde(skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<Vec<String>>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Debug for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimSet")
            .field("iss", &self.iss)
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("aud", &self.aud)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("permissions", &self.permissions)
            .field("extra_claims", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ClaimSet {
    /// Only called once verification has succeeded.
    ///
    /// Returns `None` if `iss` or `aud` is absent.
    pub(crate) fn from_verified(raw: RawClaims) -> Option<Self> {
        Some(Self {
            iss: raw.iss?,
            sub: raw.sub,
            aud: raw.aud?,
            iat: raw.iat,
            exp: raw.exp,
            permissions: raw.permissions,
            extra: raw.extra,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.iss
    }

    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref()
    }

    pub fn audience(&self) -> &Audience {
        &self.aud
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.iat
    }

    pub fn expires_at(&self) -> i64 {
        self.exp
    }

    /// The `permissions` claim; `None` when the token carries no such claim
    /// at all (as opposed to an empty list).
    pub fn permissions(&self) -> Option<&[String]> {
        self.permissions.as_deref()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .as_ref()
            .is_some_and(|perms| perms.iter().any(|p| p == permission))
    }

    /// Any other claim in the payload, by name (e.g. `azp`, `scope`).
    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.extra.get(name)
    }
}
