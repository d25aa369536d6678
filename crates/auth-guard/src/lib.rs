//! Auth Guard Library
//!
//! Bearer-token authentication and permission-based authorization for HTTP
//! services whose tokens are issued by an external identity provider:
//!
//! - Extract the token from `Authorization: Bearer <token>`
//! - Resolve the issuer's signing keys from its JWKS endpoint (cached)
//! - Verify signature, expiry, audience and issuer
//! - Check a required permission against the `permissions` claim
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/authenticator.rs
//!                                        ├── auth/header.rs
//!                                        ├── auth/jwks.rs
//!                                        ├── auth/jwt.rs
//!                                        └── auth/permissions.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token extraction, key sets, verification, permission checks
//! - `config` - Service configuration from environment
//! - `errors` - Error taxonomy with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authorization and HTTP metrics middleware
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;

pub use auth::{check_permission, extract_token, verify_and_decode, Authenticator, ClaimSet};
pub use errors::AuthError;
