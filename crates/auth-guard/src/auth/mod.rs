//! Bearer token authentication and authorization.

pub mod authenticator;
pub mod claims;
pub mod header;
pub mod jwks;
pub mod jwt;
pub mod permissions;

pub use authenticator::Authenticator;
pub use claims::{Audience, ClaimSet};
pub use header::extract_token;
pub use jwks::{Jwk, JwksClient, JwksResponse, SigningKeySet};
pub use jwt::{decoding_key_for, verify_and_decode, VerificationSettings};
pub use permissions::check_permission;
