//! # Guard Test Utilities
//!
//! Shared test utilities for Auth Guard.
//!
//! This crate provides:
//! - Fixed signing keys with their public JWKs (RSA and Ed25519)
//! - Claim builders for test tokens
//! - A mocked identity provider JWKS endpoint
//! - Server test harness (TestGuardServer for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use guard_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::rsa_primary();
//!     let jwks = MockJwksServer::start(&[&keypair]).await;
//!
//!     let token = keypair.sign(
//!         &TestClaimsBuilder::new()
//!             .with_permissions(&["get:images"])
//!             .build(),
//!     );
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_mock;
pub mod server_harness;
pub mod token_builders;

pub use crypto_fixtures::*;
pub use jwks_mock::*;
pub use server_harness::*;
pub use token_builders::*;
