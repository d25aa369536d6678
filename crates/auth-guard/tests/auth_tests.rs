//! Authorization integration tests.
//!
//! Drives a real server through HTTP with tokens signed by fixed test keys,
//! against a mocked identity provider JWKS endpoint.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use guard_test_utils::{
    sign_hs256, MockJwksServer, TestClaimsBuilder, TestGuardServer, TestKeypair,
};
use std::collections::HashMap;

async fn get(server: &TestGuardServer, path: &str, auth: Option<&str>) -> Result<reqwest::Response> {
    let mut request = reqwest::Client::new().get(format!("{}{}", server.url(), path));
    if let Some(value) = auth {
        request = request.header("Authorization", value);
    }
    Ok(request.send().await?)
}

async fn error_body(response: reqwest::Response) -> Result<(String, String)> {
    let body: serde_json::Value = response.json().await?;
    Ok((
        body["code"].as_str().unwrap_or_default().to_string(),
        body["description"].as_str().unwrap_or_default().to_string(),
    ))
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_is_public() -> Result<()> {
    let server = TestGuardServer::spawn(&[&TestKeypair::rsa_primary()]).await?;

    let response = get(&server, "/health", None).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");
    assert_eq!(server.jwks().fetch_count().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_ready_reports_signing_keys() -> Result<()> {
    let server =
        TestGuardServer::spawn(&[&TestKeypair::rsa_primary(), &TestKeypair::rsa_rotated()])
            .await?;

    let response = get(&server, "/ready", None).await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["signing_keys"], 2);

    Ok(())
}

#[tokio::test]
async fn test_ready_fails_when_jwks_unavailable() -> Result<()> {
    let jwks = MockJwksServer::start_failing(500).await;
    let server = TestGuardServer::spawn_with(jwks, HashMap::new()).await?;

    let response = get(&server, "/ready", None).await?;

    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "not_ready");

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<()> {
    let server = TestGuardServer::spawn(&[&TestKeypair::rsa_primary()]).await?;

    let response = get(&server, "/metrics", None).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

// =============================================================================
// Header extraction
// =============================================================================

/// Missing header is rejected with a bearer challenge.
#[tokio::test]
async fn test_missing_header_is_rejected() -> Result<()> {
    let server = TestGuardServer::spawn(&[&TestKeypair::rsa_primary()]).await?;

    let response = get(&server, "/headers", None).await?;

    assert_eq!(response.status(), 401);
    let www_auth = response
        .headers()
        .get("www-authenticate")
        .expect("Should include WWW-Authenticate header");
    assert!(www_auth.to_str()?.starts_with("Bearer"));

    let (code, description) = error_body(response).await?;
    assert_eq!(code, "authorization_header_missing");
    assert_eq!(description, "Authorization header is expected.");

    Ok(())
}

#[tokio::test]
async fn test_bearer_without_token_is_rejected() -> Result<()> {
    let server = TestGuardServer::spawn(&[&TestKeypair::rsa_primary()]).await?;

    let response = get(&server, "/headers", Some("Bearer")).await?;

    assert_eq!(response.status(), 401);
    let (code, description) = error_body(response).await?;
    assert_eq!(code, "invalid_header");
    assert_eq!(description, "Token not found.");

    Ok(())
}

#[tokio::test]
async fn test_wrong_scheme_is_rejected() -> Result<()> {
    let server = TestGuardServer::spawn(&[&TestKeypair::rsa_primary()]).await?;

    let response = get(&server, "/headers", Some("Basic abc123")).await?;

    assert_eq!(response.status(), 401);
    let (code, description) = error_body(response).await?;
    assert_eq!(code, "invalid_header");
    assert_eq!(description, "Authorization header must start with \"Bearer\".");

    Ok(())
}

#[tokio::test]
async fn test_extra_segments_are_rejected() -> Result<()> {
    let server = TestGuardServer::spawn(&[&TestKeypair::rsa_primary()]).await?;

    let response = get(&server, "/headers", Some("Bearer abc def")).await?;

    assert_eq!(response.status(), 401);
    let (code, description) = error_body(response).await?;
    assert_eq!(code, "invalid_header");
    assert_eq!(description, "Authorization header must be bearer token.");

    Ok(())
}

// =============================================================================
// Token verification
// =============================================================================

#[tokio::test]
async fn test_malformed_token_is_bad_request() -> Result<()> {
    let server = TestGuardServer::spawn(&[&TestKeypair::rsa_primary()]).await?;

    let response = get(&server, "/headers", Some("Bearer not.a.jwt")).await?;

    assert_eq!(response.status(), 400);
    assert!(response.headers().get("www-authenticate").is_none());
    let (code, _) = error_body(response).await?;
    assert_eq!(code, "malformed_token");

    Ok(())
}

/// A token signed by a key the issuer does not publish.
#[tokio::test]
async fn test_unknown_signing_key_is_bad_request() -> Result<()> {
    let server = TestGuardServer::spawn(&[&TestKeypair::rsa_primary()]).await?;
    let token = TestKeypair::rsa_rotated().sign(
        &TestClaimsBuilder::new()
            .with_permissions(&["get:images"])
            .build(),
    );

    let response = get(&server, "/headers", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(response.status(), 400);
    let (code, description) = error_body(response).await?;
    assert_eq!(code, "no_matching_key");
    assert_eq!(description, "Unable to find the appropriate key.");

    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_rejected() -> Result<()> {
    let keypair = TestKeypair::rsa_primary();
    let server = TestGuardServer::spawn(&[&keypair]).await?;
    let token = keypair.sign(
        &TestClaimsBuilder::new()
            .with_permissions(&["get:images"])
            .expired()
            .build(),
    );

    let response = get(&server, "/headers", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(response.status(), 401);
    let (code, description) = error_body(response).await?;
    assert_eq!(code, "token_expired");
    assert_eq!(description, "Token expired.");

    Ok(())
}

#[tokio::test]
async fn test_wrong_audience_is_rejected() -> Result<()> {
    let keypair = TestKeypair::rsa_primary();
    let server = TestGuardServer::spawn(&[&keypair]).await?;
    let token = keypair.sign(
        &TestClaimsBuilder::new()
            .with_permissions(&["get:images"])
            .with_audience("some-other-api")
            .build(),
    );

    let response = get(&server, "/headers", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(response.status(), 401);
    let (code, description) = error_body(response).await?;
    assert_eq!(code, "invalid_claims");
    assert_eq!(
        description,
        "Incorrect claims. Please, check the audience and issuer."
    );

    Ok(())
}

#[tokio::test]
async fn test_token_without_audience_or_issuer_is_invalid_claims() -> Result<()> {
    let keypair = TestKeypair::rsa_primary();
    let server = TestGuardServer::spawn(&[&keypair]).await?;

    for claim in ["aud", "iss"] {
        let token = keypair.sign(
            &TestClaimsBuilder::new()
                .with_permissions(&["get:images"])
                .without_claim(claim)
                .build(),
        );

        let response = get(&server, "/headers", Some(&format!("Bearer {token}"))).await?;

        assert_eq!(response.status(), 401, "token without {claim}");
        let (code, _) = error_body(response).await?;
        assert_eq!(code, "invalid_claims", "token without {claim}");
    }

    Ok(())
}

#[tokio::test]
async fn test_token_not_yet_valid_is_invalid_claims() -> Result<()> {
    let keypair = TestKeypair::rsa_primary();
    let server = TestGuardServer::spawn(&[&keypair]).await?;
    let token = keypair.sign(
        &TestClaimsBuilder::new()
            .with_permissions(&["get:images"])
            .not_before_in(3600)
            .build(),
    );

    let response = get(&server, "/headers", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(response.status(), 401);
    let (code, _) = error_body(response).await?;
    assert_eq!(code, "invalid_claims");

    Ok(())
}

#[tokio::test]
async fn test_wrong_issuer_is_rejected() -> Result<()> {
    let keypair = TestKeypair::rsa_primary();
    let server = TestGuardServer::spawn(&[&keypair]).await?;
    let token = keypair.sign(
        &TestClaimsBuilder::new()
            .with_permissions(&["get:images"])
            .with_issuer("https://attacker.example.com/")
            .build(),
    );

    let response = get(&server, "/headers", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(response.status(), 401);
    let (code, _) = error_body(response).await?;
    assert_eq!(code, "invalid_claims");

    Ok(())
}

/// An attacker signs with HS256 using the published key as the secret.
#[tokio::test]
async fn test_hs256_token_is_rejected() -> Result<()> {
    let keypair = TestKeypair::rsa_primary();
    let server = TestGuardServer::spawn(&[&keypair]).await?;
    let token = sign_hs256(
        keypair.kid(),
        &TestClaimsBuilder::new()
            .with_permissions(&["get:images"])
            .build(),
        keypair.jwk()["n"].as_str().unwrap().as_bytes(),
    );

    let response = get(&server, "/headers", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(response.status(), 400);
    let (code, _) = error_body(response).await?;
    assert_eq!(code, "malformed_token");

    Ok(())
}

#[tokio::test]
async fn test_jwks_failure_is_service_unavailable() -> Result<()> {
    let jwks = MockJwksServer::start_failing(502).await;
    let server = TestGuardServer::spawn_with(jwks, HashMap::new()).await?;
    let token = TestKeypair::rsa_primary().sign(
        &TestClaimsBuilder::new()
            .with_permissions(&["get:images"])
            .build(),
    );

    let response = get(&server, "/headers", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(response.status(), 503);
    let (code, _) = error_body(response).await?;
    assert_eq!(code, "jwks_unavailable");

    Ok(())
}

#[tokio::test]
async fn test_algorithm_allow_list_comes_from_config() -> Result<()> {
    let keypair = TestKeypair::ed25519(5);
    let claims = TestClaimsBuilder::new()
        .with_permissions(&["get:images"])
        .build();
    let token = keypair.sign(&claims);

    // Default allow-list is RS256 only
    let rs_only = TestGuardServer::spawn(&[&keypair]).await?;
    let response = get(&rs_only, "/headers", Some(&format!("Bearer {token}"))).await?;
    assert_eq!(response.status(), 400);

    let overrides = HashMap::from([("AUTH_ALGORITHMS".to_string(), "RS256,EdDSA".to_string())]);
    let eddsa =
        TestGuardServer::spawn_with(MockJwksServer::start(&[&keypair]).await, overrides).await?;
    let response = get(&eddsa, "/headers", Some(&format!("Bearer {token}"))).await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

// =============================================================================
// Permissions
// =============================================================================

#[tokio::test]
async fn test_granted_permission_reaches_handler() -> Result<()> {
    let keypair = TestKeypair::rsa_primary();
    let server = TestGuardServer::spawn(&[&keypair]).await?;
    let token = keypair.sign(
        &TestClaimsBuilder::new()
            .with_permissions(&["get:images", "post:images"])
            .build(),
    );

    let response = get(&server, "/headers", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "Access Granted");

    Ok(())
}

#[tokio::test]
async fn test_absent_permission_is_forbidden() -> Result<()> {
    let keypair = TestKeypair::rsa_primary();
    let server = TestGuardServer::spawn(&[&keypair]).await?;
    let token = keypair.sign(
        &TestClaimsBuilder::new()
            .with_permissions(&["post:images"])
            .build(),
    );

    let response = get(&server, "/headers", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(response.status(), 403);
    let www_auth = response.headers().get("www-authenticate").unwrap();
    assert!(www_auth.to_str()?.contains("insufficient_scope"));
    let (code, description) = error_body(response).await?;
    assert_eq!(code, "permission_denied");
    assert_eq!(description, "Permission not found.");

    Ok(())
}

#[tokio::test]
async fn test_missing_permissions_claim_is_bad_request() -> Result<()> {
    let keypair = TestKeypair::rsa_primary();
    let server = TestGuardServer::spawn(&[&keypair]).await?;
    let token = keypair.sign(&TestClaimsBuilder::new().without_permissions().build());
    let auth = format!("Bearer {token}");

    // Same outcome whether or not the route requires a permission
    for path in ["/headers", "/api/v1/me"] {
        let response = get(&server, path, Some(&auth)).await?;
        assert_eq!(response.status(), 400, "path {path}");
        let (code, description) = error_body(response).await?;
        assert_eq!(code, "missing_permissions_claim");
        assert_eq!(description, "Permissions not included in JWT.");
    }

    Ok(())
}

/// The handler sees the verified claims exactly as issued.
#[tokio::test]
async fn test_me_returns_claims_unchanged() -> Result<()> {
    let keypair = TestKeypair::rsa_primary();
    let server = TestGuardServer::spawn(&[&keypair]).await?;
    let claims = TestClaimsBuilder::new()
        .for_subject("auth0|alice")
        .with_permissions(&["get:images"])
        .with_claim("scope", serde_json::json!("openid profile"))
        .build();
    let token = keypair.sign(&claims);

    let response = get(&server, "/api/v1/me", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, claims);

    Ok(())
}

#[tokio::test]
async fn test_key_set_is_fetched_once_across_requests() -> Result<()> {
    let keypair = TestKeypair::rsa_primary();
    let server = TestGuardServer::spawn(&[&keypair]).await?;
    let auth = format!(
        "Bearer {}",
        keypair.sign(
            &TestClaimsBuilder::new()
                .with_permissions(&["get:images"])
                .build()
        )
    );

    for _ in 0..3 {
        let response = get(&server, "/headers", Some(&auth)).await?;
        assert_eq!(response.status(), 200);
    }

    assert_eq!(server.jwks().fetch_count().await, 1);

    Ok(())
}
