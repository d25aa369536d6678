//! Test server harness for E2E testing
//!
//! Provides `TestGuardServer` for spawning real Auth Guard instances in tests,
//! wired to a [`MockJwksServer`].

use crate::crypto_fixtures::TestKeypair;
use crate::jwks_mock::MockJwksServer;
use crate::token_builders::{TEST_AUDIENCE, TEST_ISSUER_DOMAIN};
use auth_guard::config::Config;
use auth_guard::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning Auth Guard in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_headers_flow() -> Result<()> {
///     let keypair = TestKeypair::rsa_primary();
///     let server = TestGuardServer::spawn(&[&keypair]).await?;
///
///     let response = reqwest::Client::new()
///         .get(format!("{}/headers", server.url()))
///         .bearer_auth(keypair.sign(&TestClaimsBuilder::new().build()))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 403);
///     Ok(())
/// }
/// ```
pub struct TestGuardServer {
    addr: SocketAddr,
    config: Config,
    jwks: MockJwksServer,
    _handle: JoinHandle<()>,
}

impl TestGuardServer {
    /// Spawn a server whose issuer publishes `keys`.
    pub async fn spawn(keys: &[&TestKeypair]) -> Result<Self, anyhow::Error> {
        Self::spawn_with(MockJwksServer::start(keys).await, HashMap::new()).await
    }

    /// Spawn a server against an existing JWKS mock, with extra environment
    /// variables layered over the test defaults.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Trust [`TEST_ISSUER_DOMAIN`] and expect [`TEST_AUDIENCE`]
    /// - Fetch signing keys from `jwks`
    pub async fn spawn_with(
        jwks: MockJwksServer,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            (
                "AUTH_ISSUER_DOMAIN".to_string(),
                TEST_ISSUER_DOMAIN.to_string(),
            ),
            ("AUTH_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            ("AUTH_JWKS_URL".to_string(), jwks.jwks_url()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        // A second global recorder cannot be installed in one process; fall
        // back to a standalone one
        let metrics_handle = routes::init_metrics_recorder().unwrap_or_else(|_| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .build_recorder()
                .handle()
        });

        let state = Arc::new(AppState::new(&config));
        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            jwks,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The mocked issuer JWKS endpoint.
    pub fn jwks(&self) -> &MockJwksServer {
        &self.jwks
    }
}

impl Drop for TestGuardServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
