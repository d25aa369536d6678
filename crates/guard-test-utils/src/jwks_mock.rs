//! Mock identity provider JWKS endpoint.
//!
//! Wraps a wiremock server answering `GET /.well-known/jwks.json`.

use crate::crypto_fixtures::{jwks_document, TestKeypair};
use auth_guard::config::JWKS_PATH;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mocked JWKS endpoint.
///
/// # Example
/// ```rust,ignore
/// let keypair = TestKeypair::rsa_primary();
/// let jwks = MockJwksServer::start(&[&keypair]).await;
/// let client = JwksClient::new();
/// let keys = client.fetch_signing_keys(&jwks.jwks_url()).await?;
/// assert_eq!(jwks.fetch_count().await, 1);
/// ```
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a server publishing `keys`.
    pub async fn start(keys: &[&TestKeypair]) -> Self {
        let mock = Self {
            server: MockServer::start().await,
        };
        mock.mount(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .await;
        mock
    }

    /// Start a server answering every JWKS request with `status`.
    pub async fn start_failing(status: u16) -> Self {
        let mock = Self {
            server: MockServer::start().await,
        };
        mock.mount(ResponseTemplate::new(status)).await;
        mock
    }

    /// Scheme, host and port of this server, usable as an issuer domain.
    pub fn issuer_domain(&self) -> String {
        self.server.uri()
    }

    /// Full JWKS URL on this server.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Replace the published keys (key rotation).
    ///
    /// Resets the server, which also clears the recorded request count.
    pub async fn publish(&self, keys: &[&TestKeypair]) {
        self.server.reset().await;
        self.mount(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .await;
    }

    /// Publish `keys` but answer only after `delay`.
    pub async fn publish_slowly(&self, keys: &[&TestKeypair], delay: Duration) {
        self.server.reset().await;
        self.mount(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(keys))
                .set_delay(delay),
        )
        .await;
    }

    /// Answer every JWKS request with `status` from now on.
    pub async fn fail_with(&self, status: u16) {
        self.server.reset().await;
        self.mount(ResponseTemplate::new(status)).await;
    }

    /// Answer with a body that is not a JWKS document.
    pub async fn serve_garbage(&self) {
        self.server.reset().await;
        self.mount(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .await;
    }

    /// Number of JWKS requests received since start or the last reset.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }

    async fn mount(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}
