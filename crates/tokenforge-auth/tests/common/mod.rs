//! Common test utilities for integration tests
//!
//! Provides a shared signing key and a wiremock-backed identity provider that
//! serves the key's JWKS and a client-credentials token endpoint.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde_json::json;
use tokenforge_auth::{KeyStore, TokenIssuer, TokenRequest};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const AUDIENCE: &str = "https://api.example.com";
pub const SUBJECT: &str = "test-client@clients";

/// One 2048-bit key per test binary
pub static KEYS: Lazy<Arc<KeyStore>> =
    Lazy::new(|| Arc::new(KeyStore::generate(2048).expect("key generation")));

/// Mock identity provider
pub struct MockIssuer {
    pub server: MockServer,
}

impl MockIssuer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Issuer URL as configured by clients (`http://127.0.0.1:<port>`)
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    /// Serve the shared key's JWKS, expecting exactly `calls` requests
    pub async fn mock_jwks(&self, calls: u64) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(KEYS.jwks()))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Serve the shared key's JWKS after `delay`, with no call expectation
    pub async fn mock_slow_jwks(&self, delay: Duration) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(KEYS.jwks())
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Respond to the JWKS endpoint with `status`
    pub async fn mock_jwks_error(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Token endpoint returning `access_token` valid for `expires_in` seconds
    pub async fn mock_token(&self, access_token: &str, expires_in: u64, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "expires_in": expires_in,
                "scope": "read:data",
                "token_type": "bearer",
            })))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Token endpoint failing with `status` and `body`
    pub async fn mock_token_error(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Sign a token for this issuer with the shared key
    pub fn token(&self, request: TokenRequest) -> String {
        TokenIssuer::new(KEYS.clone())
            .create_token(&request)
            .expect("token creation")
    }

    /// Token request for this issuer and [`AUDIENCE`]
    pub fn request(&self, expires_in: Duration) -> TokenRequest {
        TokenRequest::new(self.issuer(), SUBJECT, AUDIENCE, expires_in)
    }

    /// Number of requests received on `endpoint`
    pub async fn hits(&self, endpoint: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == endpoint)
            .count()
    }
}
