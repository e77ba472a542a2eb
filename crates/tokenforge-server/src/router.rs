//! HTTP routes of the issuer service
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/.well-known/jwks.json` | JWKS of the signing key |
//! | GET | `/.well-known/openid-configuration` | `{jwks_uri, issuer}` |
//! | POST | `/oauth/token` | `{access_token, expires_in, scope, token_type}` |
//! | any | anything else | 404 listing the routes above |
//!
//! The issuer URL is derived from the request itself: the scheme from
//! `X-Forwarded-Proto` (default `http`) and the authority from `Host`.
//! The token endpoint performs no client authentication.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokenforge_auth::jwt::JWKS_PATH;
use tokenforge_auth::provider::TOKEN_PATH;
use tokenforge_auth::{JwkSet, TokenIssuer, TokenRequest};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::ServerResult;

/// Path of the OpenID discovery document
pub const OPENID_CONFIGURATION_PATH: &str = "/.well-known/openid-configuration";

/// `gty` claim stamped on every issued token
pub const GRANT_TYPE: &str = "client-credentials";

/// Registered routes, as listed in 404 responses
pub const ENDPOINTS: &[(&str, &str)] = &[
    ("GET", JWKS_PATH),
    ("GET", OPENID_CONFIGURATION_PATH),
    ("POST", TOKEN_PATH),
];

#[derive(Debug)]
struct TokenDefaults {
    ttl: Duration,
    subject: String,
    audience: String,
    scope: String,
}

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    issuer: TokenIssuer,
    defaults: Arc<TokenDefaults>,
    authority: Arc<str>,
}

impl AppState {
    /// State for `issuer`; `authority` stands in for a missing `Host` header
    pub fn new(issuer: TokenIssuer, config: &ServerConfig, authority: impl Into<String>) -> Self {
        Self {
            issuer,
            defaults: Arc::new(TokenDefaults {
                ttl: Duration::from_secs(config.token_ttl_secs),
                subject: config.default_subject.clone(),
                audience: config.default_audience.clone(),
                scope: config.default_scope.clone(),
            }),
            authority: Arc::from(authority.into()),
        }
    }

    /// The token issuer
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    fn base_url(&self, headers: &HeaderMap) -> String {
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("http");
        let authority = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(self.authority.as_ref());

        format!("{scheme}://{authority}")
    }
}

/// Optional body of a token request
///
/// Every member is optional and unparsable bodies are treated as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenEndpointRequest {
    /// Requested audience
    pub audience: Option<String>,
    /// Client id; the subject becomes `<client_id>@clients`
    pub client_id: Option<String>,
    /// Requested scope
    pub scope: Option<String>,
}

/// Token endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEndpointResponse {
    /// Signed JWT
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    /// Granted scope
    pub scope: String,
    /// Always `bearer`
    pub token_type: String,
}

/// Build the issuer router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(JWKS_PATH, get(jwks))
        .route(OPENID_CONFIGURATION_PATH, get(openid_configuration))
        .route(TOKEN_PATH, post(token))
        .fallback(not_found)
        .with_state(state)
}

async fn jwks(State(state): State<AppState>) -> Json<JwkSet> {
    Json(state.issuer.key_store().jwks())
}

async fn openid_configuration(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let issuer = state.base_url(&headers);
    Json(json!({
        "jwks_uri": format!("{issuer}{JWKS_PATH}"),
        "issuer": issuer,
    }))
}

async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Json<TokenEndpointResponse>> {
    let params = if body.is_empty() {
        TokenEndpointRequest::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|e| {
            debug!(error = %e, "Ignoring unparsable token request body");
            TokenEndpointRequest::default()
        })
    };

    let defaults = &state.defaults;
    let subject = non_empty(params.client_id)
        .map(|client_id| format!("{client_id}@clients"))
        .unwrap_or_else(|| defaults.subject.clone());
    let audience = non_empty(params.audience).unwrap_or_else(|| defaults.audience.clone());
    let scope = params.scope.unwrap_or_else(|| defaults.scope.clone());

    let request = TokenRequest::new(state.base_url(&headers), &subject, &audience, defaults.ttl)
        .with_scope(scope.clone())
        .with_grant_type(GRANT_TYPE);
    let access_token = state.issuer.create_token(&request)?;

    info!(subject = %subject, audience = %audience, "Issued access token");

    Ok(Json(TokenEndpointResponse {
        access_token,
        expires_in: defaults.ttl.as_secs(),
        scope,
        token_type: "bearer".to_string(),
    }))
}

async fn not_found() -> impl IntoResponse {
    let endpoints: Vec<_> = ENDPOINTS
        .iter()
        .map(|(method, path)| json!({"method": method, "path": path}))
        .collect();

    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status_code": 404,
            "message": "not found",
            "endpoints": endpoints,
        })),
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use once_cell::sync::Lazy;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tokenforge_auth::{DecodedToken, KeyStore};
    use tower::ServiceExt; // for `oneshot`

    static ISSUER: Lazy<TokenIssuer> =
        Lazy::new(|| TokenIssuer::new(Arc::new(KeyStore::generate(2048).unwrap())));

    fn app() -> Router {
        router(AppState::new(
            ISSUER.clone(),
            &ServerConfig::default(),
            "127.0.0.1:8080",
        ))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_jwks_endpoint() {
        let response = app()
            .oneshot(Request::get(JWKS_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["keys"].as_array().unwrap().len(), 1);
        assert_eq!(json["keys"][0]["kid"], ISSUER.kid());
        assert_eq!(json["keys"][0]["kty"], "RSA");
        assert_eq!(json["keys"][0]["use"], "sig");
    }

    #[tokio::test]
    async fn test_openid_configuration_uses_request_origin() {
        let response = app()
            .oneshot(
                Request::get(OPENID_CONFIGURATION_PATH)
                    .header("host", "auth.example.com")
                    .header("x-forwarded-proto", "https")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            body_json(response).await,
            json!({
                "jwks_uri": "https://auth.example.com/.well-known/jwks.json",
                "issuer": "https://auth.example.com",
            })
        );
    }

    #[tokio::test]
    async fn test_openid_configuration_without_host_header() {
        let response = app()
            .oneshot(
                Request::get(OPENID_CONFIGURATION_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["issuer"], "http://127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_token_endpoint_defaults() {
        let response = app()
            .oneshot(
                Request::post(TOKEN_PATH)
                    .header("host", "localhost:9000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["expires_in"], 3600);
        assert_eq!(json["scope"], "");
        assert_eq!(json["token_type"], "bearer");

        let token = DecodedToken::decode_unverified(json["access_token"].as_str().unwrap()).unwrap();
        assert_eq!(token.issuer(), Some("http://localhost:9000/"));
        assert_eq!(token.subject(), Some("tokenforge@clients"));
        assert_eq!(token.claim("aud"), Some(&json!("tokenforge")));
        assert_eq!(token.claim("gty"), Some(&json!("client-credentials")));
        assert!(ISSUER.verify_signature(json["access_token"].as_str().unwrap()).unwrap());
    }

    #[tokio::test]
    async fn test_token_endpoint_reads_request_body() {
        let body = json!({
            "grant_type": "client_credentials",
            "client_id": "svc",
            "client_secret": "ignored",
            "audience": "https://api.example.com",
            "scope": "read:data",
        });
        let response = app()
            .oneshot(
                Request::post(TOKEN_PATH)
                    .header("host", "localhost:9000")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["scope"], "read:data");
        let token = DecodedToken::decode_unverified(json["access_token"].as_str().unwrap()).unwrap();
        assert_eq!(token.subject(), Some("svc@clients"));
        assert_eq!(token.claim("aud"), Some(&json!("https://api.example.com")));
        assert_eq!(token.scope(), Some("read:data"));
    }

    #[tokio::test]
    async fn test_token_endpoint_ignores_garbage_body() {
        let response = app()
            .oneshot(
                Request::post(TOKEN_PATH)
                    .body(Body::from("grant_type=client_credentials"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_not_found_lists_endpoints() {
        let response = app()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        assert_eq!(
            body_json(response).await,
            json!({
                "status_code": 404,
                "message": "not found",
                "endpoints": [
                    {"method": "GET", "path": "/.well-known/jwks.json"},
                    {"method": "GET", "path": "/.well-known/openid-configuration"},
                    {"method": "POST", "path": "/oauth/token"},
                ],
            })
        );
    }
}
