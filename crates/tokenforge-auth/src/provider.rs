//! Client-credentials access token provider
//!
//! [`TokenProvider`] obtains an access token from `{issuer}/oauth/token` and
//! keeps it in a single-slot cache until it expires (optionally shifted
//! earlier by a skew margin). One provider serves exactly one
//! issuer/audience/credential tuple.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::ProviderConfig;
use crate::error::{AuthError, AuthResult};
use crate::sanitize::sanitize_issuer;

/// Path of the token endpoint relative to the issuer
pub const TOKEN_PATH: &str = "/oauth/token";

/// Hook that rewrites the token request body before it is sent
pub type PayloadCustomizer = Arc<dyn Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync>;

/// A token endpoint response held in the provider cache
#[derive(Debug, Clone)]
pub struct CachedAccessToken {
    /// Full JSON response body
    pub response_body: Value,
    /// `access_token` member
    pub access_token: String,
    /// `token_type` member
    pub token_type: String,
    /// Local instant at which the token expires (`now + expires_in`);
    /// `None` when `expires_in` lies beyond the clock's range
    pub expires_at: Option<Instant>,
}

impl CachedAccessToken {
    /// Whether `now + skew >= expires_at`
    ///
    /// A skew too large to add to the clock counts as expired.
    pub fn is_expired(&self, skew: Duration) -> bool {
        let Some(expires_at) = self.expires_at else {
            return false;
        };
        Instant::now()
            .checked_add(skew)
            .is_none_or(|deadline| deadline >= expires_at)
    }

    /// `Authorization` header value: `"{token_type} {access_token}"`
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: u64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Fetches and caches client-credentials access tokens
pub struct TokenProvider {
    token_url: String,
    audience: String,
    client_id: String,
    client_secret: SecretString,
    expiry_skew: Duration,
    payload_customizer: Option<PayloadCustomizer>,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedAccessToken>>,
}

// Manual Debug impl so the client secret and customizer never reach logs
impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("token_url", &self.token_url)
            .field("audience", &self.audience)
            .field("client_id", &self.client_id)
            .field("expiry_skew", &self.expiry_skew)
            .field("payload_customizer", &self.payload_customizer.is_some())
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    /// Create a provider for one issuer/audience/credential tuple
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if any argument is empty.
    pub fn new(
        issuer: &str,
        audience: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> AuthResult<Self> {
        let issuer = sanitize_issuer(issuer)?;
        let audience = audience.into();
        let client_id = client_id.into();

        if audience.trim().is_empty() {
            return Err(AuthError::invalid_config("missing audience"));
        }
        if client_id.trim().is_empty() {
            return Err(AuthError::invalid_config("missing client_id"));
        }
        if client_secret.expose_secret().is_empty() {
            return Err(AuthError::invalid_config("missing client_secret"));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::invalid_config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            token_url: format!("{issuer}{TOKEN_PATH}"),
            audience,
            client_id,
            client_secret,
            expiry_skew: Duration::ZERO,
            payload_customizer: None,
            http_client,
            cache: RwLock::new(None),
        })
    }

    /// Create a provider from configuration
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if any field is empty.
    pub fn from_config(config: &ProviderConfig) -> AuthResult<Self> {
        Ok(Self::new(
            &config.issuer,
            config.audience.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        )?
        .with_expiry_skew(config.expiry_skew()))
    }

    /// Treat cached tokens as expired `skew` early
    pub fn with_expiry_skew(mut self, skew: Duration) -> Self {
        self.expiry_skew = skew;
        self
    }

    /// Rewrite the request body before each token request
    pub fn with_payload_customizer<F>(mut self, customizer: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.payload_customizer = Some(Arc::new(customizer));
        self
    }

    /// Use a preconfigured HTTP client
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Token endpoint URL
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Current token, fetching a new one when the cache is empty or stale
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Upstream`] on a transport failure, a non-200
    /// response or an unparsable response body.
    pub async fn get_token(&self) -> AuthResult<CachedAccessToken> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && !cached.is_expired(self.expiry_skew)
            {
                debug!(token_url = %self.token_url, "Using cached access token");
                return Ok(cached.clone());
            }
        }

        let token = self.fetch().await?;
        *self.cache.write().await = Some(token.clone());
        Ok(token)
    }

    /// Current access token string
    ///
    /// # Errors
    ///
    /// As [`get_token`](Self::get_token).
    pub async fn access_token(&self) -> AuthResult<String> {
        Ok(self.get_token().await?.access_token)
    }

    /// Current `Authorization` header value
    ///
    /// # Errors
    ///
    /// As [`get_token`](Self::get_token).
    pub async fn authorization_header(&self) -> AuthResult<String> {
        Ok(self.get_token().await?.authorization())
    }

    /// Drop the cached token so the next call fetches
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
    }

    fn request_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("grant_type".into(), "client_credentials".into());
        body.insert("audience".into(), self.audience.clone().into());
        body.insert("client_id".into(), self.client_id.clone().into());
        body.insert(
            "client_secret".into(),
            self.client_secret.expose_secret().clone().into(),
        );

        match &self.payload_customizer {
            Some(customize) => customize(body),
            None => body,
        }
    }

    async fn fetch(&self) -> AuthResult<CachedAccessToken> {
        info!(
            token_url = %self.token_url,
            client_id = %self.client_id,
            audience = %self.audience,
            "Requesting access token"
        );

        let response = self
            .http_client
            .post(&self.token_url)
            .json(&self.request_body())
            .send()
            .await
            .map_err(|e| {
                error!(token_url = %self.token_url, error = %e, "Token request failed");
                AuthError::upstream_transport("POST", &self.token_url, e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::upstream_transport("POST", &self.token_url, e))?;

        if status != StatusCode::OK {
            error!(
                token_url = %self.token_url,
                status = %status,
                "Token endpoint returned error status"
            );
            return Err(AuthError::upstream_status(
                "POST",
                &self.token_url,
                status.as_u16(),
                &body,
            ));
        }

        let invalid_body = |e: serde_json::Error| {
            error!(token_url = %self.token_url, error = %e, "Invalid token response");
            AuthError::upstream_transport(
                "POST",
                &self.token_url,
                format!("invalid token response: {e}"),
            )
        };
        let response_body: Value = serde_json::from_str(&body).map_err(invalid_body)?;
        let parsed: TokenResponse =
            serde_json::from_value(response_body.clone()).map_err(invalid_body)?;

        debug!(
            token_url = %self.token_url,
            expires_in = parsed.expires_in,
            "Received access token"
        );

        Ok(CachedAccessToken {
            response_body,
            access_token: parsed.access_token,
            token_type: parsed.token_type,
            expires_at: Instant::now().checked_add(Duration::from_secs(parsed.expires_in)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> TokenProvider {
        TokenProvider::new(
            "tenant.auth0.com/",
            "https://api",
            "client",
            SecretString::new("secret".into()),
        )
        .unwrap()
    }

    #[test]
    fn test_token_url() {
        assert_eq!(
            provider().token_url(),
            "https://tenant.auth0.com/oauth/token"
        );
    }

    #[test]
    fn test_rejects_missing_arguments() {
        let secret = || SecretString::new("secret".into());
        assert!(TokenProvider::new("", "a", "c", secret()).is_err());
        assert!(TokenProvider::new("i", "", "c", secret()).is_err());
        assert!(TokenProvider::new("i", "a", "", secret()).is_err());
        assert!(TokenProvider::new("i", "   ", "c", secret()).is_err());
        assert!(TokenProvider::new("i", "a", " ", secret()).is_err());
        assert!(TokenProvider::new("i", "a", "c", SecretString::new(String::new())).is_err());
    }

    #[test]
    fn test_request_body_and_customizer() {
        let body = provider().request_body();
        assert_eq!(body["grant_type"], "client_credentials");
        assert_eq!(body["client_secret"], "secret");

        let customized = provider()
            .with_payload_customizer(|mut body| {
                body.insert("organization".into(), "org_123".into());
                body
            })
            .request_body();
        assert_eq!(customized["organization"], "org_123");
        assert_eq!(customized["audience"], "https://api");
    }

    #[test]
    fn test_debug_hides_secret() {
        assert!(!format!("{:?}", provider()).contains("secret"));
    }

    #[tokio::test]
    async fn test_expiry_with_skew() {
        let token = CachedAccessToken {
            response_body: Value::Null,
            access_token: "abc".into(),
            token_type: "bearer".into(),
            expires_at: Instant::now().checked_add(Duration::from_secs(60)),
        };

        assert!(!token.is_expired(Duration::ZERO));
        assert!(token.is_expired(Duration::from_secs(60)));
        assert!(token.is_expired(Duration::MAX));
        assert_eq!(token.authorization(), "bearer abc");
    }

    #[test]
    fn test_unbounded_expiry_never_expires() {
        let token = CachedAccessToken {
            response_body: Value::Null,
            access_token: "abc".into(),
            token_type: "bearer".into(),
            expires_at: None,
        };

        assert!(!token.is_expired(Duration::ZERO));
        assert!(!token.is_expired(Duration::MAX));
    }
}
