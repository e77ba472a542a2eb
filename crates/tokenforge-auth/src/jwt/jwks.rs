//! JWKS publication, fetching and caching
//!
//! A [`JwksSource`] yields the current key set. Two direct sources exist:
//!
//! - [`KeyStore`] recomputes its single-key set on every call (issuer side)
//! - [`HttpJwksSource`] fetches `{issuer}/.well-known/jwks.json` on every call
//!   (verifier side)
//!
//! [`CachedJwksSource`] decorates any source with a single-slot TTL cache.
//! The cache is replaced wholesale once it expires. Refreshes are not
//! coalesced: concurrent callers that all observe an expired slot each fetch
//! from the delegate and the last write wins. The lock is never held across
//! the fetch, so a refresh never blocks readers of a still-fresh entry.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::error::{AuthError, AuthResult};
use crate::keys::KeyStore;
use crate::sanitize::sanitize_issuer;

/// Well-known path of the JWKS document relative to the issuer
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A single JSON Web Key
///
/// Only the members needed for RS256 are modelled; unknown members in remote
/// documents are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`RSA`)
    pub kty: String,
    /// Key identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Public key use (`sig`)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Intended algorithm, when the publisher states one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// RSA modulus, base64url without padding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent, base64url without padding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// RSA signing key with the given id and base64url components
    pub fn rsa(kid: impl Into<String>, n: impl Into<String>, e: impl Into<String>) -> Self {
        Self {
            kty: "RSA".to_string(),
            kid: Some(kid.into()),
            key_use: Some("sig".to_string()),
            alg: None,
            n: Some(n.into()),
            e: Some(e.into()),
        }
    }

    /// Modulus and exponent, if this is a complete RSA key
    pub fn rsa_components(&self) -> Option<(&str, &str)> {
        if self.kty != "RSA" {
            return None;
        }
        Some((self.n.as_deref()?, self.e.as_deref()?))
    }
}

/// JSON Web Key Set document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// Published keys
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find the key whose `kid` equals `kid`
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|jwk| jwk.kid.as_deref() == Some(kid))
    }

    /// Number of keys in the set
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set has no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Anything that can produce the current JWKS
#[async_trait]
pub trait JwksSource: Send + Sync + fmt::Debug {
    /// Current key set
    async fn jwks(&self) -> AuthResult<JwkSet>;
}

#[async_trait]
impl JwksSource for KeyStore {
    async fn jwks(&self) -> AuthResult<JwkSet> {
        Ok(KeyStore::jwks(self))
    }
}

/// Direct remote source: GET `{issuer}/.well-known/jwks.json` on every call
#[derive(Debug, Clone)]
pub struct HttpJwksSource {
    jwks_uri: String,
    http_client: reqwest::Client,
}

impl HttpJwksSource {
    /// Create a source for `issuer` (bare domain or URL)
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the issuer is empty or the HTTP
    /// client cannot be built.
    pub fn new(issuer: &str) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::invalid_config(format!("Failed to build HTTP client: {e}")))?;
        Self::with_client(issuer, http_client)
    }

    /// Create a source that shares an existing HTTP client
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the issuer is empty.
    pub fn with_client(issuer: &str, http_client: reqwest::Client) -> AuthResult<Self> {
        Ok(Self {
            jwks_uri: format!("{}{JWKS_PATH}", sanitize_issuer(issuer)?),
            http_client,
        })
    }

    /// The JWKS endpoint URL
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }
}

#[async_trait]
impl JwksSource for HttpJwksSource {
    async fn jwks(&self) -> AuthResult<JwkSet> {
        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");

        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                AuthError::upstream_transport("GET", &self.jwks_uri, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                jwks_uri = %self.jwks_uri,
                status = %status,
                "JWKS endpoint returned error status"
            );
            return Err(AuthError::upstream_status(
                "GET",
                &self.jwks_uri,
                status.as_u16(),
                &body,
            ));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            AuthError::upstream_transport("GET", &self.jwks_uri, format!("invalid JWKS: {e}"))
        })?;

        info!(
            jwks_uri = %self.jwks_uri,
            key_count = jwks.len(),
            "Successfully fetched JWKS"
        );
        Ok(jwks)
    }
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    // None: TTL beyond the clock's range, never expires
    expires_at: Option<Instant>,
}

/// Single-slot TTL cache in front of another [`JwksSource`]
#[derive(Debug)]
pub struct CachedJwksSource {
    inner: Arc<dyn JwksSource>,
    ttl: Duration,
    slot: RwLock<Option<CachedJwks>>,
}

impl CachedJwksSource {
    /// Cache `inner` for `ttl`
    pub fn new(inner: Arc<dyn JwksSource>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop the cached entry so the next call refreshes
    pub async fn clear(&self) {
        *self.slot.write().await = None;
        debug!("JWKS cache cleared");
    }
}

#[async_trait]
impl JwksSource for CachedJwksSource {
    async fn jwks(&self) -> AuthResult<JwkSet> {
        {
            let slot = self.slot.read().await;
            if let Some(cached) = slot.as_ref()
                && cached.expires_at.is_none_or(|at| Instant::now() < at)
            {
                debug!(key_count = cached.jwks.len(), "Using cached JWKS");
                return Ok(cached.jwks.clone());
            }
        }

        let jwks = self.inner.jwks().await?;

        *self.slot.write().await = Some(CachedJwks {
            jwks: jwks.clone(),
            expires_at: Instant::now().checked_add(self.ttl),
        });
        debug!(ttl_secs = self.ttl.as_secs(), "JWKS cache refreshed");

        Ok(jwks)
    }
}
