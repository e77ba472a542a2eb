//! Configuration types for the token lifecycle components
//!
//! All structures deserialize from any serde format so a host can embed them in
//! its own configuration file. Durations are whole seconds on the wire and
//! [`Duration`] in the component APIs.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Recommended RSA modulus size
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Smallest RSA modulus accepted for signing keys
pub const MIN_KEY_BITS: usize = 2048;

/// Signing key configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyStoreConfig {
    /// PEM file holding the private key; generated and persisted when absent.
    /// `None` generates an ephemeral in-memory key.
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// Modulus size for newly generated keys
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            key_path: None,
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

impl KeyStoreConfig {
    /// Ephemeral key of the given size
    pub fn ephemeral(key_bits: usize) -> Self {
        Self {
            key_path: None,
            key_bits,
        }
    }

    /// Persistent key at `path`
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: Some(path.into()),
            ..Self::default()
        }
    }
}

fn default_key_bits() -> usize {
    DEFAULT_KEY_BITS
}

/// Token verifier configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Expected issuer (bare domain or URL; sanitized on use)
    pub issuer: String,
    /// Expected audience
    pub audience: String,
    /// JWKS cache TTL in seconds; `None` fetches on every verification
    #[serde(default)]
    pub jwks_cache_ttl_secs: Option<u64>,
    /// Clock skew tolerance for `exp` in seconds
    #[serde(default)]
    pub leeway_secs: u64,
}

impl VerifierConfig {
    /// Configuration without JWKS caching and zero leeway
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            jwks_cache_ttl_secs: None,
            leeway_secs: 0,
        }
    }

    /// Set the JWKS cache TTL
    pub fn with_jwks_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl_secs = Some(ttl.as_secs());
        self
    }

    /// JWKS cache TTL, if caching is enabled
    pub fn jwks_cache_ttl(&self) -> Option<Duration> {
        self.jwks_cache_ttl_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Clock skew tolerance
    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_secs)
    }
}

/// Client-credentials token provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Issuer hosting `/oauth/token` (bare domain or URL)
    pub issuer: String,
    /// API identifier requested as `audience`
    pub audience: String,
    /// Client ID
    pub client_id: String,
    /// Client secret (zeroized on drop, never logged)
    #[serde(serialize_with = "serialize_secret")]
    pub client_secret: SecretString,
    /// Treat cached tokens as expired this many seconds early
    #[serde(default)]
    pub expiry_skew_secs: u64,
}

impl ProviderConfig {
    /// Create a provider configuration with no expiry skew
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            expiry_skew_secs: 0,
        }
    }

    /// Expiry skew margin
    pub fn expiry_skew(&self) -> Duration {
        Duration::from_secs(self.expiry_skew_secs)
    }
}

fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}
