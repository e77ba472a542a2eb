//! # TokenForge Auth - RS256 Token Lifecycle
//!
//! Issuance, publication and verification of RS256-signed JWTs for OAuth2
//! client-credentials deployments (modeled on the Auth0 contract).
//!
//! ## Architecture
//!
//! - [`keys`] - [`KeyStore`]: the single active RSA keypair, its `kid` and JWK
//! - [`jwt`] - [`TokenIssuer`], JWKS sources ([`HttpJwksSource`],
//!   [`CachedJwksSource`]) and [`TokenVerifier`]
//! - [`provider`] - [`TokenProvider`]: client-credentials token client with caching
//! - [`bearer`] - `Authorization` header parsing
//! - [`sanitize`] - issuer normalization shared by every component
//! - [`config`] - serde-backed configuration structures
//! - [`error`] - the [`AuthError`] taxonomy (status, wire code, description)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokenforge_auth::{KeyStore, TokenIssuer, TokenRequest, TokenVerifier};
//!
//! # async fn run() -> tokenforge_auth::AuthResult<()> {
//! let keys = Arc::new(KeyStore::generate(2048)?);
//! let issuer = TokenIssuer::new(keys.clone());
//!
//! let token = issuer.create_token(
//!     &TokenRequest::new("auth.example.com", "svc@clients", "https://api", Duration::from_secs(3600))
//!         .with_scope("read:data"),
//! )?;
//!
//! // Verify against the local key set; remote issuers use `TokenVerifier::new`
//! let verifier = TokenVerifier::with_jwks_source("auth.example.com", "https://api", keys)?;
//! let decoded = verifier.verify_with_permissions(&token, &["read:data"]).await?;
//! assert_eq!(decoded.subject(), Some("svc@clients"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Security
//!
//! - Only RS256 is issued or accepted; the algorithm is checked before any key
//!   is fetched
//! - `exp`, `aud` and `iss` are always validated; leeway defaults to zero
//! - Client secrets are held as [`secrecy::SecretString`] and never logged

pub mod bearer;
pub mod config;
pub mod error;
pub mod jwt;
pub mod keys;
pub mod provider;
pub mod sanitize;

#[doc(inline)]
pub use bearer::extract_bearer_token;
#[doc(inline)]
pub use config::{DEFAULT_KEY_BITS, KeyStoreConfig, MIN_KEY_BITS, ProviderConfig, VerifierConfig};
#[doc(inline)]
pub use error::{AuthError, AuthResult, ErrorKind};
#[doc(inline)]
pub use jwt::{
    CachedJwksSource, DecodedToken, HttpJwksSource, Jwk, JwkSet, JwksSource, TokenHeader,
    TokenIssuer, TokenRequest, TokenVerifier,
};
#[doc(inline)]
pub use keys::KeyStore;
#[doc(inline)]
pub use provider::{CachedAccessToken, PayloadCustomizer, TokenProvider};
#[doc(inline)]
pub use sanitize::sanitize_issuer;

// Re-exported so callers can build provider configuration without a direct dependency
pub use secrecy::SecretString;
