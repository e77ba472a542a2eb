//! RS256 token issuance
//!
//! Tokens are assembled by hand so the header carries exactly
//! `{alg, typ, kid}` and the payload exactly the requested claims.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};
use tracing::debug;

use super::token::{TokenHeader, encode_segment};
use crate::error::{AuthError, AuthResult};
use crate::keys::KeyStore;
use crate::sanitize::sanitize_issuer;

/// Claims requested for a new token
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tokenforge_auth::TokenRequest;
///
/// let request = TokenRequest::new("auth.example.com", "svc@clients", "https://api", Duration::from_secs(3600))
///     .with_scope("read:data")
///     .with_claim("tenant", "acme");
/// assert_eq!(request.scope.as_deref(), Some("read:data"));
/// ```
#[derive(Debug, Clone)]
pub struct TokenRequest {
    /// Issuer, sanitized and suffixed with `/` in the `iss` claim
    pub issuer: String,
    /// `sub` claim
    pub subject: String,
    /// `aud` claim
    pub audience: String,
    /// Lifetime; `exp = iat + expires_in`
    pub expires_in: Duration,
    /// Space-delimited `scope` claim
    pub scope: Option<String>,
    /// Additional claims, merged last (they may overwrite standard claims)
    pub extra_claims: Map<String, Value>,
}

impl TokenRequest {
    /// Request with the required claims
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        audience: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            subject: subject.into(),
            audience: audience.into(),
            expires_in,
            scope: None,
            extra_claims: Map::new(),
        }
    }

    /// Set the `scope` claim
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Add one extra claim
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_claims.insert(name.into(), value.into());
        self
    }

    /// Merge a map of extra claims
    pub fn with_claims(mut self, claims: Map<String, Value>) -> Self {
        self.extra_claims.extend(claims);
        self
    }

    /// Set the `gty` (grant type) claim
    pub fn with_grant_type(self, grant_type: impl Into<String>) -> Self {
        let grant_type: String = grant_type.into();
        self.with_claim("gty", grant_type)
    }
}

/// Builds and signs compact RS256 JWTs with a [`KeyStore`]
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyStore>,
}

impl TokenIssuer {
    /// Issuer signing with `keys`
    pub fn new(keys: Arc<KeyStore>) -> Self {
        Self { keys }
    }

    /// The signing key store
    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    /// Key id stamped into every issued header
    pub fn kid(&self) -> &str {
        self.keys.kid()
    }

    /// Create a signed token
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] for an empty issuer and
    /// [`AuthError::Signing`] if the RSA operation fails.
    pub fn create_token(&self, request: &TokenRequest) -> AuthResult<String> {
        let issuer = format!("{}/", sanitize_issuer(&request.issuer)?);
        let issued_at = unix_now();
        let expires_at = issued_at.saturating_add(request.expires_in.as_secs());

        let mut payload = Map::new();
        payload.insert("iss".into(), issuer.into());
        payload.insert("exp".into(), expires_at.into());
        payload.insert("iat".into(), issued_at.into());
        payload.insert("sub".into(), request.subject.clone().into());
        payload.insert("aud".into(), request.audience.clone().into());
        if let Some(scope) = &request.scope {
            payload.insert("scope".into(), scope.clone().into());
        }
        payload.extend(request.extra_claims.clone());

        let signing_input = format!(
            "{}.{}",
            encode_segment(&TokenHeader::rs256(self.keys.kid()))?,
            encode_segment(&payload)?
        );
        let signature = self.keys.sign(signing_input.as_bytes())?;

        debug!(
            kid = %self.keys.kid(),
            subject = %request.subject,
            audience = %request.audience,
            expires_at,
            "Issued token"
        );

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Check the signature of a token issued by this key, without claims checks
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingToken`] or [`AuthError::MalformedToken`]
    /// for inputs that are not compact JWTs.
    pub fn verify_signature(&self, token: &str) -> AuthResult<bool> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| AuthError::malformed("missing signature segment"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| AuthError::malformed(format!("signature is not base64url: {e}")))?;

        Ok(self.keys.verify(&signature, signing_input.as_bytes()))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
