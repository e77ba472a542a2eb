//! RS256 token verification against a JWKS
//!
//! Verification is a linear pipeline; each stage either passes the token on or
//! rejects it with a typed [`AuthError`]:
//!
//! 1. empty input → [`AuthError::MissingToken`]
//! 2. header decode → [`AuthError::MalformedToken`]
//! 3. algorithm gate (`RS256` only, checked before any key is fetched) →
//!    [`AuthError::InvalidAlgorithm`]
//! 4. key resolution by `kid` → [`AuthError::KeyNotFound`]
//! 5. signature, `exp`, `aud` and `iss` → [`AuthError::TokenExpired`],
//!    [`AuthError::InvalidClaims`] or [`AuthError::InvalidToken`]
//! 6. optional permission check → [`AuthError::Forbidden`]

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::jwks::{CachedJwksSource, HttpJwksSource, JwksSource};
use super::token::{DecodedToken, RS256, decode_header};
use crate::bearer::extract_bearer_token;
use crate::config::VerifierConfig;
use crate::error::{AuthError, AuthResult};
use crate::sanitize::sanitize_issuer;

/// Verifies bearer tokens issued by one RS256 issuer for one audience
///
/// # Example
///
/// ```rust,no_run
/// # use tokenforge_auth::TokenVerifier;
/// # async fn run() -> tokenforge_auth::AuthResult<()> {
/// let verifier = TokenVerifier::new("tenant.auth0.com", "https://api.example.com")?
///     .with_jwks_cache_ttl(std::time::Duration::from_secs(600));
///
/// let token = verifier.verify_with_permissions("eyJhbGciOi...", &["read:data"]).await?;
/// println!("subject: {:?}", token.subject());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    issuer: String,
    expected_issuer: String,
    audience: String,
    jwks: Arc<dyn JwksSource>,
    leeway: Duration,
}

impl TokenVerifier {
    /// Verifier fetching `{issuer}/.well-known/jwks.json` on every call
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the issuer or audience is empty.
    pub fn new(issuer: &str, audience: impl Into<String>) -> AuthResult<Self> {
        let source = HttpJwksSource::new(issuer)?;
        Self::with_jwks_source(issuer, audience, Arc::new(source))
    }

    /// Verifier resolving keys through an arbitrary source
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the issuer or audience is empty.
    pub fn with_jwks_source(
        issuer: &str,
        audience: impl Into<String>,
        jwks: Arc<dyn JwksSource>,
    ) -> AuthResult<Self> {
        let issuer = sanitize_issuer(issuer)?;
        let audience = audience.into();
        if audience.trim().is_empty() {
            return Err(AuthError::invalid_config("missing audience"));
        }

        Ok(Self {
            expected_issuer: format!("{issuer}/"),
            issuer,
            audience,
            jwks,
            leeway: Duration::ZERO,
        })
    }

    /// Verifier built from configuration
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the issuer or audience is empty.
    pub fn from_config(config: &VerifierConfig) -> AuthResult<Self> {
        let mut verifier = Self::new(&config.issuer, config.audience.clone())?
            .with_leeway(config.leeway());
        if let Some(ttl) = config.jwks_cache_ttl() {
            verifier = verifier.with_jwks_cache_ttl(ttl);
        }
        Ok(verifier)
    }

    /// Put a single-slot TTL cache in front of the current JWKS source
    pub fn with_jwks_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks = Arc::new(CachedJwksSource::new(self.jwks, ttl));
        self
    }

    /// Tolerate `exp` up to `leeway` in the past
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Sanitized issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// `iss` value a token must carry (sanitized issuer plus `/`)
    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    /// Expected audience
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Verify signature, expiry, audience and issuer
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of the first failing stage, or an upstream
    /// error if the JWKS cannot be fetched.
    pub async fn verify(&self, token: &str) -> AuthResult<DecodedToken> {
        if token.is_empty() {
            debug!("Rejected empty token");
            return Err(AuthError::MissingToken);
        }

        let header = decode_header(token).inspect_err(|e| {
            debug!(error = ?e, "Failed to decode JWT header");
        })?;

        if header.alg != RS256 {
            warn!(algorithm = %header.alg, "Rejected token with non-RS256 algorithm");
            return Err(AuthError::InvalidAlgorithm { alg: header.alg });
        }

        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.expected_issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation.leeway = self.leeway.as_secs();

        let data = decode::<Map<String, Value>>(token, &key, &validation).map_err(|e| {
            debug!(
                error = %e,
                issuer = %self.expected_issuer,
                audience = %self.audience,
                "JWT validation failed"
            );
            classify(e)
        })?;

        let decoded = DecodedToken {
            header,
            payload: data.claims,
        };
        debug!(subject = ?decoded.subject(), "JWT validation successful");
        Ok(decoded)
    }

    /// [`verify`](Self::verify), then require every permission in `required`
    ///
    /// Granted permissions are the space-delimited `scope` entries plus the
    /// `permissions` claim array.
    ///
    /// # Errors
    ///
    /// As [`verify`](Self::verify), plus [`AuthError::Forbidden`] naming the
    /// first missing permission.
    pub async fn verify_with_permissions(
        &self,
        token: &str,
        required: &[&str],
    ) -> AuthResult<DecodedToken> {
        let decoded = self.verify(token).await?;

        if let Some(missing) = required.iter().find(|p| !decoded.has_permission(p)) {
            warn!(
                subject = ?decoded.subject(),
                permission = %missing,
                "Token lacks required permission"
            );
            return Err(AuthError::Forbidden {
                permission: (*missing).to_string(),
            });
        }

        Ok(decoded)
    }

    /// Extract the bearer token from an `Authorization` header value and verify it
    ///
    /// # Errors
    ///
    /// [`AuthError::HeaderMissing`] / [`AuthError::InvalidHeader`] for a bad
    /// header, otherwise as [`verify_with_permissions`](Self::verify_with_permissions).
    pub async fn verify_authorization_header(
        &self,
        header: Option<&str>,
        required: &[&str],
    ) -> AuthResult<DecodedToken> {
        let token = extract_bearer_token(header)?;
        self.verify_with_permissions(token, required).await
    }

    async fn decoding_key(&self, kid: Option<&str>) -> AuthResult<DecodingKey> {
        let jwks = self.jwks.jwks().await?;

        let Some((n, e)) = kid
            .and_then(|kid| jwks.find(kid))
            .and_then(|jwk| jwk.rsa_components())
        else {
            debug!(kid = ?kid, key_count = jwks.len(), "Key ID not found in JWKS");
            return Err(AuthError::KeyNotFound {
                kid: kid.map(str::to_string),
            });
        };

        DecodingKey::from_rsa_components(n, e)
            .map_err(|e| AuthError::InvalidToken(format!("Invalid JWK: {e}")))
    }
}

fn classify(error: jsonwebtoken::errors::Error) -> AuthError {
    match error.kind() {
        JwtErrorKind::ExpiredSignature => AuthError::TokenExpired,
        JwtErrorKind::InvalidAudience => AuthError::invalid_claims("audience mismatch"),
        JwtErrorKind::InvalidIssuer => AuthError::invalid_claims("issuer mismatch"),
        JwtErrorKind::MissingRequiredClaim(claim) => {
            AuthError::invalid_claims(format!("missing '{claim}' claim"))
        }
        _ => AuthError::InvalidToken(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::issuer::{TokenIssuer, TokenRequest};
    use crate::keys::KeyStore;
    use once_cell::sync::Lazy;

    static KEYS: Lazy<Arc<KeyStore>> = Lazy::new(|| Arc::new(KeyStore::generate(2048).unwrap()));

    const ISSUER: &str = "auth.example.com";
    const AUDIENCE: &str = "https://api.example.com";

    fn verifier() -> TokenVerifier {
        TokenVerifier::with_jwks_source(ISSUER, AUDIENCE, KEYS.clone()).unwrap()
    }

    fn token(request: TokenRequest) -> String {
        TokenIssuer::new(KEYS.clone()).create_token(&request).unwrap()
    }

    fn request() -> TokenRequest {
        TokenRequest::new(ISSUER, "svc@clients", AUDIENCE, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_round_trip() {
        let decoded = verifier().verify(&token(request())).await.unwrap();
        assert_eq!(decoded.subject(), Some("svc@clients"));
        assert_eq!(decoded.issuer(), Some("https://auth.example.com/"));
        assert_eq!(decoded.header.kid.as_deref(), Some(KEYS.kid()));
    }

    #[tokio::test]
    async fn test_issuer_forms_are_equivalent() {
        let verifier =
            TokenVerifier::with_jwks_source("https://auth.example.com/", AUDIENCE, KEYS.clone())
                .unwrap();
        assert_eq!(verifier.expected_issuer(), "https://auth.example.com/");
        assert!(verifier.verify(&token(request())).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_audience_and_issuer() {
        let mut wrong_aud = request();
        wrong_aud.audience = "https://other".into();
        let err = verifier().verify(&token(wrong_aud)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClaims { .. }));

        let mut wrong_iss = request();
        wrong_iss.issuer = "evil.example.com".into();
        let err = verifier().verify(&token(wrong_iss)).await.unwrap_err();
        assert_eq!(err.code(), "invalid_claims");
    }

    #[tokio::test]
    async fn test_unknown_kid() {
        let other = Arc::new(KeyStore::generate(2048).unwrap());
        let foreign = TokenIssuer::new(other).create_token(&request()).unwrap();
        let err = verifier().verify(&foreign).await.unwrap_err();
        assert!(matches!(err, AuthError::KeyNotFound { kid: Some(_) }));
        assert_eq!(err.description(), "Unable to find appropriate key.");
    }

    #[tokio::test]
    async fn test_tampered_payload_is_invalid() {
        let forged_payload = crate::jwt::token::encode_segment(&serde_json::json!({
            "iss": "https://auth.example.com/",
            "sub": "admin",
            "aud": AUDIENCE,
            "exp": u32::MAX,
        }))
        .unwrap();
        let token = token(request());
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged_payload;

        let err = verifier().verify(&parts.join(".")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
        assert_eq!(err.code(), "invalid_token");
    }

    #[tokio::test]
    async fn test_permissions() {
        let token = token(request().with_scope("read:data"));
        assert!(
            verifier()
                .verify_with_permissions(&token, &["read:data"])
                .await
                .is_ok()
        );

        let err = verifier()
            .verify_with_permissions(&token, &["read:data", "write:data"])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(matches!(err, AuthError::Forbidden { ref permission } if permission == "write:data"));
    }

    #[tokio::test]
    async fn test_authorization_header() {
        let token = token(request());
        let header = format!("Bearer {token}");
        assert!(
            verifier()
                .verify_authorization_header(Some(&header), &[])
                .await
                .is_ok()
        );
        assert!(matches!(
            verifier().verify_authorization_header(None, &[]).await,
            Err(AuthError::HeaderMissing)
        ));
    }

    #[test]
    fn test_empty_audience_rejected() {
        assert!(matches!(
            TokenVerifier::with_jwks_source(ISSUER, " ", KEYS.clone()),
            Err(AuthError::InvalidConfig(_))
        ));
    }
}
