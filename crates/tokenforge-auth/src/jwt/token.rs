//! Compact JWT structure: header, claims and the unverified peek

use std::collections::BTreeSet;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

/// The only signing algorithm issued or accepted
pub const RS256: &str = "RS256";

/// JOSE header of a compact JWT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm
    pub alg: String,
    /// Token type, `JWT` for tokens issued here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Key id binding the token to a JWK
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl TokenHeader {
    /// RS256 header for the given key id
    pub fn rs256(kid: impl Into<String>) -> Self {
        Self {
            alg: RS256.to_string(),
            typ: Some("JWT".to_string()),
            kid: Some(kid.into()),
        }
    }
}

/// Header and claims of a token
///
/// Produced either by [`TokenVerifier`](crate::TokenVerifier) after full
/// verification, or by [`DecodedToken::decode_unverified`] for inspection.
/// Only the former may be trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedToken {
    /// JOSE header
    pub header: TokenHeader,
    /// Claims object
    pub payload: Map<String, Value>,
}

impl DecodedToken {
    /// Split and decode a token without checking its signature
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingToken`] for an empty string and
    /// [`AuthError::MalformedToken`] if the token is not three base64url JSON
    /// segments.
    pub fn decode_unverified(token: &str) -> AuthResult<Self> {
        let (header, payload, _) = split(token)?;
        Ok(Self {
            header: decode_segment(header, "header")?,
            payload: decode_segment(payload, "payload")?,
        })
    }

    /// Raw claim value
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Claim that must be present and non-empty
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the claim is absent, null or an
    /// empty string.
    pub fn required_claim(&self, name: &str) -> AuthResult<&Value> {
        match self.payload.get(name) {
            None | Some(Value::Null) => Err(missing_claim(name)),
            Some(Value::String(s)) if s.is_empty() => Err(missing_claim(name)),
            Some(value) => Ok(value),
        }
    }

    /// Deserialize the claims into a caller-defined type
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Json`] if the claims do not match `T`.
    pub fn claims<T: DeserializeOwned>(&self) -> AuthResult<T> {
        Ok(serde_json::from_value(Value::Object(self.payload.clone()))?)
    }

    /// `sub` claim
    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// `iss` claim
    pub fn issuer(&self) -> Option<&str> {
        self.str_claim("iss")
    }

    /// `scope` claim
    pub fn scope(&self) -> Option<&str> {
        self.str_claim("scope")
    }

    /// `exp` claim in seconds since the epoch
    pub fn expires_at(&self) -> Option<u64> {
        self.payload.get("exp").and_then(Value::as_u64)
    }

    /// Granted permissions: space-delimited `scope` entries plus the
    /// `permissions` array, deduplicated and sorted
    pub fn permissions(&self) -> Vec<String> {
        let mut granted: BTreeSet<&str> = self
            .scope()
            .map(|scope| scope.split_whitespace().collect())
            .unwrap_or_default();

        if let Some(Value::Array(permissions)) = self.payload.get("permissions") {
            granted.extend(permissions.iter().filter_map(Value::as_str));
        }

        granted.into_iter().map(str::to_string).collect()
    }

    /// Whether `permission` is granted
    pub fn has_permission(&self, permission: &str) -> bool {
        self.scope()
            .is_some_and(|scope| scope.split_whitespace().any(|p| p == permission))
            || matches!(
                self.payload.get("permissions"),
                Some(Value::Array(permissions))
                    if permissions.iter().any(|p| p.as_str() == Some(permission))
            )
    }

    fn str_claim(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }
}

fn missing_claim(name: &str) -> AuthError {
    AuthError::InvalidToken(format!("Missing '{name}' claim"))
}

/// Decode only the JOSE header
///
/// # Errors
///
/// Same as [`DecodedToken::decode_unverified`].
pub fn decode_header(token: &str) -> AuthResult<TokenHeader> {
    let (header, _, _) = split(token)?;
    decode_segment(header, "header")
}

fn split(token: &str) -> AuthResult<(&str, &str, &str)> {
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    let mut segments = token.split('.');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(header), Some(payload), Some(signature), None) => Ok((header, payload, signature)),
        _ => Err(AuthError::malformed("expected three dot-separated segments")),
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str, what: &str) -> AuthResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| AuthError::malformed(format!("{what} is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::malformed(format!("{what} is not a JSON object: {e}")))
}

/// base64url (no padding) encoding of a JSON value
pub(crate) fn encode_segment<T: Serialize>(value: &T) -> AuthResult<String> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}
