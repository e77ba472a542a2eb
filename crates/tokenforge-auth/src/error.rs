//! Error types for tokenforge-auth
//!
//! Every failure the token lifecycle can produce maps to exactly one
//! [`AuthError`] variant. Each variant carries a fixed HTTP-equivalent status,
//! a machine-readable wire code and a human description, so callers at the
//! outermost request boundary never need to inspect error strings.
//!
//! | Kind | Status | Wire code |
//! |------|--------|-----------|
//! | `MissingToken` | 401 | `invalid_token` |
//! | `MalformedToken` | 401 | `invalid_token` |
//! | `InvalidAlgorithm` | 401 | `invalid_token` |
//! | `KeyNotFound` | 401 | `invalid_token` |
//! | `InvalidToken` | 401 | `invalid_token` |
//! | `TokenExpired` | 401 | `token_expired` |
//! | `InvalidClaims` | 401 | `invalid_claims` |
//! | `Forbidden` | 403 | `forbidden` |
//! | `HeaderMissing` | 401 | `authorization_header_missing` |
//! | `InvalidHeader` | 401 | `invalid_header` |
//! | `KeyLoad` | 500 | `key_load_error` |
//! | `Upstream` | 502 | `upstream_error` |

use std::fmt;

use thiserror::Error;

/// Result type for tokenforge-auth operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Fine-grained classification of an [`AuthError`]
///
/// Several kinds share the `invalid_token` wire code; the kind keeps them
/// distinguishable for callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty or absent token
    MissingToken,
    /// Token is not a parseable three-segment JWT
    MalformedToken,
    /// Header declares an algorithm other than RS256
    InvalidAlgorithm,
    /// No JWK matches the token's `kid`
    KeyNotFound,
    /// Generic signature or decode failure
    InvalidToken,
    /// `exp` claim is in the past
    TokenExpired,
    /// Issuer or audience mismatch
    InvalidClaims,
    /// Required permission absent
    Forbidden,
    /// No `Authorization` header
    HeaderMissing,
    /// `Authorization` header present but not `Bearer <token>`
    InvalidHeader,
    /// Private key file could not be parsed
    KeyLoad,
    /// Token or JWKS endpoint failed
    Upstream,
    /// Invalid construction argument
    InvalidConfig,
    /// RSA signing failed
    Signing,
    /// Filesystem failure
    Io,
    /// JSON (de)serialization failure
    Json,
}

impl ErrorKind {
    /// Stable snake_case name of this kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MalformedToken => "malformed_token",
            Self::InvalidAlgorithm => "invalid_algorithm",
            Self::KeyNotFound => "key_not_found",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::InvalidClaims => "invalid_claims",
            Self::Forbidden => "forbidden",
            Self::HeaderMissing => "header_missing",
            Self::InvalidHeader => "invalid_header",
            Self::KeyLoad => "key_load_error",
            Self::Upstream => "upstream_error",
            Self::InvalidConfig => "invalid_config",
            Self::Signing => "signing_error",
            Self::Io => "io_error",
            Self::Json => "json_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for token issuance, publication and verification
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AuthError {
    /// Empty or absent token string
    #[error("Token is missing.")]
    MissingToken,

    /// Header or payload not parseable as a JWT
    #[error("Malformed token.")]
    MalformedToken {
        /// Underlying parse failure
        reason: String,
    },

    /// Header declares a non-RS256 algorithm
    #[error("Invalid token. Use an RS256 signed JWT Access Token.")]
    InvalidAlgorithm {
        /// The algorithm named in the token header
        alg: String,
    },

    /// No JWK matches the token's key id
    #[error("Unable to find appropriate key.")]
    KeyNotFound {
        /// The `kid` from the token header, if any
        kid: Option<String>,
    },

    /// Any other decode or signature validation failure
    #[error("{0}")]
    InvalidToken(String),

    /// `exp` claim is in the past
    #[error("Token is expired.")]
    TokenExpired,

    /// Issuer or audience mismatch
    #[error("Incorrect claims, check audience and issuer.")]
    InvalidClaims {
        /// Which check failed
        reason: String,
    },

    /// Required permission absent from `scope`/`permissions`
    #[error("You don't have access to this resource (missing '{permission}' permission)")]
    Forbidden {
        /// The first missing permission
        permission: String,
    },

    /// `Authorization` header absent
    #[error("Authorization header is expected")]
    HeaderMissing,

    /// `Authorization` header malformed
    #[error("{0}")]
    InvalidHeader(String),

    /// Unparsable or unusable private key
    #[error("Failed to load signing key: {0}")]
    KeyLoad(String),

    /// Non-success response or transport failure from a remote endpoint
    #[error("Invalid response {method} {url} >> {detail}")]
    Upstream {
        /// HTTP method
        method: &'static str,
        /// Requested URL
        url: String,
        /// Upstream status, when a response was received
        status: Option<u16>,
        /// Status line and body, or the transport error
        detail: String,
    },

    /// Invalid construction argument (empty issuer, key too small, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// RSA signing failure
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Filesystem failure while persisting or reading a key
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    /// Create a malformed-token error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedToken {
            reason: reason.into(),
        }
    }

    /// Create an invalid-claims error
    pub fn invalid_claims(reason: impl Into<String>) -> Self {
        Self::InvalidClaims {
            reason: reason.into(),
        }
    }

    /// Create an invalid-header error
    pub fn invalid_header(description: impl Into<String>) -> Self {
        Self::InvalidHeader(description.into())
    }

    /// Create a configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create an upstream error for a response with a non-success status
    pub fn upstream_status(
        method: &'static str,
        url: impl Into<String>,
        status: u16,
        body: &str,
    ) -> Self {
        Self::Upstream {
            method,
            url: url.into(),
            status: Some(status),
            detail: format!("{status} {body}").trim_end().to_string(),
        }
    }

    /// Create an upstream error for a transport failure
    pub fn upstream_transport(
        method: &'static str,
        url: impl Into<String>,
        error: impl fmt::Display,
    ) -> Self {
        Self::Upstream {
            method,
            url: url.into(),
            status: None,
            detail: error.to_string(),
        }
    }

    /// Fine-grained classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingToken => ErrorKind::MissingToken,
            Self::MalformedToken { .. } => ErrorKind::MalformedToken,
            Self::InvalidAlgorithm { .. } => ErrorKind::InvalidAlgorithm,
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::InvalidToken(_) => ErrorKind::InvalidToken,
            Self::TokenExpired => ErrorKind::TokenExpired,
            Self::InvalidClaims { .. } => ErrorKind::InvalidClaims,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::HeaderMissing => ErrorKind::HeaderMissing,
            Self::InvalidHeader(_) => ErrorKind::InvalidHeader,
            Self::KeyLoad(_) => ErrorKind::KeyLoad,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Signing(_) => ErrorKind::Signing,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) => ErrorKind::Json,
        }
    }

    /// Machine-readable wire code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::MissingToken
            | ErrorKind::MalformedToken
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::KeyNotFound
            | ErrorKind::InvalidToken => "invalid_token",
            ErrorKind::TokenExpired => "token_expired",
            ErrorKind::InvalidClaims => "invalid_claims",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::HeaderMissing => "authorization_header_missing",
            ErrorKind::InvalidHeader => "invalid_header",
            ErrorKind::KeyLoad => "key_load_error",
            ErrorKind::Upstream => "upstream_error",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::Signing | ErrorKind::Io | ErrorKind::Json => "internal_error",
        }
    }

    /// HTTP-equivalent status
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Forbidden => 403,
            ErrorKind::Upstream => 502,
            ErrorKind::InvalidConfig => 400,
            ErrorKind::KeyLoad | ErrorKind::Signing | ErrorKind::Io | ErrorKind::Json => 500,
            _ => 401,
        }
    }

    /// Human-readable description (the `Display` text)
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Whether this error rejects the caller's credentials (401/403)
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status_code(), 401 | 403)
    }
}
