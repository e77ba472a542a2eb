//! Issuer normalization shared by issuance, verification and the token client
//!
//! A bare domain (`auth.example.com`) and a fully qualified URL
//! (`https://auth.example.com/`) must name the same issuer everywhere, so every
//! component builds `iss` claims, expected issuers and request URLs through
//! [`sanitize_issuer`].

use crate::error::{AuthError, AuthResult};

const HTTPS: &str = "https://";
const HTTP: &str = "http://";

/// Normalize an issuer to `scheme://authority[/path]` without trailing slashes
///
/// - `https://` is prepended when no `http://`/`https://` scheme is present
/// - trailing slashes are stripped
/// - the result is idempotent: `sanitize(sanitize(x)) == sanitize(x)`
///
/// # Errors
///
/// Returns [`AuthError::InvalidConfig`] if the issuer is empty, whitespace or
/// consists of a scheme alone.
///
/// # Example
///
/// ```rust
/// use tokenforge_auth::sanitize_issuer;
///
/// assert_eq!(sanitize_issuer("example.com").unwrap(), "https://example.com");
/// assert_eq!(sanitize_issuer("https://example.com/").unwrap(), "https://example.com");
/// assert!(sanitize_issuer("").is_err());
/// ```
pub fn sanitize_issuer(issuer: &str) -> AuthResult<String> {
    let trimmed = issuer.trim();

    let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix(HTTPS) {
        (HTTPS, rest)
    } else if let Some(rest) = trimmed.strip_prefix(HTTP) {
        (HTTP, rest)
    } else {
        (HTTPS, trimmed)
    };

    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return Err(AuthError::invalid_config("missing issuer"));
    }

    Ok(format!("{scheme}{rest}"))
}

/// [`sanitize_issuer`] for optional input; `None` fails like an empty string
///
/// # Errors
///
/// Returns [`AuthError::InvalidConfig`] if the issuer is absent or empty.
pub fn sanitize_optional_issuer(issuer: Option<&str>) -> AuthResult<String> {
    sanitize_issuer(issuer.unwrap_or_default())
}
