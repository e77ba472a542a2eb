//! `Authorization: Bearer <token>` header parsing

use crate::error::{AuthError, AuthResult};

/// Extract the token from an `Authorization` header value
///
/// The scheme is matched case-insensitively and the header must contain
/// exactly two whitespace-separated words.
///
/// # Errors
///
/// - [`AuthError::HeaderMissing`] if the header is absent or blank
/// - [`AuthError::InvalidHeader`] if the scheme is not `Bearer`, the token is
///   missing, or extra words follow the token
///
/// # Example
///
/// ```rust
/// use tokenforge_auth::extract_bearer_token;
///
/// assert_eq!(extract_bearer_token(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
/// assert!(extract_bearer_token(Some("Basic dXNlcjpwYXNz")).is_err());
/// ```
pub fn extract_bearer_token(header: Option<&str>) -> AuthResult<&str> {
    let mut parts = header.unwrap_or_default().split_whitespace();

    let Some(scheme) = parts.next() else {
        return Err(AuthError::HeaderMissing);
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::invalid_header(
            "Authorization header must start with Bearer",
        ));
    }

    match (parts.next(), parts.next()) {
        (None, _) => Err(AuthError::invalid_header("Token not found")),
        (Some(token), None) => Ok(token),
        (Some(_), Some(_)) => Err(AuthError::invalid_header(
            "Authorization header must be Bearer token",
        )),
    }
}
