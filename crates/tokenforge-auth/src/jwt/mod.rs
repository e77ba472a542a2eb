//! JWT issuance, publication and verification
//!
//! ```text
//!  KeyStore ──► TokenIssuer ──► compact RS256 JWT
//!     │
//!     └──► JwksSource ──► CachedJwksSource ──► TokenVerifier
//!            ▲
//!   HttpJwksSource (remote issuers)
//! ```

pub mod issuer;
pub mod jwks;
pub mod token;
pub mod verifier;

pub use issuer::{TokenIssuer, TokenRequest};
pub use jwks::{CachedJwksSource, HttpJwksSource, JWKS_PATH, Jwk, JwkSet, JwksSource};
pub use token::{DecodedToken, RS256, TokenHeader, decode_header};
pub use verifier::TokenVerifier;
