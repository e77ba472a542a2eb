//! # tokenforge-server
//!
//! Minimal RS256 issuer service built on [`tokenforge_auth`]: it publishes the
//! signing key's JWKS and an OpenID discovery document, and issues
//! client-credentials tokens without authenticating the caller. Meant as a
//! stand-in identity provider for development and integration tests.
//!
//! ```rust,no_run
//! use tokenforge_server::{IssuerServer, ServerConfig};
//!
//! # async fn example() -> Result<(), tokenforge_server::ServerError> {
//! let config = ServerConfig {
//!     port: 0,
//!     ..ServerConfig::default()
//! };
//! let server = IssuerServer::new(config).await?.bind().await?;
//! println!("issuer at {}", server.base_url());
//! server.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod router;
pub mod server;

pub use cli::Cli;
pub use config::{ConfigError, LoggingConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use router::{AppState, TokenEndpointRequest, TokenEndpointResponse, router};
pub use server::{IssuerServer, RunningServer};
