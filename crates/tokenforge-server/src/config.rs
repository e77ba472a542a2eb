//! Server configuration
//!
//! Configuration is assembled from an optional file (TOML, YAML or JSON)
//! overlaid with `TOKENFORGE__*` environment variables, using `__` as the
//! nesting separator (e.g. `TOKENFORGE__KEY__KEY_PATH=/var/lib/tokenforge/key.pem`).
//! Every field has a default, so an empty configuration is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokenforge_auth::{KeyStoreConfig, MIN_KEY_BITS};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "TOKENFORGE";

/// Issuer service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (IP address or hostname)
    pub bind_address: String,
    /// Port to bind; `0` picks a free port
    pub port: u16,
    /// Signing key configuration
    pub key: KeyStoreConfig,
    /// Lifetime of issued tokens in seconds
    pub token_ttl_secs: u64,
    /// `sub` for token requests that carry no `client_id`
    pub default_subject: String,
    /// `aud` for token requests that carry no `audience`
    pub default_audience: String,
    /// `scope` for token requests that carry no `scope`
    pub default_scope: String,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            key: KeyStoreConfig::default(),
            token_ttl_secs: 3600,
            default_subject: "tokenforge@clients".to_string(),
            default_audience: "tokenforge".to_string(),
            default_scope: String::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub structured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Semantically invalid value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// # Errors
    ///
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The file format is auto-detected from the file extension. Environment
    /// variables with the `TOKENFORGE__` prefix override file settings.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tokenforge_server::ServerConfig;
    ///
    /// let config = ServerConfig::from_file("tokenforge.toml").expect("Failed to load config");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load(Some(path.as_ref()))
    }

    /// Load from an optional file plus environment overrides
    ///
    /// # Errors
    ///
    /// As [`from_file`](Self::from_file).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        use config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }

            let format = match path.extension().and_then(|s| s.to_str()) {
                Some("toml") => FileFormat::Toml,
                Some("yaml" | "yml") => FileFormat::Yaml,
                Some("json") => FileFormat::Json,
                _ => return Err(ConfigError::UnsupportedFormat),
            };

            builder = builder.add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ));
        }

        let config: Self = builder
            // Environment variables override file settings
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot express
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero token lifetime, an
    /// undersized key or an empty bind address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "token_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.key.key_bits < MIN_KEY_BITS {
            return Err(ConfigError::Invalid(format!(
                "key.key_bits must be at least {MIN_KEY_BITS}"
            )));
        }
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("bind_address is empty".to_string()));
        }
        Ok(())
    }
}
