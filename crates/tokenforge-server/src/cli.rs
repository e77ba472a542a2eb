//! Command-line interface
//!
//! Flags override values from the configuration file and `TOKENFORGE__*`
//! environment variables.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, ServerConfig};

/// tokenforge-server - minimal RS256 token issuer
///
/// Serves a JWKS, an OpenID discovery document and an unauthenticated
/// client-credentials token endpoint. Intended for development and tests.
#[derive(Parser, Debug, Default)]
#[command(name = "tokenforge-server", version, author, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "TOKENFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to bind (0 picks a free port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// PEM file holding the signing key; created when missing
    #[arg(long)]
    pub key_path: Option<PathBuf>,

    /// Modulus size for a newly generated key
    #[arg(long)]
    pub key_bits: Option<usize>,

    /// Enable verbose logging (-v, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Resolve the effective configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be loaded or the merged
    /// configuration is invalid.
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = ServerConfig::load(self.config.as_deref())?;

        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(key_path) = self.key_path {
            config.key.key_path = Some(key_path);
        }
        if let Some(key_bits) = self.key_bits {
            config.key.key_bits = key_bits;
        }
        config.logging = config.logging.with_verbosity(self.verbose);

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "tokenforge-server",
            "--bind",
            "0.0.0.0",
            "-p",
            "9000",
            "--key-path",
            "/var/lib/tokenforge/key.pem",
            "--key-bits",
            "2048",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.bind.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.key_bits, Some(2048));
        assert_eq!(cli.verbose, 2);

        let config = cli.into_config().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(
            config.key.key_path.as_deref(),
            Some(Path::new("/var/lib/tokenforge/key.pem"))
        );
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"port = 7000\ntoken_ttl_secs = 60\n").unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            port: Some(7001),
            ..Cli::default()
        };
        let config = cli.into_config().unwrap();
        assert_eq!(config.port, 7001);
        assert_eq!(config.token_ttl_secs, 60);
    }

    #[test]
    fn test_undersized_key_flag_rejected() {
        let cli = Cli {
            key_bits: Some(1024),
            ..Cli::default()
        };
        assert!(matches!(cli.into_config(), Err(ConfigError::Invalid(_))));
    }
}
