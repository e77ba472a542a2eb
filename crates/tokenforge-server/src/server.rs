//! Issuer service lifecycle
//!
//! [`IssuerServer`] owns the signing key and configuration; [`IssuerServer::bind`]
//! starts serving in a background task and hands back a [`RunningServer`].

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokenforge_auth::{KeyStore, TokenIssuer, TokenRequest};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::{AppState, router};

/// Minimal RS256 issuer service
#[derive(Debug)]
pub struct IssuerServer {
    config: ServerConfig,
    issuer: TokenIssuer,
}

impl IssuerServer {
    /// Validate `config` and load or generate its signing key
    ///
    /// Key generation runs on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] for invalid configuration,
    /// [`ServerError::Auth`] if the key cannot be loaded or persisted and
    /// [`ServerError::Task`] if the key task panicked.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;

        let key_config = config.key.clone();
        let keys = tokio::task::spawn_blocking(move || KeyStore::load_or_generate(&key_config))
            .await
            .map_err(|e| ServerError::Task(e.to_string()))??;

        Ok(Self::with_issuer(config, TokenIssuer::new(Arc::new(keys))))
    }

    /// Server around an existing issuer
    pub fn with_issuer(config: ServerConfig, issuer: TokenIssuer) -> Self {
        Self { config, issuer }
    }

    /// The token issuer
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// The configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listener and start serving in a background task
    ///
    /// Port `0` binds a free port; see [`RunningServer::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the address cannot be bound.
    pub async fn bind(self) -> ServerResult<RunningServer> {
        let listener =
            TcpListener::bind((self.config.bind_address.as_str(), self.config.port)).await?;
        let local_addr = listener.local_addr()?;

        self.self_check();
        let kid = self.issuer.kid().to_string();
        let app = router(AppState::new(
            self.issuer,
            &self.config,
            local_addr.to_string(),
        ));

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    // A dropped sender also stops the server
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                })
                .await
        });

        info!(address = %local_addr, kid = %kid, "Issuer listening");

        Ok(RunningServer {
            local_addr,
            shutdown,
            handle,
        })
    }

    /// Serve until Ctrl+C, then shut down gracefully
    ///
    /// # Errors
    ///
    /// As [`bind`](Self::bind), plus any failure of the serve task.
    pub async fn run(self) -> ServerResult<()> {
        let server = self.bind().await?;

        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal, stopping issuer");
                server.shutdown().await
            }
            Err(e) => {
                warn!(error = %e, "Unable to listen for shutdown signal");
                server.wait().await
            }
        }
    }

    fn self_check(&self) {
        let request = TokenRequest::new(
            "http://localhost",
            "self-check@clients",
            &self.config.default_audience,
            Duration::from_secs(60),
        );
        let verified = self
            .issuer
            .create_token(&request)
            .and_then(|token| self.issuer.verify_signature(&token));

        match verified {
            Ok(true) => info!(
                kid = %self.issuer.kid(),
                bits = self.issuer.key_store().bits(),
                "Signing key self-check passed"
            ),
            Ok(false) => warn!(kid = %self.issuer.kid(), "Signing key self-check failed"),
            Err(e) => warn!(error = %e, "Signing key self-check failed"),
        }
    }
}

/// Handle to a serving issuer
///
/// Dropping the handle stops the server.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<io::Result<()>>,
}

impl RunningServer {
    /// Bound socket address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `http://<local_addr>`, usable as the issuer URL by clients
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Stop accepting connections and wait for in-flight requests
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if serving failed and
    /// [`ServerError::Task`] if the serve task panicked.
    pub async fn shutdown(self) -> ServerResult<()> {
        let _ = self.shutdown.send(true);
        self.wait().await
    }

    /// Wait for the serve task to finish
    ///
    /// # Errors
    ///
    /// As [`shutdown`](Self::shutdown).
    pub async fn wait(self) -> ServerResult<()> {
        self.handle
            .await
            .map_err(|e| ServerError::Task(e.to_string()))?
            .map_err(ServerError::from)
    }
}
