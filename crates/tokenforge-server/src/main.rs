//! tokenforge-server entry point

use anyhow::Context;
use clap::Parser;
use tokenforge_server::{Cli, IssuerServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.into_config().context("Failed to load configuration")?;

    config
        .logging
        .init()
        .context("Failed to initialize logging")?;

    IssuerServer::new(config)
        .await
        .context("Failed to start issuer")?
        .run()
        .await?;

    Ok(())
}
