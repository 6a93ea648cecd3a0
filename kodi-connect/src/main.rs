use anyhow::{Context, Result};
use clap::Parser;
use kodi_connect::{init_logging, Args, KodiConnect, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.log_mode, args.log_level.as_deref())
        .context("Failed to initialize logging")?;

    let settings = Settings::try_from(args).context("Invalid configuration")?;
    let app = KodiConnect::start(settings)
        .await
        .context("Failed to start kodi-connect")?;

    info!(url = %app.ws_url(), "Waiting for Kodi devices");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Received Ctrl+C, shutting down");
    app.shutdown().await;
    Ok(())
}
