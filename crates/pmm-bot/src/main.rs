//! PMM perpetual-futures market maker - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Perpetual-futures market-making bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PMM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    pmm_telemetry::init_logging()?;

    info!("Starting pmm-bot v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > PMM_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("PMM_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = pmm_bot::AppConfig::load(&config_path)?;
    info!(mode = ?config.mode, symbol = %config.symbol, "Configuration loaded");

    let app = pmm_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
