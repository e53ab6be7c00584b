//! StandX market maker - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// StandX single-instrument market maker
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path, YAML or TOML (can also be set via SXM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS provider must be installed before the feed connects
    sxm_feed::init_crypto();

    let args = Args::parse();

    // Config path: CLI arg > SXM_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("SXM_CONFIG").ok())
        .unwrap_or_else(|| "config.yaml".to_string());

    let config = sxm_bot::AppConfig::from_file(&config_path)?;

    sxm_telemetry::init_logging(&config.telemetry.log_level)?;

    info!("Starting sxm-bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_path = %config_path,
        symbol = %config.maker.symbol,
        chain = %config.wallet.chain,
        "Configuration loaded"
    );

    let app = sxm_bot::Application::new(config);
    app.run().await?;

    Ok(())
}
