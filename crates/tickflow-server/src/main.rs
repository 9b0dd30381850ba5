//! tickflow service entry point.
//!
//! Ingests venue trade ticks, aggregates them into one-minute summaries,
//! persists each summary, and fans summaries out to WebSocket subscribers.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Real-time tick aggregation and broadcast service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TICKFLOW_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    tickflow_feed::init_crypto();

    let args = Args::parse();

    tickflow_telemetry::init_logging()?;

    info!("Starting tickflow v{}", env!("CARGO_PKG_VERSION"));

    // Config resolution: explicit CLI path must exist; otherwise fall back
    // to TICKFLOW_CONFIG / the default path, tolerating absence.
    let config = match args.config {
        Some(path) => {
            info!(config_path = %path, "Loading configuration");
            tickflow_server::AppConfig::from_file(&path)?
        }
        None => tickflow_server::AppConfig::load()?,
    };
    info!(symbol = %config.symbol, port = config.server.port, "Configuration loaded");

    let app = tickflow_server::Application::new(config)?;
    app.run().await?;

    Ok(())
}
