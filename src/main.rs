//! flood-guard server.
//!
//! ```text
//!   client ──TCP──▶ listener ──▶ ConnectionGuard ──▶ read request ──▶ RequestGuard ──▶ 200 OK
//!                      │              │                                     │
//!                      │           blacklist                            botnet /
//!                      │          (30 min)                               flood
//!                      ▼
//!              release on close
//! ```

use clap::Parser;
use std::path::PathBuf;

use flood_guard::config::{load_config, GuardConfig};
use flood_guard::lifecycle::{self, signals::shutdown_signal, Shutdown};
use flood_guard::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "flood-guard")]
#[command(about = "Inline connection and request flood protection", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Watched for threshold changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    let _log_guard = init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "flood-guard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        max_connections_per_source = config.connection_guard.max_connections_per_source,
        http_flood_threshold = config.request_guard.http_flood_threshold,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.trigger();
    });

    lifecycle::run(config, cli.config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
