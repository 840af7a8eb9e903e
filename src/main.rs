//! Upload gate server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ gate.admit ──▶ form parse ──▶ gate.inspect ──▶ convert
//!                          │              │                              │
//!                          │        blacklist, abuse,              policy, signatures
//!                          │          token bucket
//!     Client Response      ▼
//!     ◀────────────── JSON body + security headers + rate limit headers
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;

use upload_gate::config::{load_config, GateConfig};
use upload_gate::lifecycle::{shutdown_signal, spawn_sweeper, Shutdown};
use upload_gate::observability::{logging, metrics};
use upload_gate::HttpServer;

/// Sweep interval when eviction is on but no interval is configured.
const DEFAULT_SWEEP_SECS: u64 = 60;

#[derive(Parser)]
#[command(name = "upload-gate")]
#[command(about = "File upload gate with rate limiting and content validation", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    logging::init_logging(&config.observability);

    tracing::info!("upload-gate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        compress_limit = config.rate_limit.compress_limit,
        compress_window_ms = config.rate_limit.compress_window_ms,
        eviction = config.eviction.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);

    let sweeper = if server.config().eviction.enabled {
        let every = Duration::from_secs(
            server
                .config()
                .eviction
                .sweep_interval_secs
                .unwrap_or(DEFAULT_SWEEP_SECS),
        );
        Some(spawn_sweeper(server.gate(), every, shutdown.subscribe()))
    } else {
        None
    };

    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    tracing::info!("Shutting down");
    shutdown.trigger();

    server_task.await??;
    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
