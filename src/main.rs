//! Netpulse Binary Entry Point
//!
//! This binary runs the complete netpulse connectivity monitor.
//! Core functionality is provided by the `netpulse` library crate.

use std::sync::Arc;

use clap::Parser;
use netpulse::{
    buffer::{BufferStore, FileBuffer},
    config::MonitorConfig,
    probe::NetProber,
    reconciler::Reconciler,
    sampler::Sampler,
    sink::SheetsSink,
};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Netpulse - Internet Connectivity Monitor
#[derive(Parser, Debug)]
#[command(name = "netpulse", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "netpulse.yaml", env = "NETPULSE_CONFIG")]
    config: String,

    /// Location identifier (overrides config file)
    #[arg(long, env = "NETPULSE_LOCATION_ID")]
    location_id: Option<String>,

    /// Check interval, e.g. "30s" or "2m" (overrides config file)
    #[arg(long, env = "NETPULSE_CHECK_INTERVAL", value_parser = humantime::parse_duration)]
    check_interval: Option<std::time::Duration>,

    /// Journal file path (overrides config file)
    #[arg(long, env = "NETPULSE_BUFFER_PATH")]
    buffer_path: Option<std::path::PathBuf>,

    /// Target spreadsheet id (overrides config file)
    #[arg(long, env = "NETPULSE_SPREADSHEET_ID")]
    spreadsheet_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,netpulse=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Netpulse - Internet Connectivity Monitor");

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file
    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = MonitorConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(location_id) = cli.location_id {
        config.location_id = location_id;
    }
    if let Some(interval) = cli.check_interval {
        config.check_interval = interval;
    }
    if let Some(path) = cli.buffer_path {
        config.buffer.path = path;
    }
    if let Some(id) = cli.spreadsheet_id {
        config.sink.spreadsheet_id = id;
    }
    config.validate()?;

    tracing::info!(
        location = %config.location_id,
        interval = ?config.check_interval,
        quorum = %config.quorum,
        "Monitor configured"
    );

    // Open the durable buffer
    tracing::info!("Opening journal at: {}", config.buffer.path.display());
    let buffer: Arc<dyn BufferStore> = match config.buffer.max_delivered_records {
        Some(cap) => Arc::new(FileBuffer::open_with_threshold(&config.buffer.path, cap)?),
        None => Arc::new(FileBuffer::open(&config.buffer.path)?),
    };
    tracing::info!(pending = buffer.pending(), "Journal ready");

    // Build the probe set
    let prober = NetProber::new(config.probes.clone())?;

    // Build the remote sink
    let token = config.sink.resolve_token()?;
    let mut sink = SheetsSink::new(&config.sink.spreadsheet_id, token)?;
    if let Some(endpoint) = &config.sink.endpoint {
        sink = sink.with_endpoint(endpoint.clone());
    }

    let sampler = Sampler::new(
        config.location_id.clone(),
        config.quorum,
        prober,
        buffer.clone(),
    );
    let reconciler = Reconciler::new(
        buffer,
        Arc::new(sink),
        config.reconciler.interval,
        config.reconciler.backoff_cap,
    );

    // Spawn the two pipeline tasks with a shared stop signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sampler_task = tokio::spawn(sampler.run(config.check_interval, shutdown_rx.clone()));
    let reconciler_task = tokio::spawn(reconciler.run(shutdown_rx));

    tracing::info!("Press Ctrl+C to shutdown");

    tokio::select! {
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(true);
            sampler_task.await??;
            reconciler_task.await?;
        }
        result = &mut sampler_task => {
            // The sampler only returns early on a durability failure;
            // stop the reconciler and surface the error.
            let _ = shutdown_tx.send(true);
            reconciler_task.await?;
            result??;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
