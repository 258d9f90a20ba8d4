//! plsync Daemon - background playlist synchronization
//!
//! This binary runs as a long-lived service and handles:
//! - Bidirectional sync of configured `playlist.xml` pairs
//! - Library-scan aware writes against a Jellyfin server
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon loads the configuration, wires the Jellyfin catalog and the
//! XML document store into a `SyncService`, then runs its poll loop until a
//! `CancellationToken` is triggered by a shutdown signal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use plsync_core::{config::Config, ports::clock::SystemClock};
use plsync_jellyfin::{client::JellyfinClient, provider::JellyfinCatalog};
use plsync_sync::{document::XmlPlaylistStore, service::SyncService};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod logging;

#[derive(Debug, Parser)]
#[command(name = "plsyncd", version, about = "Bidirectional Jellyfin playlist synchronizer")]
struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/plsync/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level, overriding `logging.level` (RUST_LOG still wins)
    #[arg(long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,
}

// ============================================================================
// Service wiring
// ============================================================================

/// Builds the adapters and runs the poll loop until `shutdown` fires
///
/// # Errors
/// Fails if the HTTP client cannot be built or the service cannot start,
/// e.g. the server has no music library.
async fn run(config: &Config, shutdown: CancellationToken) -> Result<()> {
    let client = JellyfinClient::new(
        &config.catalog.url,
        &config.catalog.api_key,
        config.catalog.request_timeout(),
    )?;
    info!(url = %client.base_url(), "Using Jellyfin server");

    let catalog = Arc::new(
        JellyfinCatalog::new(client)
            .with_playlist_lookup_limit(config.catalog.playlist_lookup_limit),
    );
    let documents = Arc::new(XmlPlaylistStore::new());

    let mut service = SyncService::start(config, catalog, documents, Arc::new(SystemClock))
        .await
        .context("Failed to start sync service")?;

    service.run(config.sync.poll_interval(), shutdown).await;
    Ok(())
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
///
/// A handler that cannot be installed is logged and never fires; the other
/// one still works.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("plsyncd: cannot load {}: {e:#}", config_path.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logging, cli.log_level.as_deref()) {
        eprintln!("plsyncd: {e:#}");
        return ExitCode::FAILURE;
    }

    info!(
        config_path = %config_path.display(),
        pairs = config.sync.pairs.len(),
        "plsync daemon starting (plsyncd)"
    );

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    match run(&config, shutdown_token).await {
        Ok(()) => {
            info!("plsync daemon shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "plsync daemon exiting with error");
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
