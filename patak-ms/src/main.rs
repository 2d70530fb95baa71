//! Patak metering service (patak-ms) - Main entry point
//!
//! Serves reading ingestion, live dashboards, billing history and payment
//! intake over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use patak_common::config::{load_config, resolve_root_folder, ROOT_FOLDER_ENV};
use patak_ms::storage::SqliteStorage;
use patak_ms::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for patak-ms
///
/// Anything given here overrides the config file.
#[derive(Parser, Debug)]
#[command(name = "patak-ms")]
#[command(about = "Water metering service for Patak")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PATAK_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "PATAK_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Root folder holding the database (also read from PATAK_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Explicit config file path
    #[arg(short, long, env = "PATAK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level for patak crates (RUST_LOG takes precedence)
    #[arg(long, env = "PATAK_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before the real subscriber exists; surface its messages anyway
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .finish();
    let mut config =
        tracing::subscriber::with_default(bootstrap, || load_config(args.config.as_deref()));

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind_addr) = args.bind_addr.clone() {
        config.bind_addr = bind_addr;
    }
    if let Some(level) = args.log_level.clone() {
        config.log_level = level;
    }

    let level = config.log_level.clone();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("patak_ms={level},patak_common={level},tower_http=info").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Patak metering service (patak-ms) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    info!("Root folder: {}", root_folder.display());

    let db_path = config.database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let storage = SqliteStorage::open(&db_path)
        .await
        .context("Failed to open database")?;

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let state = AppState::load(Arc::new(storage), config)
        .await
        .context("Failed to load persisted state")?;

    let sweeper = state.broadcaster.spawn_sweeper();
    let broadcaster = Arc::clone(&state.broadcaster);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("patak-ms listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Live streams never end on their own
            broadcaster.disconnect_all();
        })
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
