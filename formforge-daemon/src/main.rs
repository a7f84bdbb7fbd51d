//! Formforge Daemon
//!
//! Background service that owns the credential store and exposes the sign-in,
//! form generation and settings API over a local socket.
//!
//! # Running
//!
//! ```bash
//! GOOGLE_CLIENT_ID=... GOOGLE_CLIENT_SECRET=... SECRET_KEY=... GEMINI_API_KEY=... \
//!     cargo run -p formforge-daemon
//! # or after install:
//! formforged
//! ```

use anyhow::{Context, Result};
use formforge_core::{AppContext, FileStore};
use formforge_daemon::{ApiState, DaemonConfig, load_config, spawn_session_reaper, start_server};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(&config.log_level);

    info!("Starting Formforge daemon...");
    info!("Loaded configuration from {:?}", config.config_path);

    run_daemon(config).await
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_daemon(config: DaemonConfig) -> Result<()> {
    let core_config = config.to_core_config()?;

    let store_path = config.store_path();
    let store = Arc::new(
        FileStore::open(&store_path)
            .with_context(|| format!("Failed to open store at {:?}", store_path))?,
    );
    info!("Using store at {:?}", store_path);

    let context = AppContext::google(&core_config, store.clone())
        .context("Failed to initialise application context")?;

    let reaper = spawn_session_reaper(
        store,
        Duration::from_secs(config.reaper_interval_secs.max(1)),
    );

    info!("Daemon starting on {:?}", config.socket_path);
    let state = ApiState::new(Arc::new(context));
    let server_handle = start_server(&config.socket_path, state).await?;

    info!("Daemon running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping server...");

    reaper.abort();
    server_handle.stop().await?;

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
        info!("Socket file removed");
    }

    info!("Daemon stopped");
    Ok(())
}
