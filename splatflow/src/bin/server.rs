//! `splatflow-server`: HTTP front end for the splat pipeline.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;

use splatflow::config::ServiceConfig;
use splatflow::observability::init_tracing;
use splatflow::runner::ProcessRunner;
use splatflow::server::{build_router, build_store, shutdown_signal, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- Configuration (also loads .env) ---
    let config = ServiceConfig::from_env().context("failed to load configuration")?;

    // --- Tracing ---
    init_tracing(config.json_logs).context("failed to initialise tracing")?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        lessons_root = %config.lessons_root.display(),
        max_attempts = config.retry.max_attempts,
        cooldown_ms = config.retry.cooldown_ms,
        "Loaded server configuration"
    );

    tokio::fs::create_dir_all(&config.lessons_root)
        .await
        .with_context(|| format!("failed to create {}", config.lessons_root.display()))?;

    // --- Storage ---
    let store = build_store(&config.storage).context("failed to configure object storage")?;

    // --- App state and router ---
    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("invalid host address '{}'", config.host))?,
        config.port,
    );
    let state = AppState::new(config, Arc::new(ProcessRunner), store);
    let app = build_router(state).context("failed to build router")?;

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}
