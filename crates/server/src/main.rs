use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tryon_core::{load_config, validate_config, TryOnOrchestrator};
use tryon_server::api::{create_router, WsBroadcaster};
use tryon_server::state::AppState;

/// How long shutdown waits for cancelled runs to unwind.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("TRYON_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Try-on service: {}", config.api.base_url());
    info!(
        "Polling every {} ms, at most {} attempts",
        config.poller.interval_ms, config.poller.max_attempts
    );

    let orchestrator = Arc::new(
        TryOnOrchestrator::from_config(&config).context("Failed to create try-on client")?,
    );
    info!("Using try-on API: {}", orchestrator.api_name());

    let ws_broadcaster = WsBroadcaster::default();
    let state = Arc::new(AppState::new(config.clone(), orchestrator, ws_broadcaster));
    let jobs = state.jobs().clone();

    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let jobs_for_shutdown = jobs.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let cancelled = jobs_for_shutdown.cancel_all();
            info!("Shutdown requested, cancelled {} running job(s)", cancelled);
        })
        .await
        .context("Server error")?;

    if !jobs.wait_idle(DRAIN_TIMEOUT).await {
        warn!("Some try-on runs did not stop within {:?}", DRAIN_TIMEOUT);
    }
    info!("Server stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
