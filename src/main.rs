// src/main.rs

use color_eyre::eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vanguard_rs_orchestrator::{api, app::AppState, logging, settings::Settings};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let env_file = dotenvy::dotenv().ok();
    logging::initialize_logging()?;

    if let Some(path) = env_file {
        info!(path = %path.display(), "Loaded .env file.");
    }

    let settings = Settings::from_env().wrap_err("failed to load configuration")?;
    let shutdown = CancellationToken::new();
    let state = AppState::new(&settings, shutdown.clone()).wrap_err("failed to build engine client")?;

    info!(
        engine = %state.client.base_url(),
        retry_attempts = settings.retry.attempts,
        poll_interval_ms = settings.poll.interval.as_millis() as u64,
        max_polls = settings.poll.max_polls,
        "Engine client ready."
    );

    let listener = TcpListener::bind(settings.bind_addr)
        .await
        .wrap_err_with(|| format!("failed to bind {}", settings.bind_addr))?;
    info!(addr = %settings.bind_addr, "Listening.");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .wrap_err("server error")?;

    info!("Server stopped.");
    Ok(())
}

/// Resolves on Ctrl-C and cancels every in-flight scan through `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C; shutting down.");
    }
    info!("Shutdown requested; cancelling in-flight scans.");
    shutdown.cancel();
}
