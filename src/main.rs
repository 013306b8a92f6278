use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use agentic_rag::core::config::{validate_settings, AppPaths, ConfigService};
use agentic_rag::core::logging;
use agentic_rag::server;
use agentic_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    let config = ConfigService::new(paths.clone());
    let settings = Arc::new(config.load_settings().context("Failed to load configuration")?);
    logging::init(&settings.logging, &paths);

    tracing::info!("Starting Agentic RAG API v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Project root: {}", paths.project_root.display());
    match config.load_config() {
        Ok(raw) => tracing::debug!("Effective configuration: {}", config.redact_sensitive_values(&raw)),
        Err(err) => tracing::warn!("Could not reload configuration for display: {}", err),
    }
    for warning in validate_settings(&settings, &paths).context("Failed to validate configuration")? {
        tracing::warn!("Configuration: {}", warning);
    }

    let state = AppState::initialize(paths, settings.clone())
        .await
        .context("Failed to initialize application state")?;
    if state.agent.is_none() {
        tracing::warn!("Agent unavailable; /chat and /chat-stream will answer 503");
    }

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on http://{}", addr);

    let app = server::router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Agentic RAG API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
