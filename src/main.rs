use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use koop_api_rust::app::{router, AppState, Backends};
use koop_api_rust::config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, secrets, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config().clone();
    info!("Starting Koop API in {:?} mode", config.environment);
    if config.is_production() && !config.security.secure_cookies {
        warn!("Refresh cookies are not marked Secure in production");
    }

    let port = config.server.port;
    let backends = Backends::connect(&config).await?;
    let state = AppState::build(config, backends)?;
    let database = state.database.clone();
    let app = router(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Koop API listening on http://{}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(database) = database {
        database.close().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
