//! Card Registry Collector — entry point.
//!
//! Accepts registry notifications on `POST /notifications`, persists them to
//! SQLite and exposes the collected history over a small Axum REST API.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use collector::api::{self, ApiState};
use collector::config::Config;
use collector::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    let app = api::router(Arc::new(ApiState { pool }));

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("Collector listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Collector stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}
