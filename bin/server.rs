// Merchant Portal - Web Server
// REST API with Axum over the SQLite merchant store

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};

use merchant_portal::api::{router, AppState};
use merchant_portal::{
    open_database, telemetry, PortalConfig, RegistrationStatusWorkflow, SqliteActorResolver,
    SqliteMerchantStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = PortalConfig::load()?;
    telemetry::init_tracing(&config)?;

    let conn = open_database(&config.database_path)?;
    tracing::info!(path = %config.database_path.display(), "database opened");

    // Create shared state
    let conn = Arc::new(Mutex::new(conn));
    let state = AppState {
        workflow: Arc::new(RegistrationStatusWorkflow::new(Arc::new(
            SqliteMerchantStore::new(conn.clone()),
        ))),
        actors: Arc::new(SqliteActorResolver::new(conn)),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
