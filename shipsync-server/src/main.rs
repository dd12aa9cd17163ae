//! shipsync-server - headless shipment synchronization daemon.
//!
//! Runs the scheduled sync loop against the carrier gateway and exposes a
//! small HTTP surface: manual trigger, run status, and read access to the
//! mirrored shipments.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

use shipsync_core::config::AppConfig;
use shipsync_core::store::{MemoryStore, ShipmentStore, SqliteStore};
use shipsync_core::{HttpGateway, SyncEngine};

mod api;
mod router;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::from_env();

    let store: Arc<dyn ShipmentStore> = match &config.db_path {
        Some(path) => {
            tracing::info!("[Server] using SQLite mirror at {}", path.display());
            Arc::new(SqliteStore::open(path)?)
        },
        None => {
            tracing::warn!("[Server] no SHIPSYNC_DB_PATH set, mirror is in-memory");
            Arc::new(MemoryStore::new())
        },
    };

    let credentials_ok = config.gateway.has_credentials();
    if !credentials_ok {
        tracing::warn!("[Server] gateway credentials not configured, sync runs will be skipped");
    }

    let gateway = Arc::new(HttpGateway::new(config.gateway.clone())?);
    let engine = Arc::new(SyncEngine::new(gateway, store, config.sync.clone(), credentials_ok));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(engine.clone().run_loop(shutdown_rx));

    let app = router::build_router(AppState { engine });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[Server] listening on http://{addr}");
    tracing::info!("[Server] API available at http://localhost:{}/api/", config.port);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx)).await?;
    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("[Server] shutdown signal received");
    // The sync loop checks this between runs.
    let _ = shutdown_tx.send(true);
}
