//! Standalone mode: every collaborator is served from the local redb
//! store, and the admin API stands in for the fleet, cluster and stack
//! services.
//!
//! In this mode, the daemon:
//! 1. Opens the state store under the data directory
//! 2. Builds the standalone backends, the session broker and the scaler
//! 3. Runs the scaler on a background task
//! 4. Serves the REST API until Ctrl-C, then stops the scaler

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use arenagrid_autoscale::CapacityScaler;
use arenagrid_broker::SessionBroker;
use arenagrid_core::ArenaConfig;
use arenagrid_state::{LocalCluster, LocalFleet, LocalQueue, LocalStackOutputs, StateStore};

/// Run the daemon in standalone mode.
pub async fn run_standalone(config: ArenaConfig, port: u16, data_dir: PathBuf) -> anyhow::Result<()> {
    info!("ArenaGrid daemon starting in standalone mode");

    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("arenagrid.redb");

    // ── State store ────────────────────────────────────────────
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    // ── Collaborators ──────────────────────────────────────────
    let queue = Arc::new(LocalQueue::new(store.clone()));
    let fleet = Arc::new(LocalFleet::new(store.clone(), config.fleet.claim_timeout));
    let cluster = Arc::new(LocalCluster::new(store.clone(), config.cluster.page_size));
    let outputs = Arc::new(LocalStackOutputs::new(store.clone()));

    let broker = SessionBroker::new(queue, fleet, config.broker.clone());
    info!(group = %config.broker.game_server_group, "session broker initialized");

    let scaler = CapacityScaler::new(config.scaler.clone(), outputs, cluster.clone(), cluster);
    info!(
        cluster = %config.scaler.cluster,
        stack = %config.scaler.stack_name,
        "capacity scaler initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background tasks ───────────────────────────────────────
    let scaler_handle = tokio::spawn(async move {
        scaler.run(shutdown_rx).await;
    });

    // ── API server ─────────────────────────────────────────────
    let router = arenagrid_api::build_router(store, broker);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C, shutting down");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = scaler_handle.await;

    info!("ArenaGrid daemon stopped");
    Ok(())
}
