//! Server process: ledger, snapshot job and phase schedule behind the read API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use arena_infra::config::AppConfig;
use arena_infra::ledger;
use arena_infra::schedule::{EventController, PhaseScheduler, SystemClock};
use arena_infra::snapshot::{ScoreSnapshotJob, SnapshotStore};

/// Wire everything from `config` and serve until Ctrl-C.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let ledger = ledger::connect(config.ledger_command.as_deref());
    let store = SnapshotStore::new(config.leaderboard_path.clone());
    let snapshots = Arc::new(ScoreSnapshotJob::new(
        ledger.clone(),
        store.clone(),
        config.score_refresh,
    ));
    let controller = Arc::new(EventController::new(ledger, snapshots.clone()));

    let schedule = PhaseScheduler::new(Arc::new(SystemClock))
        .arm(config.window, controller.clone())
        .await;
    info!(plan = ?schedule.plan(), "event schedule armed");

    let app = crate::app::build_app(store);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    schedule.cancel();
    snapshots.stop().await;
    info!(phase = %controller.phase().await, "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
