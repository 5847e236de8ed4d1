use std::path::Path;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use poolgrid_balance::Supervisor;

use crate::scenario::Scenario;

pub async fn run(path: &Path, interval_ms: u64) -> anyhow::Result<()> {
    let scenario = Scenario::from_file(path)?;
    let sim = scenario.build()?;
    let supervisor = sim.supervisor.clone();
    let mut balancer = sim.balancer;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        balancer
            .run(Duration::from_millis(interval_ms), shutdown_rx)
            .await;
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    handle.await?;

    for (queue, processes) in supervisor.counts() {
        info!(%queue, processes, "final pool size");
    }
    info!(total = supervisor.total_process_count(), "balancer stopped");
    Ok(())
}
