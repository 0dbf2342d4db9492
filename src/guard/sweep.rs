//! Background eviction of idle per-source state.
//!
//! Each guard owns its tables; the sweeper only decides *when* a guard
//! cleans up. Removal happens inside `DashMap::retain`, under the same shard
//! lock live updates take, so a record refreshed concurrently is re-checked
//! before it can be evicted.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

/// A guard with periodic cleanup.
pub trait Sweep: Send + Sync + 'static {
    /// Label used in logs and metrics.
    const NAME: &'static str;

    /// Time between sweeps. Read before every sleep so reloads apply.
    fn sweep_interval(&self) -> Duration;

    /// Evict stale entries and return how many were removed.
    fn sweep(&self) -> usize;
}

/// Run `target.sweep()` every `target.sweep_interval()` until shutdown.
pub fn spawn_sweeper<S: Sweep>(target: Arc<S>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            guard = S::NAME,
            interval = ?target.sweep_interval(),
            "Sweeper starting"
        );

        loop {
            let interval = target.sweep_interval();
            tokio::select! {
                _ = time::sleep(interval) => {
                    let evicted = target.sweep();
                    tracing::debug!(guard = S::NAME, evicted, "Sweep complete");
                }
                _ = shutdown.recv() => {
                    tracing::info!(guard = S::NAME, "Sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}
