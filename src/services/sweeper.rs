use std::time::Duration;

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::services::sessions::SessionManager;

/// Spawns the recurring expiration sweep.
///
/// The first sweep runs immediately, then once per `every`. Cancellation is
/// only checked between sweeps, so a sweep already running finishes before
/// the task exits. A failed sweep is logged and retried on the next tick.
pub fn spawn_sweeper(
    manager: SessionManager,
    every: Duration,
    timeout: chrono::Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("🛑 Session sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {}
            }

            tracing::info!("🧹 Running scheduled cleanup of expired sessions...");
            match manager.sweep_expired(timeout).await {
                Ok(removed) => {
                    tracing::info!("✅ Session cleanup completed: {} removed", removed);
                }
                Err(e) => {
                    tracing::error!("❌ Session cleanup failed: {}", e);
                }
            }
        }
    })
}
