//! Expiry Sweep Task
//!
//! Lookups already evict expired entries lazily; this task bounds storage
//! growth from entries that are never looked up again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;

/// Spawns a background task that periodically evicts expired cache entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps. A failed sweep is logged and retried on the next tick.
///
/// # Arguments
/// * `cache` - Engine whose store is swept
/// * `sweep_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let sweep_handle = spawn_sweep_task(cache.clone(), 60);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: ResponseCache, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            // A full namespace scan is unbounded, unlike request-path point lookups
            let sweeper = cache.clone();
            match tokio::task::spawn_blocking(move || sweeper.evict_expired()).await {
                Ok(Ok(0)) => debug!("Expiry sweep: no expired entries found"),
                Ok(Ok(removed)) => info!("Expiry sweep: removed {} expired entries", removed),
                Ok(Err(err)) => warn!(error = %err, "Expiry sweep failed"),
                Err(err) => warn!(error = %err, "Expiry sweep task panicked"),
            }
        }
    })
}
