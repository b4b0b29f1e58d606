//! Periodic eviction of expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::QueryCache;

/// Starts the sweeper task.
///
/// The first sweep happens one `interval` after the call. The task exits
/// once `shutdown` is cancelled; await the returned handle to join it.
pub fn spawn_sweeper(
    cache: Arc<QueryCache>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Cache sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = cache.sweep(Instant::now());
                    if removed > 0 {
                        info!("Swept {} expired cache entries", removed);
                    } else {
                        debug!("Cache sweep found nothing to evict");
                    }
                }
            }
        }
    })
}
