//! Lifecycle monitor: periodic stale eviction and idle shutdown.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use tmux_stat_core::{Lifecycle, PaneRegistry};

/// Sweep every `sweep_interval` until `shutdown` is cancelled. On idle
/// timeout, cancels `shutdown` itself and returns.
pub async fn run_monitor<C>(
    registry: Arc<PaneRegistry>,
    lifecycle: Lifecycle,
    shutdown: CancellationToken,
    clock: C,
) where
    C: Fn() -> DateTime<Utc> + Send,
{
    let mut ticker = interval(lifecycle.config().sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let outcome = lifecycle.sweep(&registry, clock());
        if outcome.evicted > 0 {
            tracing::info!(evicted = outcome.evicted, remaining = registry.count(), "evicted stale mappings");
        }
        if outcome.idle {
            tracing::info!(
                idle_timeout_secs = lifecycle.config().idle_timeout.as_secs(),
                "idle timeout reached, shutting down"
            );
            shutdown.cancel();
            return;
        }
    }
}
