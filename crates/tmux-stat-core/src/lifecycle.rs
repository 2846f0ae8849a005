//! Lifecycle decisions: stale-binding eviction and idle shutdown.
//!
//! The periodic driver lives in the runtime binary; this module only decides
//! what one sweep does so the policy can be tested without a clock.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::registry::PaneRegistry;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub sweep_interval: Duration,
    /// Shut down after this long without activity.
    pub idle_timeout: Duration,
    /// Evict bindings older than this, adopted or not.
    pub stale_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            stale_timeout: DEFAULT_STALE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Bindings removed by this sweep.
    pub evicted: usize,
    /// No activity for longer than the idle timeout: request shutdown.
    pub idle: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Lifecycle {
    config: LifecycleConfig,
}

impl Lifecycle {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// One housekeeping pass. Does not count as activity.
    pub fn sweep(&self, registry: &PaneRegistry, now: DateTime<Utc>) -> SweepOutcome {
        let evicted = registry.evict_stale(now, to_chrono(self.config.stale_timeout));
        let idle = registry.idle_for(now) > to_chrono(self.config.idle_timeout);
        SweepOutcome { evicted, idle }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}
