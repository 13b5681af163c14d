//! Background memory hygiene across every session.
//!
//! The governor runs on a coarse timer. Each sweep checks the aggregate
//! history footprint: over budget it forces eviction on every log that
//! still has room to shrink, otherwise it periodically compresses old
//! content. Sweeps are best-effort and never fail a session operation.

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::store::SessionStore;

/// Governor tuning. Defaults are production values.
#[derive(Debug, Clone, Builder)]
pub struct GovernorSettings {
    /// Time between sweeps.
    #[builder(default = Duration::from_secs(300))]
    pub sweep_period: Duration,
    /// A compression pass runs on every Nth sweep while under budget.
    /// Zero is treated as 1 (compress on every sweep).
    #[builder(default = 4)]
    pub compress_every: u64,
    /// Aggregate footprint above which eviction is forced.
    #[builder(default = 64 * 1024 * 1024)]
    pub aggregate_budget_bytes: usize,
    /// Forced eviction never shrinks a log below this many messages.
    #[builder(default = 30)]
    pub forced_eviction_floor: usize,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Periodic sweeper over a [`SessionStore`]'s histories.
#[derive(Debug)]
pub struct MemoryGovernor {
    settings: GovernorSettings,
    ticks: u64,
}

impl MemoryGovernor {
    pub fn new(settings: GovernorSettings) -> Self {
        Self { settings, ticks: 0 }
    }

    /// Run one sweep. Exposed so embedders without a background task can
    /// drive hygiene themselves.
    pub fn sweep(&mut self, store: &mut SessionStore) {
        self.ticks += 1;
        let bytes = store.estimated_bytes();
        if bytes > self.settings.aggregate_budget_bytes {
            warn!(
                bytes,
                budget = self.settings.aggregate_budget_bytes,
                "history over budget, forcing eviction"
            );
            let floor = self.settings.forced_eviction_floor;
            for session in store.sessions_mut() {
                session.context_log_mut().evict_to(floor);
                session.chat_log_mut().evict_to(floor);
            }
        } else if self.ticks % self.settings.compress_every.max(1) == 0 {
            debug!(tick = self.ticks, "periodic compression pass");
            for session in store.sessions_mut() {
                session.context_log_mut().compress_pass();
                session.chat_log_mut().compress_pass();
            }
        }
    }

    /// Move the governor onto a background task sweeping `store` forever.
    pub fn spawn(mut self, store: Arc<tokio::sync::Mutex<SessionStore>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.settings.sweep_period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut store = store.lock().await;
                self.sweep(&mut store);
            }
        })
    }
}
