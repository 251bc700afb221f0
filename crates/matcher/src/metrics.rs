//! Optional metrics hook for matching runs.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use raster::Tier;

use crate::types::MatchResult;

/// Receives per-glyph outcomes, escalations and catalog sizes.
pub trait MatchMetrics: Send + Sync {
    /// Called once per glyph with its final result.
    fn record_glyph(&self, latency: Duration, result: &MatchResult);

    /// Called each time a glyph moves up the tier ladder.
    fn record_escalation(&self, from: Tier, to: Tier);

    /// Called once per catalog tier when a matcher is created.
    fn record_catalog_tier(&self, tier: Tier, entries: usize);
}

/// Install or clear the global match metrics recorder.
pub fn set_match_metrics(recorder: Option<Arc<dyn MatchMetrics>>) {
    let lock = metrics_lock();
    let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn MatchMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn MatchMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn MatchMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}
