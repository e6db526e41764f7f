//! Background maintenance tasks.

use crate::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Runs one sweep pass: evicts sessions idle past the TTL along with any
/// turn results still parked for them. Returns the number of evictions.
pub fn sweep_once(state: &AppState, ttl: Duration) -> usize {
    let evicted = state.sessions.sweep(ttl);
    for call_sid in &evicted {
        if state.registry.remove(call_sid) {
            tracing::debug!(call_sid, "dropped stale turn result");
        }
    }
    if !evicted.is_empty() {
        tracing::info!(count = evicted.len(), "swept idle call sessions");
    }
    evicted.len()
}

/// Spawns the periodic session sweeper.
pub fn start_sweep_task(state: Arc<AppState>, interval: Duration, ttl: Duration) {
    tokio::spawn(async move {
        tracing::info!(
            interval_secs = interval.as_secs(),
            ttl_secs = ttl.as_secs(),
            "session sweeper started"
        );
        loop {
            tokio::time::sleep(interval).await;
            sweep_once(&state, ttl);
        }
    });
}
