//! Per-call session metadata and TTL eviction.

use crate::lock_recover;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Ephemeral metadata for one active call.
#[derive(Debug, Clone)]
pub struct CallSession {
    /// Number of caller utterances processed so far. Monotonic.
    pub turn_count: u64,
    /// Updated on every inbound event for this call.
    pub last_activity: Instant,
}

impl CallSession {
    fn new() -> Self {
        Self {
            turn_count: 0,
            last_activity: Instant::now(),
        }
    }
}

/// Concurrency-safe map of active call sessions, keyed by call SID.
///
/// All lock acquisitions are brief HashMap operations that never span
/// `.await` points, so a synchronous mutex is safe here.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, CallSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session for a newly started call.
    ///
    /// Safe against provider retries of the call-start webhook: if the
    /// session already exists it is only touched, never reset.
    pub fn create(&self, call_sid: &str) {
        let mut map = lock_recover(&self.inner, "sessions");
        map.entry(call_sid.to_string())
            .and_modify(|s| s.last_activity = Instant::now())
            .or_insert_with(CallSession::new);
    }

    /// Updates the last-activity timestamp. Returns false if no session
    /// exists for this call.
    pub fn touch(&self, call_sid: &str) -> bool {
        let mut map = lock_recover(&self.inner, "sessions");
        match map.get_mut(call_sid) {
            Some(session) => {
                session.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Increments the turn counter for a new caller utterance and refreshes
    /// activity. Returns the new count, or `None` if no session exists.
    pub fn begin_turn(&self, call_sid: &str) -> Option<u64> {
        let mut map = lock_recover(&self.inner, "sessions");
        let session = map.get_mut(call_sid)?;
        session.turn_count += 1;
        session.last_activity = Instant::now();
        Some(session.turn_count)
    }

    /// Returns a snapshot of the session, if one exists.
    pub fn get(&self, call_sid: &str) -> Option<CallSession> {
        lock_recover(&self.inner, "sessions").get(call_sid).cloned()
    }

    /// Removes the session. Returns whether one existed.
    pub fn remove(&self, call_sid: &str) -> bool {
        lock_recover(&self.inner, "sessions")
            .remove(call_sid)
            .is_some()
    }

    /// Removes every session idle longer than `ttl` and returns the evicted
    /// call SIDs so the caller can clean up associated registry entries.
    pub fn sweep(&self, ttl: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut map = lock_recover(&self.inner, "sessions");
        let stale: Vec<String> = map
            .iter()
            .filter(|(_, s)| now.duration_since(s.last_activity) > ttl)
            .map(|(sid, _)| sid.clone())
            .collect();
        for sid in &stale {
            map.remove(sid);
        }
        stale
    }

    pub fn len(&self) -> usize {
        lock_recover(&self.inner, "sessions").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
