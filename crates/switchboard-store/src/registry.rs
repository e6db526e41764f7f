//! The pending-result registry: a tri-state result cell per call SID.
//!
//! Absent = no turn in flight. `InFlight` = the pipeline is working.
//! `Ready` = the reply is waiting for the next poll. The cell is the only
//! channel between a detached pipeline task and the stateless webhook
//! handlers that poll on the provider's behalf.

use crate::lock_recover;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A resolved conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    /// The text to speak to the caller.
    pub text: String,
    /// Whether this reply ends the call (goodbye variant).
    pub terminal: bool,
}

impl TurnReply {
    pub fn line(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            terminal: false,
        }
    }

    pub fn farewell(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            terminal: true,
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    InFlight,
    Ready(TurnReply),
}

/// Concurrency-safe registry of pending turn results, keyed by call SID.
#[derive(Debug, Clone, Default)]
pub struct ResultRegistry {
    inner: Arc<Mutex<HashMap<String, Slot>>>,
}

impl ResultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for a new turn. Returns false if a turn is already
    /// in flight or unconsumed for this call — the protocol is strictly
    /// half-duplex per call, so the caller must reject the event.
    pub fn begin(&self, call_sid: &str) -> bool {
        let mut map = lock_recover(&self.inner, "results");
        if map.contains_key(call_sid) {
            return false;
        }
        map.insert(call_sid.to_string(), Slot::InFlight);
        true
    }

    /// Publishes the turn result into an existing slot.
    ///
    /// Writes only where a slot exists: a late write from a pipeline task
    /// whose call was already torn down is a harmless no-op. Returns whether
    /// the write landed.
    pub fn publish(&self, call_sid: &str, reply: TurnReply) -> bool {
        let mut map = lock_recover(&self.inner, "results");
        match map.get_mut(call_sid) {
            Some(slot) => {
                *slot = Slot::Ready(reply);
                true
            }
            None => false,
        }
    }

    /// Consumes a ready result, removing the entry. Exactly-once: the check
    /// and removal happen under one lock acquisition, so concurrent polls
    /// cannot both receive the payload. In-flight slots are left untouched.
    pub fn take_ready(&self, call_sid: &str) -> Option<TurnReply> {
        let mut map = lock_recover(&self.inner, "results");
        match map.get(call_sid) {
            Some(Slot::Ready(_)) => match map.remove(call_sid) {
                Some(Slot::Ready(reply)) => Some(reply),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether a turn is currently in flight (claimed but not yet resolved).
    pub fn is_in_flight(&self, call_sid: &str) -> bool {
        matches!(
            lock_recover(&self.inner, "results").get(call_sid),
            Some(Slot::InFlight)
        )
    }

    /// Whether any slot (in-flight or ready) exists for this call.
    pub fn contains(&self, call_sid: &str) -> bool {
        lock_recover(&self.inner, "results").contains_key(call_sid)
    }

    /// Drops the slot regardless of state. Used when the owning session is
    /// evicted. Returns whether a slot existed.
    pub fn remove(&self, call_sid: &str) -> bool {
        lock_recover(&self.inner, "results")
            .remove(call_sid)
            .is_some()
    }

    pub fn len(&self) -> usize {
        lock_recover(&self.inner, "results").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_is_half_duplex() {
        let registry = ResultRegistry::new();
        assert!(registry.begin("CA1"));
        // Second recording-ready for the same call must be refused while the
        // first turn is unresolved.
        assert!(!registry.begin("CA1"));
        // Still refused once resolved but unconsumed.
        registry.publish("CA1", TurnReply::line("hello"));
        assert!(!registry.begin("CA1"));
        // Free again after consumption.
        registry.take_ready("CA1");
        assert!(registry.begin("CA1"));
    }

    #[test]
    fn begin_is_independent_across_calls() {
        let registry = ResultRegistry::new();
        assert!(registry.begin("CA1"));
        assert!(registry.begin("CA2"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn take_ready_ignores_in_flight_slots() {
        let registry = ResultRegistry::new();
        registry.begin("CA1");
        assert_eq!(registry.take_ready("CA1"), None);
        assert!(registry.is_in_flight("CA1"));
    }

    #[test]
    fn take_ready_on_unknown_call_is_none() {
        let registry = ResultRegistry::new();
        assert_eq!(registry.take_ready("CA-missing"), None);
    }

    #[test]
    fn publish_into_absent_slot_is_a_no_op() {
        let registry = ResultRegistry::new();
        assert!(!registry.publish("CA-gone", TurnReply::line("too late")));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_clears_any_state() {
        let registry = ResultRegistry::new();
        registry.begin("CA1");
        assert!(registry.remove("CA1"));
        assert!(!registry.remove("CA1"));
        // A late pipeline write after teardown lands nowhere.
        assert!(!registry.publish("CA1", TurnReply::line("late")));
    }

    #[test]
    fn consumption_is_exactly_once_under_contention() {
        let registry = ResultRegistry::new();
        registry.begin("CA1");
        registry.publish("CA1", TurnReply::farewell("bye"));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || registry.take_ready("CA1")));
        }

        let winners: usize = handles
            .into_iter()
            .map(|h| h.join().expect("poller thread panicked"))
            .filter(|r| r.is_some())
            .count();
        assert_eq!(winners, 1, "exactly one poll may consume the result");
        assert!(registry.is_empty());
    }
}
