//! In-memory per-call state for the Switchboard voice bridge.
//!
//! Two keyed maps, both sharded by provider call SID:
//!
//! - [`SessionStore`] — ephemeral call metadata (turn count, last activity),
//!   created by the call-start webhook and evicted on terminal status or TTL.
//! - [`ResultRegistry`] — the tri-state result cell that stands in for an
//!   in-process future when the client driving completion is the provider's
//!   stateless poll loop.
//!
//! Neither store is persisted; a process restart legitimately drops
//! in-flight calls.

mod registry;
mod session;

pub use registry::{ResultRegistry, TurnReply};
pub use session::{CallSession, SessionStore};

use std::sync::{Mutex, MutexGuard};

/// Acquires a mutex, recovering from poisoning.
///
/// A panicked pipeline task must not poison result consumption for every
/// other call; the worst a stale guard can hold is an entry the sweep will
/// collect anyway.
pub(crate) fn lock_recover<'a, T>(mutex: &'a Mutex<T>, what: &'static str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(store = what, "lock poisoned, recovering with stale state");
            poisoned.into_inner()
        }
    }
}
