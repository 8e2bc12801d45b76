//! wfd-runtime
//!
//! The collection engine: one object owning the store, the evidence
//! components, the completion guard and the sync boundary, exposing the
//! system's external interface as four flows:
//!
//! - location samples (GPS subsystem)
//! - manual mark-collected requests (UI layer)
//! - sensor fill-level reports (sensor fleet)
//! - the periodic sync cycle (remote store)
//!
//! # Ordering
//!
//! Within one collection flow the ordering is strict and causal: record,
//! then reconcile routes, then queue the push. Across different flows there
//! is no mutual exclusion beyond the cooldown registry: first writer wins,
//! later writers are idempotent no-ops. The engine itself is single-writer:
//! callers running it on real OS threads must serialize access (the daemon
//! wraps it in a `Mutex`).

mod engine;
mod pending;

pub use engine::{
    CollectError, CollectionEngine, ManualCollectionOutcome, SensorReportOutcome, SyncCycleReport,
};
pub use pending::PendingDelta;

/// Injected clock returning epoch milliseconds. Production passes the system
/// clock; tests pass a closure over a shared cell.
pub type Clock = Box<dyn Fn() -> i64 + Send>;

/// The system wall clock as an engine [`Clock`].
pub fn system_clock() -> Clock {
    Box::new(unix_now_ms)
}

fn unix_now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
