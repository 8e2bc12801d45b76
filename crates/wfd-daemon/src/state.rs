//! Shared runtime state for wfd-daemon.
//!
//! The engine is single-writer by contract, so the daemon serializes every
//! flow behind one async mutex. Handlers hold the lock only for the
//! synchronous in-memory flows; the sync cycle (blocking network IO) runs on
//! the blocking pool via `block_in_place`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use wfd_runtime::CollectionEngine;

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<CollectionEngine>>,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(engine: CollectionEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            build: BuildInfo {
                service: "wfd-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

/// Periodic sync tick. The blocking remote calls run via `block_in_place` so
/// the reactor threads stay free; the engine lock is held for the duration
/// of one cycle, which is the single-writer contract working as intended.
pub fn spawn_sync_loop(state: Arc<AppState>, every: Duration) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let mut engine = state.engine.lock().await;
            let report = tokio::task::block_in_place(|| engine.sync_cycle());
            debug!(?report, "sync cycle");
        }
    });
}
