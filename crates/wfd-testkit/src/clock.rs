//! Manually-advanced clock for deterministic time control without mocks.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use wfd_runtime::Clock;

/// Shared epoch-ms clock. Clones observe the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn now(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    pub fn set(&self, ms: i64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// An engine [`Clock`] reading this instance.
    pub fn as_clock(&self) -> Clock {
        let handle = self.clone();
        Box::new(move || handle.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_time() {
        let clock = ManualClock::new(100);
        let view = clock.clone();
        clock.advance(50);
        assert_eq!(view.now(), 150);
        view.set(1_000);
        assert_eq!(clock.now(), 1_000);
    }
}
