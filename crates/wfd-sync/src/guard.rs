//! Short-lived completion guard for pull merges.
//!
//! When a route completes locally, a push is issued immediately, but the
//! server's read path may lag behind its write path. A pull landing inside
//! that lag would show the route as still pending and flicker it back to
//! life. The guard records local completions and shields them from the
//! server for a bounded window; expiry is checked lazily on read, so no
//! background timer is needed. After expiry the server is authoritative:
//! the guard bounds the race, it does not eliminate it.

use std::collections::BTreeMap;

use wfd_schemas::{RouteId, RouteStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GuardEntry {
    completed_at_ms: i64,
    status: RouteStatus,
}

/// Route-id keyed record of recent local completions.
#[derive(Debug, Clone, Default)]
pub struct RecentCompletionGuard {
    entries: BTreeMap<RouteId, GuardEntry>,
}

impl RecentCompletionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local terminal transition at `now_ms`.
    pub fn note_completion(&mut self, route_id: impl Into<RouteId>, status: RouteStatus, now_ms: i64) {
        self.entries.insert(
            route_id.into(),
            GuardEntry {
                completed_at_ms: now_ms,
                status,
            },
        );
    }

    /// `true` while the entry is younger than `guard_ms`. Expired entries are
    /// treated as absent (lazy expiry); use [`prune_expired`][Self::prune_expired]
    /// to actually drop them.
    pub fn is_guarded(&self, route_id: &str, now_ms: i64, guard_ms: i64) -> bool {
        match self.entries.get(route_id) {
            Some(entry) => now_ms - entry.completed_at_ms < guard_ms,
            None => false,
        }
    }

    /// The locally-recorded terminal status, while guarded.
    pub fn guarded_status(&self, route_id: &str, now_ms: i64, guard_ms: i64) -> Option<RouteStatus> {
        self.entries.get(route_id).and_then(|entry| {
            (now_ms - entry.completed_at_ms < guard_ms).then_some(entry.status)
        })
    }

    /// Drop expired entries, keeping the map bounded.
    pub fn prune_expired(&mut self, now_ms: i64, guard_ms: i64) {
        self.entries
            .retain(|_, entry| now_ms - entry.completed_at_ms < guard_ms);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
