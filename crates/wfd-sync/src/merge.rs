//! Guarded application of a pulled server snapshot.

use tracing::info;

use wfd_schemas::RemoteSnapshot;
use wfd_store::FleetStore;

use crate::guard::RecentCompletionGuard;

/// What a pull merge changed locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub bins_applied: usize,
    pub routes_applied: usize,
    /// Routes whose local completed state overrode a stale server copy.
    pub routes_guarded: Vec<String>,
    pub collections_appended: usize,
}

/// Replace local bins/routes with server state, except routes under the
/// completion guard; append server collections unknown locally.
///
/// Collections are append-only on both sides: a pull never rewrites or
/// removes one.
pub fn apply_pull(
    store: &mut FleetStore,
    guard: &RecentCompletionGuard,
    snapshot: RemoteSnapshot,
    now_ms: i64,
    guard_ms: i64,
) -> PullReport {
    let mut report = PullReport::default();

    for bin in snapshot.bins {
        store.upsert_bin(bin);
        report.bins_applied += 1;
    }

    for route in snapshot.routes {
        let stale_server_copy = !route.status.is_terminal()
            && guard.is_guarded(&route.id, now_ms, guard_ms)
            && store
                .route(&route.id)
                .map(|local| local.status.is_terminal())
                .unwrap_or(false);
        if stale_server_copy {
            info!(route_id = %route.id, "pull: keeping local completion over stale server state");
            report.routes_guarded.push(route.id);
            continue;
        }
        store.upsert_route(route);
        report.routes_applied += 1;
    }

    for collection in snapshot.collections {
        if !store.has_collection(&collection.id) {
            store.append_collection(collection);
            report.collections_appended += 1;
        }
    }

    report
}
