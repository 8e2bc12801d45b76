//! wfd-reconcile
//!
//! Route reconciliation after a collection.
//!
//! A bin is a physical object: once emptied it cannot remain pending on any
//! route, regardless of which driver it was logically assigned to. "Whoever
//! empties it wins" resolves assignment races without a central lock: the
//! bin is removed from the acting driver's routes and from every other
//! driver's route that still lists it (a foreign claim). A route whose
//! bin-set empties is completed.
//!
//! Re-invocation is idempotent: a bin already absent from a route is a
//! no-op, never an error.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use wfd_audit::{driver_topic, AuditSink, ENGINE_TOPIC};
use wfd_schemas::{RouteId, RouteStatus};
use wfd_store::FleetStore;

/// Route ids touched by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// Routes whose bin-set emptied and transitioned to `Completed`.
    pub completed: Vec<RouteId>,
    /// Routes that shrank but still have bins pending.
    pub updated: Vec<RouteId>,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.completed.is_empty() && self.updated.is_empty()
    }
}

/// Remove `bin_id` from every live route and complete routes that empty.
///
/// The acting driver's own routes are processed first, then foreign claims;
/// within each group, route-id order (deterministic). Foreign-claim
/// completions are tagged `completed_by_other_driver` and surfaced as an
/// informational audit entry naming both drivers, a consistency warning
/// that is always auto-resolved, never an error.
pub fn reconcile(
    store: &mut FleetStore,
    audit: &mut dyn AuditSink,
    run_id: Uuid,
    bin_id: &str,
    acting_driver_id: &str,
    now_ms: i64,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    let candidates = store.live_routes_with_bin(bin_id);
    let (own, foreign): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|id| owner_of(store, id).as_deref() == Some(acting_driver_id));

    for route_id in own.into_iter().chain(foreign) {
        remove_bin_from_route(
            store,
            audit,
            run_id,
            &route_id,
            bin_id,
            acting_driver_id,
            now_ms,
            &mut outcome,
        );
    }

    // Defensive sweep: a live route whose bin-set is already empty is
    // already complete in fact; reflect that in state. Not counted as
    // `updated`: nothing was removed from it in this pass.
    let stragglers: Vec<RouteId> = store
        .routes()
        .filter(|r| !r.status.is_terminal() && r.bins.is_empty())
        .map(|r| r.id.clone())
        .collect();
    for route_id in stragglers {
        let owner = owner_of(store, &route_id).unwrap_or_default();
        complete_route(store, audit, run_id, &route_id, &owner, now_ms, false);
        outcome.completed.push(route_id);
    }

    outcome
}

fn owner_of(store: &FleetStore, route_id: &str) -> Option<String> {
    store.route(route_id).map(|r| r.driver_id.clone())
}

#[allow(clippy::too_many_arguments)]
fn remove_bin_from_route(
    store: &mut FleetStore,
    audit: &mut dyn AuditSink,
    run_id: Uuid,
    route_id: &str,
    bin_id: &str,
    acting_driver_id: &str,
    now_ms: i64,
    outcome: &mut ReconcileOutcome,
) {
    let Some(route) = store.route_mut(route_id) else {
        return;
    };
    let before = route.bins.len();
    route.bins.retain(|b| b != bin_id);
    if route.bins.len() == before {
        return; // bin already absent: idempotent no-op
    }
    route.total_collected += 1;

    if route.bins.is_empty() {
        let foreign = route.driver_id != acting_driver_id;
        complete_route(store, audit, run_id, route_id, acting_driver_id, now_ms, foreign);
        outcome.completed.push(route_id.to_string());
    } else {
        if route.status == RouteStatus::Pending {
            route.status = RouteStatus::InProgress;
        }
        let payload = json!({
            "route_id": route.id.clone(),
            "bin_id": bin_id,
            "bins_remaining": route.bins.len(),
            "progress": route.progress(),
        });
        if let Err(err) = audit.append(run_id, ENGINE_TOPIC, "route.updated", payload) {
            warn!(%err, "audit append failed");
        }
        outcome.updated.push(route_id.to_string());
    }
}

fn complete_route(
    store: &mut FleetStore,
    audit: &mut dyn AuditSink,
    run_id: Uuid,
    route_id: &str,
    acting_driver_id: &str,
    now_ms: i64,
    foreign: bool,
) {
    let Some(route) = store.route_mut(route_id) else {
        return;
    };
    route.status = RouteStatus::Completed;
    route.completed_at_ms = Some(now_ms);
    route.completed_by = Some(acting_driver_id.to_string());
    route.completed_by_other_driver = foreign;
    route.total_collected = route.total_bins;

    let owner = route.driver_id.clone();
    let payload = json!({
        "route_id": route_id,
        "owner_driver_id": owner.clone(),
        "completed_by": acting_driver_id,
        "total_collected": route.total_collected,
        "completed_at_ms": now_ms,
    });

    if foreign {
        info!(
            route_id,
            owner_driver_id = %owner,
            completed_by = %acting_driver_id,
            "route completed by another driver"
        );
        for topic in [driver_topic(&owner), ENGINE_TOPIC.to_string()] {
            if let Err(err) = audit.append(
                run_id,
                &topic,
                "route.completed_by_other_driver",
                payload.clone(),
            ) {
                warn!(%err, "audit append failed");
            }
        }
    } else if let Err(err) = audit.append(run_id, &driver_topic(&owner), "route.completed", payload)
    {
        warn!(%err, "audit append failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfd_audit::MemoryAudit;
    use wfd_schemas::Route;

    fn route(id: &str, driver: &str, bins: &[&str]) -> Route {
        Route::new(id, driver, bins.iter().map(|b| b.to_string()).collect(), 0)
    }

    fn run(store: &mut FleetStore, bin: &str, driver: &str) -> ReconcileOutcome {
        let mut audit = MemoryAudit::new();
        reconcile(store, &mut audit, Uuid::new_v4(), bin, driver, 1_000)
    }

    #[test]
    fn shrinking_route_moves_to_in_progress() {
        let mut store = FleetStore::new();
        store.upsert_route(route("R1", "D1", &["B1", "B2"]));

        let outcome = run(&mut store, "B1", "D1");
        assert_eq!(outcome.updated, vec!["R1".to_string()]);
        assert!(outcome.completed.is_empty());

        let r = store.route("R1").unwrap();
        assert_eq!(r.status, RouteStatus::InProgress);
        assert_eq!(r.bins, vec!["B2".to_string()]);
        assert_eq!(r.total_collected, 1);
        assert_eq!(r.progress(), 0.5);
    }

    #[test]
    fn last_bin_completes_route() {
        let mut store = FleetStore::new();
        store.upsert_route(route("R1", "D1", &["B1"]));

        let outcome = run(&mut store, "B1", "D1");
        assert_eq!(outcome.completed, vec!["R1".to_string()]);

        let r = store.route("R1").unwrap();
        assert_eq!(r.status, RouteStatus::Completed);
        assert_eq!(r.completed_by.as_deref(), Some("D1"));
        assert!(!r.completed_by_other_driver);
        assert_eq!(r.total_collected, 1);
        assert_eq!(r.completed_at_ms, Some(1_000));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut store = FleetStore::new();
        store.upsert_route(route("R1", "D1", &["B1", "B2"]));

        let first = run(&mut store, "B1", "D1");
        assert!(!first.is_noop());
        let state_after_first = store.route("R1").unwrap().clone();

        let second = run(&mut store, "B1", "D1");
        assert!(second.is_noop());
        let state_after_second = store.route("R1").unwrap();
        assert_eq!(state_after_second.bins, state_after_first.bins);
        assert_eq!(state_after_second.total_collected, state_after_first.total_collected);
        assert_eq!(state_after_second.status, state_after_first.status);
    }

    #[test]
    fn foreign_claim_purged_and_tagged() {
        let mut store = FleetStore::new();
        store.upsert_route(route("R1", "D1", &["B1", "B2"]));
        store.upsert_route(route("R2", "D2", &["B1"]));

        let mut audit = MemoryAudit::new();
        let outcome = reconcile(&mut store, &mut audit, Uuid::new_v4(), "B1", "D1", 1_000);

        // Own route shrinks, foreign route empties and completes.
        assert_eq!(outcome.updated, vec!["R1".to_string()]);
        assert_eq!(outcome.completed, vec!["R2".to_string()]);

        let foreign = store.route("R2").unwrap();
        assert_eq!(foreign.status, RouteStatus::Completed);
        assert!(foreign.completed_by_other_driver);
        assert_eq!(foreign.completed_by.as_deref(), Some("D1"));

        let entries = audit.events_for_topic("driver/D2");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "route.completed_by_other_driver");
        assert_eq!(entries[0].payload["completed_by"], "D1");
        assert_eq!(entries[0].payload["owner_driver_id"], "D2");
    }

    #[test]
    fn terminal_routes_are_untouched() {
        let mut store = FleetStore::new();
        let mut done = route("R1", "D1", &["B1"]);
        done.status = RouteStatus::Cancelled;
        store.upsert_route(done);

        let outcome = run(&mut store, "B1", "D1");
        assert!(outcome.is_noop());
        let r = store.route("R1").unwrap();
        assert_eq!(r.status, RouteStatus::Cancelled);
        assert_eq!(r.bins, vec!["B1".to_string()]);
    }

    #[test]
    fn live_route_with_empty_bin_set_is_swept_complete() {
        let mut store = FleetStore::new();
        store.upsert_route(route("R1", "D1", &[]));

        let outcome = run(&mut store, "B9", "D2");
        assert_eq!(outcome.completed, vec!["R1".to_string()]);
        assert!(outcome.updated.is_empty());
        let r = store.route("R1").unwrap();
        assert_eq!(r.status, RouteStatus::Completed);
        // Swept completion credits the route's own driver, not the actor.
        assert_eq!(r.completed_by.as_deref(), Some("D1"));
    }

    #[test]
    fn own_routes_processed_before_foreign() {
        let mut store = FleetStore::new();
        // Ids chosen so naive id-order would put the foreign route first.
        store.upsert_route(route("A-foreign", "D2", &["B1"]));
        store.upsert_route(route("Z-own", "D1", &["B1"]));

        let outcome = run(&mut store, "B1", "D1");
        assert_eq!(
            outcome.completed,
            vec!["Z-own".to_string(), "A-foreign".to_string()]
        );
    }
}
