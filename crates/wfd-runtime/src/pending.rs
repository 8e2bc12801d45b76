//! Dirty-state tracking between successful pushes.

use std::collections::BTreeSet;

use wfd_schemas::{BinId, Collection, RouteId, StateDelta};
use wfd_store::FleetStore;

/// Entities dirtied since the last successful push. The delta is rebuilt
/// from current store state at push time, so a failed push retries the
/// freshest version of every dirty entity wholesale.
#[derive(Debug, Default)]
pub struct PendingDelta {
    bins: BTreeSet<BinId>,
    routes: BTreeSet<RouteId>,
    collections: Vec<Collection>,
}

impl PendingDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_bin(&mut self, bin_id: impl Into<BinId>) {
        self.bins.insert(bin_id.into());
    }

    pub fn mark_route(&mut self, route_id: impl Into<RouteId>) {
        self.routes.insert(route_id.into());
    }

    /// Collections are immutable, so the record itself is queued rather than
    /// an id to re-resolve.
    pub fn queue_collection(&mut self, collection: Collection) {
        self.collections.push(collection);
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty() && self.routes.is_empty() && self.collections.is_empty()
    }

    /// Materialize the delta from current store state. Dirty ids that no
    /// longer resolve are skipped.
    pub fn build(&self, store: &FleetStore) -> StateDelta {
        StateDelta {
            collections: self.collections.clone(),
            routes: self
                .routes
                .iter()
                .filter_map(|id| store.route(id).cloned())
                .collect(),
            bins: self
                .bins
                .iter()
                .filter_map(|id| store.bin(id).cloned())
                .collect(),
        }
    }

    /// Called after a successful push.
    pub fn clear(&mut self) {
        self.bins.clear();
        self.routes.clear();
        self.collections.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfd_schemas::{Bin, GeoPoint, Route};

    #[test]
    fn build_resolves_current_state_and_skips_unknown_ids() {
        let mut store = FleetStore::new();
        store.upsert_bin(Bin::new("B1", GeoPoint::new(25.0, 51.0), 40));
        store.upsert_route(Route::new("R1", "D1", vec!["B1".into()], 0));

        let mut pending = PendingDelta::new();
        pending.mark_bin("B1");
        pending.mark_bin("B-gone");
        pending.mark_route("R1");

        let delta = pending.build(&store);
        assert_eq!(delta.bins.len(), 1);
        assert_eq!(delta.routes.len(), 1);
        assert!(delta.collections.is_empty());

        // Mutations after marking are picked up at build time.
        store.bin_mut("B1").unwrap().set_fill_level(0);
        let delta = pending.build(&store);
        assert_eq!(delta.bins[0].fill_level, 0);
    }

    #[test]
    fn clear_empties_everything() {
        let mut pending = PendingDelta::new();
        pending.mark_bin("B1");
        assert!(!pending.is_empty());
        pending.clear();
        assert!(pending.is_empty());
    }
}
