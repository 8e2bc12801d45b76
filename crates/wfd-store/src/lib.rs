//! wfd-store
//!
//! In-memory fleet repository.
//!
//! The store is an explicit object passed into every component; there is no
//! ambient singleton. Mutation happens only through the engine's write paths
//! under the single-writer discipline; the store itself does no locking.
//!
//! Keyed state lives in `BTreeMap`s so iteration order is deterministic and
//! scenario tests see stable output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use wfd_schemas::{
    Bin, BinId, Collection, Driver, DriverId, DriverLocationSample, Route, RouteId,
};

/// The local-first source of truth for bins, routes, drivers and the
/// append-only collection log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetStore {
    bins: BTreeMap<BinId, Bin>,
    routes: BTreeMap<RouteId, Route>,
    drivers: BTreeMap<DriverId, Driver>,
    /// Append-only. Collections are never mutated or removed.
    collections: Vec<Collection>,
    /// Latest-wins GPS sample per driver.
    locations: BTreeMap<DriverId, DriverLocationSample>,
}

impl FleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- bins ---------------------------------------------------------------

    pub fn bin(&self, id: &str) -> Option<&Bin> {
        self.bins.get(id)
    }

    pub fn bin_mut(&mut self, id: &str) -> Option<&mut Bin> {
        self.bins.get_mut(id)
    }

    pub fn upsert_bin(&mut self, bin: Bin) {
        self.bins.insert(bin.id.clone(), bin);
    }

    pub fn bins(&self) -> impl Iterator<Item = &Bin> {
        self.bins.values()
    }

    // -- routes -------------------------------------------------------------

    pub fn route(&self, id: &str) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn route_mut(&mut self, id: &str) -> Option<&mut Route> {
        self.routes.get_mut(id)
    }

    pub fn upsert_route(&mut self, route: Route) {
        self.routes.insert(route.id.clone(), route);
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// Ids of non-terminal routes whose bin-set still contains `bin_id`.
    pub fn live_routes_with_bin(&self, bin_id: &str) -> Vec<RouteId> {
        self.routes
            .values()
            .filter(|r| !r.status.is_terminal() && r.contains_bin(bin_id))
            .map(|r| r.id.clone())
            .collect()
    }

    /// The acting driver's own non-terminal route containing the bin, if any.
    /// Used to decide whether a collection is on-route or ad-hoc.
    pub fn own_route_with_bin(&self, bin_id: &str, driver_id: &str) -> Option<RouteId> {
        self.routes
            .values()
            .find(|r| !r.status.is_terminal() && r.driver_id == driver_id && r.contains_bin(bin_id))
            .map(|r| r.id.clone())
    }

    // -- drivers ------------------------------------------------------------

    pub fn driver(&self, id: &str) -> Option<&Driver> {
        self.drivers.get(id)
    }

    pub fn upsert_driver(&mut self, driver: Driver) {
        self.drivers.insert(driver.id.clone(), driver);
    }

    // -- collections --------------------------------------------------------

    pub fn append_collection(&mut self, collection: Collection) {
        self.collections.push(collection);
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn has_collection(&self, id: &uuid::Uuid) -> bool {
        self.collections.iter().any(|c| &c.id == id)
    }

    // -- driver locations ---------------------------------------------------

    /// Latest-wins: an older sample than the one on file is ignored.
    pub fn record_location(&mut self, sample: DriverLocationSample) {
        match self.locations.get(&sample.driver_id) {
            Some(existing) if existing.ts_ms > sample.ts_ms => {}
            _ => {
                self.locations.insert(sample.driver_id.clone(), sample);
            }
        }
    }

    pub fn location(&self, driver_id: &str) -> Option<&DriverLocationSample> {
        self.locations.get(driver_id)
    }

    pub fn locations(&self) -> impl Iterator<Item = &DriverLocationSample> {
        self.locations.values()
    }
}
