//! Fixture builders and the wired engine harness.

use wfd_config::EngineConfig;
use wfd_runtime::CollectionEngine;
use wfd_schemas::{
    Bin, Driver, DriverLocationSample, DriverRole, GeoPoint, Route,
};

use crate::{FakeRemote, ManualClock, SharedAudit};

pub fn bin_at(id: &str, lat: f64, lng: f64, fill: u8) -> Bin {
    Bin::new(id, GeoPoint::new(lat, lng), fill)
}

pub fn driver(id: &str) -> Driver {
    Driver::new(id, format!("driver {id}"), DriverRole::Driver)
}

pub fn route_with_bins(id: &str, driver_id: &str, bins: &[&str]) -> Route {
    Route::new(id, driver_id, bins.iter().map(|b| b.to_string()).collect(), 0)
}

pub fn location(driver_id: &str, lat: f64, lng: f64, ts_ms: i64) -> DriverLocationSample {
    DriverLocationSample {
        driver_id: driver_id.to_string(),
        lat,
        lng,
        ts_ms,
    }
}

/// A fully wired engine plus handles to every double.
pub struct EngineHarness {
    pub engine: CollectionEngine,
    pub clock: ManualClock,
    pub remote: FakeRemote,
    pub audit: SharedAudit,
}

impl EngineHarness {
    /// Engine with the given config, manual clock at 0, fake remote, shared
    /// in-memory audit.
    pub fn new(cfg: EngineConfig) -> Self {
        let clock = ManualClock::new(0);
        let remote = FakeRemote::new();
        let audit = SharedAudit::new();
        let engine = CollectionEngine::new(
            cfg,
            Box::new(audit.clone()),
            Box::new(remote.clone()),
            clock.as_clock(),
        );
        Self {
            engine,
            clock,
            remote,
            audit,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }
}
