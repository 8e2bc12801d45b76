//! wfd-schemas
//!
//! Shared domain types for the WasteFleetDesk engine.
//!
//! Conventions:
//! - Bin / route / driver ids are opaque strings owned by the upstream
//!   assignment system. Collection ids are generated locally (UUID v4).
//! - Timestamps inside the engine are epoch milliseconds (`i64`); wire and
//!   audit types carry `DateTime<Utc>` where a human-readable form matters.
//! - Everything is `Serialize + Deserialize`; collections of keyed state use
//!   `BTreeMap` so iteration order and JSON output are deterministic.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bin identifier assigned by the upstream fleet system.
pub type BinId = String;
/// Route identifier assigned by the upstream fleet system.
pub type RouteId = String;
/// Driver identifier assigned by the upstream fleet system.
pub type DriverId = String;

// ---------------------------------------------------------------------------
// Geo
// ---------------------------------------------------------------------------

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

// ---------------------------------------------------------------------------
// Bin
// ---------------------------------------------------------------------------

/// Fill level at or above which a bin is `Critical`.
pub const FILL_CRITICAL: u8 = 90;
/// Fill level at or above which a bin is `Warning`.
pub const FILL_WARNING: u8 = 70;

/// Operational status of a bin.
///
/// `Maintenance` and `Offline` are operator-set states: fill recomputation
/// never overwrites them. The remaining three are derived from fill level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinStatus {
    Normal,
    Warning,
    Critical,
    Maintenance,
    Offline,
}

impl BinStatus {
    /// `true` for states an operator set explicitly (never fill-derived).
    pub fn is_operator_state(&self) -> bool {
        matches!(self, BinStatus::Maintenance | BinStatus::Offline)
    }

    /// Status derived from a fill level.
    pub fn from_fill(fill_level: u8) -> Self {
        if fill_level >= FILL_CRITICAL {
            BinStatus::Critical
        } else if fill_level >= FILL_WARNING {
            BinStatus::Warning
        } else {
            BinStatus::Normal
        }
    }
}

/// A physical waste receptacle with a sensor-reported fill level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bin {
    pub id: BinId,
    pub location: GeoPoint,
    /// Always in `[0, 100]`. Enforced by [`Bin::set_fill_level`].
    pub fill_level: u8,
    pub status: BinStatus,
    /// Epoch-ms of the most recent collection, if any.
    pub last_collection_at_ms: Option<i64>,
}

impl Bin {
    pub fn new(id: impl Into<BinId>, location: GeoPoint, fill_level: u8) -> Self {
        let fill_level = fill_level.min(100);
        Self {
            id: id.into(),
            location,
            fill_level,
            status: BinStatus::from_fill(fill_level),
            last_collection_at_ms: None,
        }
    }

    /// Set the fill level (clamped to 100) and recompute the derived status.
    /// Operator states (`Maintenance`/`Offline`) are preserved.
    pub fn set_fill_level(&mut self, fill_level: u8) {
        self.fill_level = fill_level.min(100);
        if !self.status.is_operator_state() {
            self.status = BinStatus::from_fill(self.fill_level);
        }
    }
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// Lifecycle of a route.
///
/// `Pending → InProgress → Completed`, `Pending | InProgress → Cancelled`.
/// `Completed` and `Cancelled` are terminal. The only engine-driven
/// transition into `Completed` is "bin-set became empty"; cancellation is an
/// external admin action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl RouteStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RouteStatus::Completed | RouteStatus::Cancelled)
    }
}

/// An assignment of bins to one driver for one collection shift.
///
/// `bins` is the single canonical ordered bin-set: bins still awaiting
/// collection, in assignment order. `total_bins` is the size of the set at
/// assignment time and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub driver_id: DriverId,
    pub bins: Vec<BinId>,
    pub total_bins: usize,
    pub status: RouteStatus,
    pub created_at_ms: i64,
    pub completed_at_ms: Option<i64>,
    /// Driver whose collection emptied the route.
    pub completed_by: Option<DriverId>,
    /// `true` when a driver other than the assignee emptied the last bin.
    pub completed_by_other_driver: bool,
    /// Number of bins collected off this route so far.
    pub total_collected: usize,
}

impl Route {
    pub fn new(
        id: impl Into<RouteId>,
        driver_id: impl Into<DriverId>,
        bins: Vec<BinId>,
        created_at_ms: i64,
    ) -> Self {
        let total_bins = bins.len();
        Self {
            id: id.into(),
            driver_id: driver_id.into(),
            bins,
            total_bins,
            status: RouteStatus::Pending,
            created_at_ms,
            completed_at_ms: None,
            completed_by: None,
            completed_by_other_driver: false,
            total_collected: 0,
        }
    }

    /// Fraction of the original bin-set collected so far, in `[0, 1]`.
    /// A route assigned an empty bin-set counts as fully progressed.
    pub fn progress(&self) -> f64 {
        if self.total_bins == 0 {
            return 1.0;
        }
        self.total_collected as f64 / self.total_bins as f64
    }

    pub fn contains_bin(&self, bin_id: &str) -> bool {
        self.bins.iter().any(|b| b == bin_id)
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Role of a fleet user. Only `Driver` may record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverRole {
    Driver,
    Supervisor,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub role: DriverRole,
}

impl Driver {
    pub fn new(id: impl Into<DriverId>, name: impl Into<String>, role: DriverRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// An immutable record of a bin being emptied. Append-only: never mutated or
/// deleted after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub bin_id: BinId,
    pub driver_id: DriverId,
    pub ts_ms: i64,
    /// Fill level of the bin immediately before the collection reset it.
    pub original_fill_level: u8,
    /// `None` for an ad-hoc collection (bin not on the driver's route).
    pub route_id: Option<RouteId>,
    /// `true` when the GPS proximity gate measured and passed.
    pub verified_by_proximity: bool,
    /// Measured driver-to-bin distance when proximity was verified.
    pub distance_meters: Option<f64>,
    /// `true` when inferred from a sensor fill-drop rather than a driver tap.
    pub auto_collection: bool,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Latest-wins GPS sample from the location subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverLocationSample {
    pub driver_id: DriverId,
    pub lat: f64,
    pub lng: f64,
    pub ts_ms: i64,
}

impl DriverLocationSample {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// One element of the before/after arrays delivered to the sensor-report
/// handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinLevelReading {
    pub bin_id: BinId,
    pub fill_level: u8,
}

/// Manual mark-collected request from the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualCollectionRequest {
    pub bin_id: BinId,
    pub driver_id: DriverId,
}

// ---------------------------------------------------------------------------
// Sync payloads
// ---------------------------------------------------------------------------

/// Partial state pushed to the remote store. Only entities dirtied since the
/// last successful push are included.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDelta {
    pub collections: Vec<Collection>,
    pub routes: Vec<Route>,
    pub bins: Vec<Bin>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.routes.is_empty() && self.bins.is_empty()
    }
}

/// Full server state returned by a pull.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub bins: Vec<Bin>,
    pub routes: Vec<Route>,
    pub collections: Vec<Collection>,
}
