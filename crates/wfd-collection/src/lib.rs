//! wfd-collection
//!
//! The collection recorder: turns a verified emptying event into an immutable
//! Collection record and resets the bin.
//!
//! Every downstream effect (route reconciliation, sync push) is driven off
//! the returned Collection, never re-derived independently.
//!
//! There is deliberately no idempotency key: two rapid manual calls for the
//! same bin and driver produce two Collection records. Duplicate suppression
//! lives entirely in the proximity gate (manual path) and the cooldown
//! registry (auto path). Adding a dedup key here would change observable
//! behavior and is out of scope.

use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use wfd_audit::{bin_topic, driver_topic, AuditSink};
use wfd_schemas::{BinId, Collection, DriverId, DriverRole, RouteId};
use wfd_store::FleetStore;

/// Precondition failure. Nothing is mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    UnknownDriver { driver_id: DriverId },
    /// The user exists but is not a driver; only drivers collect.
    NotADriver { driver_id: DriverId },
    UnknownBin { bin_id: BinId },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::UnknownDriver { driver_id } => {
                write!(f, "VALIDATION_FAILED: unknown driver {driver_id}")
            }
            ValidationError::NotADriver { driver_id } => {
                write!(f, "VALIDATION_FAILED: {driver_id} is not a driver")
            }
            ValidationError::UnknownBin { bin_id } => {
                write!(f, "VALIDATION_FAILED: unknown bin {bin_id}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// What the caller knows about the event being recorded.
#[derive(Debug, Clone)]
pub struct RecordRequest {
    pub bin_id: BinId,
    pub driver_id: DriverId,
    /// `None` for an ad-hoc collection.
    pub route_id: Option<RouteId>,
    pub auto_collection: bool,
    pub verified_by_proximity: bool,
    pub distance_meters: Option<f64>,
}

/// Record a collection.
///
/// Preconditions: the driver exists with role `Driver`; the bin exists.
/// Effects: appends an immutable Collection, resets the bin's fill level to 0
/// (recomputing its derived status and stamping `last_collection_at_ms`), and
/// appends history entries to the driver's and the bin's audit streams.
///
/// # Errors
///
/// [`ValidationError`] when a precondition fails; the store is untouched.
pub fn record(
    store: &mut FleetStore,
    audit: &mut dyn AuditSink,
    run_id: Uuid,
    req: RecordRequest,
    now_ms: i64,
) -> Result<Collection, ValidationError> {
    let driver = store
        .driver(&req.driver_id)
        .ok_or_else(|| ValidationError::UnknownDriver {
            driver_id: req.driver_id.clone(),
        })?;
    if driver.role != DriverRole::Driver {
        return Err(ValidationError::NotADriver {
            driver_id: req.driver_id.clone(),
        });
    }
    let Some(bin) = store.bin_mut(&req.bin_id) else {
        return Err(ValidationError::UnknownBin {
            bin_id: req.bin_id.clone(),
        });
    };

    // Preconditions hold; mutate.
    let original_fill_level = bin.fill_level;
    bin.set_fill_level(0);
    bin.last_collection_at_ms = Some(now_ms);

    let collection = Collection {
        id: Uuid::new_v4(),
        bin_id: req.bin_id.clone(),
        driver_id: req.driver_id.clone(),
        ts_ms: now_ms,
        original_fill_level,
        route_id: req.route_id.clone(),
        verified_by_proximity: req.verified_by_proximity,
        distance_meters: req.distance_meters,
        auto_collection: req.auto_collection,
    };
    store.append_collection(collection.clone());

    let payload = json!({
        "collection_id": collection.id,
        "bin_id": collection.bin_id.clone(),
        "driver_id": collection.driver_id.clone(),
        "original_fill_level": collection.original_fill_level,
        "route_id": collection.route_id.clone(),
        "auto_collection": collection.auto_collection,
        "verified_by_proximity": collection.verified_by_proximity,
        "distance_meters": collection.distance_meters,
        "ts_ms": collection.ts_ms,
    });
    for topic in [driver_topic(&req.driver_id), bin_topic(&req.bin_id)] {
        if let Err(err) = audit.append(run_id, &topic, "collection.recorded", payload.clone()) {
            // Audit is history, not a gate: a failed append never blocks the flow.
            warn!(%topic, %err, "audit append failed");
        }
    }

    Ok(collection)
}
