//! The collection engine.

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use wfd_attribution::{proximity, CooldownRegistry, DelayedAttributionTracker, ProximityError};
use wfd_audit::{AuditSink, ENGINE_TOPIC};
use wfd_collection::{RecordRequest, ValidationError};
use wfd_config::EngineConfig;
use wfd_reconcile::ReconcileOutcome;
use wfd_schemas::{
    Bin, BinId, BinLevelReading, Collection, Driver, DriverId, DriverLocationSample, GeoPoint,
    ManualCollectionRequest, Route, RouteStatus,
};
use wfd_store::FleetStore;
use wfd_sync::{apply_pull, PullReport, RecentCompletionGuard, RemoteStore};

use crate::pending::PendingDelta;
use crate::Clock;

// ---------------------------------------------------------------------------
// Flow results
// ---------------------------------------------------------------------------

/// Why a manual collection was refused. Reported synchronously; no state is
/// mutated on refusal.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectError {
    Validation(ValidationError),
    Proximity(ProximityError),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Validation(e) => write!(f, "{e}"),
            CollectError::Proximity(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<ValidationError> for CollectError {
    fn from(e: ValidationError) -> Self {
        CollectError::Validation(e)
    }
}

impl From<ProximityError> for CollectError {
    fn from(e: ProximityError) -> Self {
        CollectError::Proximity(e)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManualCollectionOutcome {
    pub collection: Collection,
    pub reconcile: ReconcileOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SensorReportOutcome {
    /// Auto-collections recorded from this report, with their reconciliation.
    pub attributed: Vec<ManualCollectionOutcome>,
    /// Fill-drops that matched the window but had no attributable driver.
    pub skipped_bins: Vec<BinId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncCycleReport {
    pub push_attempted: bool,
    pub push_ok: bool,
    pub pull_ok: bool,
    pub pull: Option<PullReport>,
}

// ---------------------------------------------------------------------------
// CollectionEngine
// ---------------------------------------------------------------------------

/// Single-writer engine owning all local state. See the crate docs for the
/// ordering and concurrency contract.
pub struct CollectionEngine {
    cfg: EngineConfig,
    run_id: Uuid,
    store: FleetStore,
    cooldowns: CooldownRegistry,
    tracker: DelayedAttributionTracker,
    guard: RecentCompletionGuard,
    pending: PendingDelta,
    audit: Box<dyn AuditSink>,
    remote: Box<dyn RemoteStore>,
    clock: Clock,
}

impl CollectionEngine {
    pub fn new(
        cfg: EngineConfig,
        audit: Box<dyn AuditSink>,
        remote: Box<dyn RemoteStore>,
        clock: Clock,
    ) -> Self {
        Self {
            cfg,
            run_id: Uuid::new_v4(),
            store: FleetStore::new(),
            cooldowns: CooldownRegistry::new(),
            tracker: DelayedAttributionTracker::new(),
            guard: RecentCompletionGuard::new(),
            pending: PendingDelta::new(),
            audit,
            remote,
            clock,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn store(&self) -> &FleetStore {
        &self.store
    }

    pub fn now_ms(&self) -> i64 {
        (self.clock)()
    }

    // -- seeding (assignment flows are external; tests and replay use these) --

    pub fn seed_bin(&mut self, bin: Bin) {
        self.store.upsert_bin(bin);
    }

    pub fn seed_route(&mut self, route: Route) {
        self.store.upsert_route(route);
    }

    pub fn seed_driver(&mut self, driver: Driver) {
        self.store.upsert_driver(driver);
    }

    // -- flow: GPS locations -------------------------------------------------

    /// Latest-wins location update. Samples within `near_bin_meters` of a bin
    /// stamp a near-bin proximity event for delayed attribution. Returns the
    /// bins stamped by this sample.
    pub fn handle_location_sample(&mut self, sample: DriverLocationSample) -> Vec<BinId> {
        let now_ms = self.now_ms();
        let point = sample.point();
        self.store.record_location(sample);

        let near: Vec<BinId> = self
            .store
            .bins()
            .filter(|bin| {
                proximity::haversine_meters(&point, &bin.location) <= self.cfg.near_bin_meters
            })
            .map(|bin| bin.id.clone())
            .collect();
        for bin_id in &near {
            self.tracker.record_proximity(bin_id.clone(), now_ms);
        }
        near
    }

    // -- flow: manual collection ----------------------------------------------

    /// Manual mark-collected. Fail-closed on the proximity gate; the full
    /// flow is record → reconcile → queue push, strictly in that order.
    ///
    /// # Errors
    ///
    /// [`CollectError`] when validation or the proximity gate refuses;
    /// nothing is mutated.
    pub fn handle_manual_collection(
        &mut self,
        req: ManualCollectionRequest,
    ) -> Result<ManualCollectionOutcome, CollectError> {
        let now_ms = self.now_ms();

        let bin_loc = self
            .store
            .bin(&req.bin_id)
            .map(|b| b.location)
            .ok_or_else(|| ValidationError::UnknownBin {
                bin_id: req.bin_id.clone(),
            })?;
        let driver_loc: Option<GeoPoint> =
            self.store.location(&req.driver_id).map(|s| s.point());

        let distance_meters = proximity::verify(
            driver_loc.as_ref(),
            &bin_loc,
            self.cfg.max_collection_distance_meters,
        )?;

        let route_id = self.store.own_route_with_bin(&req.bin_id, &req.driver_id);
        let collection = wfd_collection::record(
            &mut self.store,
            self.audit.as_mut(),
            self.run_id,
            RecordRequest {
                bin_id: req.bin_id.clone(),
                driver_id: req.driver_id.clone(),
                route_id,
                auto_collection: false,
                verified_by_proximity: true,
                distance_meters: Some(distance_meters),
            },
            now_ms,
        )?;

        info!(
            bin_id = %collection.bin_id,
            driver_id = %collection.driver_id,
            distance_meters,
            "manual collection recorded"
        );
        let reconcile = self.finish_collection(&collection, now_ms);
        Ok(ManualCollectionOutcome {
            collection,
            reconcile,
        })
    }

    // -- flow: sensor reports -------------------------------------------------

    /// Before/after sensor report. Fires delayed attributions for fill-drops
    /// with in-window proximity evidence, then folds the remaining readings
    /// into bin state.
    pub fn handle_sensor_report(
        &mut self,
        prev: &[BinLevelReading],
        new: &[BinLevelReading],
    ) -> SensorReportOutcome {
        let now_ms = self.now_ms();
        let mut outcome = SensorReportOutcome::default();

        let decisions = self.tracker.on_sensor_report(
            prev,
            new,
            now_ms,
            self.cfg.attribution_window_ms(),
            self.cfg.cooldown_ms,
            &mut self.cooldowns,
        );

        let mut attributed_bins: Vec<BinId> = Vec::new();
        for decision in decisions {
            match self.resolve_nearby_driver(&decision.bin_id) {
                Some(driver_id) => {
                    let route_id = self.store.own_route_with_bin(&decision.bin_id, &driver_id);
                    match wfd_collection::record(
                        &mut self.store,
                        self.audit.as_mut(),
                        self.run_id,
                        RecordRequest {
                            bin_id: decision.bin_id.clone(),
                            driver_id: driver_id.clone(),
                            route_id,
                            auto_collection: true,
                            verified_by_proximity: false,
                            distance_meters: None,
                        },
                        now_ms,
                    ) {
                        Ok(collection) => {
                            info!(
                                bin_id = %decision.bin_id,
                                driver_id = %driver_id,
                                proximity_age_ms = decision.proximity_age_ms,
                                "auto-collection attributed"
                            );
                            self.audit_non_blocking(
                                ENGINE_TOPIC,
                                "attribution.auto",
                                json!({
                                    "bin_id": decision.bin_id,
                                    "driver_id": driver_id,
                                    "proximity_age_ms": decision.proximity_age_ms,
                                }),
                            );
                            let reconcile = self.finish_collection(&collection, now_ms);
                            attributed_bins.push(collection.bin_id.clone());
                            outcome.attributed.push(ManualCollectionOutcome {
                                collection,
                                reconcile,
                            });
                        }
                        Err(err) => {
                            // Attribution evidence pointed at an invalid actor
                            // (e.g. the nearest user is not a driver). Skip.
                            warn!(bin_id = %decision.bin_id, %err, "auto-attribution rejected");
                            outcome.skipped_bins.push(decision.bin_id.clone());
                        }
                    }
                }
                None => {
                    warn!(
                        bin_id = %decision.bin_id,
                        "fill-drop in window but no nearby driver sample; skipping attribution"
                    );
                    self.audit_non_blocking(
                        ENGINE_TOPIC,
                        "attribution.skipped",
                        json!({ "bin_id": decision.bin_id.clone() }),
                    );
                    outcome.skipped_bins.push(decision.bin_id.clone());
                }
            }
        }

        // Non-collection fill changes: fold the new readings into bin state.
        // Bins just attributed stay at 0: their reading described the state
        // before the reset.
        for reading in new {
            if attributed_bins.contains(&reading.bin_id) {
                continue;
            }
            if let Some(bin) = self.store.bin_mut(&reading.bin_id) {
                if bin.fill_level != reading.fill_level {
                    bin.set_fill_level(reading.fill_level);
                    self.pending.mark_bin(reading.bin_id.clone());
                }
            }
        }

        outcome
    }

    // -- flow: sync cycle -----------------------------------------------------

    /// Push the pending delta (best-effort), then pull and merge under the
    /// completion guard. Either half failing is fail-open: local state is
    /// kept and the next cycle retries.
    pub fn sync_cycle(&mut self) -> SyncCycleReport {
        let now_ms = self.now_ms();
        let mut report = SyncCycleReport::default();

        if !self.pending.is_empty() {
            report.push_attempted = true;
            let delta = self.pending.build(&self.store);
            match self.remote.push_partial(&delta) {
                Ok(()) => {
                    report.push_ok = true;
                    self.pending.clear();
                }
                Err(err) => {
                    warn!(%err, "sync push failed; local state kept, will retry");
                    self.audit_non_blocking(
                        ENGINE_TOPIC,
                        "sync.push_failed",
                        json!({ "error": err.to_string() }),
                    );
                }
            }
        }

        match self.remote.pull_full() {
            Ok(snapshot) => {
                let pull = apply_pull(
                    &mut self.store,
                    &self.guard,
                    snapshot,
                    now_ms,
                    self.cfg.completion_guard_ms,
                );
                self.audit_non_blocking(
                    ENGINE_TOPIC,
                    "sync.pull_applied",
                    json!({
                        "bins_applied": pull.bins_applied,
                        "routes_applied": pull.routes_applied,
                        "routes_guarded": pull.routes_guarded.clone(),
                        "collections_appended": pull.collections_appended,
                    }),
                );
                report.pull_ok = true;
                report.pull = Some(pull);
            }
            Err(err) => {
                warn!(%err, "sync pull failed; local state kept");
            }
        }

        // Lazy GC of the transient maps rides on the sync tick.
        self.guard.prune_expired(now_ms, self.cfg.completion_guard_ms);
        self.cooldowns.prune_expired(now_ms, self.cfg.cooldown_ms);
        self.tracker.prune_stale(now_ms, self.cfg.attribution_window_ms());

        report
    }

    // -- internals ------------------------------------------------------------

    /// Post-record steps shared by the manual and auto paths, in causal
    /// order: cooldown stamp, route reconciliation, completion guard, then
    /// queueing for push.
    fn finish_collection(&mut self, collection: &Collection, now_ms: i64) -> ReconcileOutcome {
        // Every successful collection stamps the cooldown: a manual
        // mark-collected must suppress the sensor-triggered attribution for
        // the same physical emptying.
        self.cooldowns.set_cooldown(collection.bin_id.clone(), now_ms);

        let reconcile = wfd_reconcile::reconcile(
            &mut self.store,
            self.audit.as_mut(),
            self.run_id,
            &collection.bin_id,
            &collection.driver_id,
            now_ms,
        );

        for route_id in &reconcile.completed {
            self.guard
                .note_completion(route_id.clone(), RouteStatus::Completed, now_ms);
            self.pending.mark_route(route_id.clone());
        }
        for route_id in &reconcile.updated {
            self.pending.mark_route(route_id.clone());
        }
        self.pending.mark_bin(collection.bin_id.clone());
        self.pending.queue_collection(collection.clone());

        reconcile
    }

    /// Resolve which driver a bin-keyed attribution credits: the most recent
    /// location sample within `near_bin_meters` of the bin. Bin-keyed
    /// evidence cannot distinguish two drivers near the same bin inside the
    /// window; the freshest sample wins, wrong-driver credit included.
    fn resolve_nearby_driver(&self, bin_id: &str) -> Option<DriverId> {
        let bin_loc = self.store.bin(bin_id)?.location;
        self.store
            .locations()
            .filter(|s| {
                proximity::haversine_meters(&s.point(), &bin_loc) <= self.cfg.near_bin_meters
            })
            .max_by_key(|s| s.ts_ms)
            .map(|s| s.driver_id.clone())
    }

    fn audit_non_blocking(&mut self, topic: &str, event_type: &str, payload: serde_json::Value) {
        if let Err(err) = self.audit.append(self.run_id, topic, event_type, payload) {
            warn!(%topic, %err, "audit append failed");
        }
    }
}
