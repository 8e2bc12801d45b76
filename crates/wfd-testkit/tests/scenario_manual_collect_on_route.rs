//! A driver standing at a bin marks it collected: the collection is
//! proximity-verified, the bin resets, and the driver's route shrinks.

use wfd_schemas::{BinStatus, ManualCollectionRequest, RouteStatus};
use wfd_testkit::{bin_at, driver, location, route_with_bins, EngineHarness};

#[test]
fn manual_collect_succeeds_within_proximity() {
    let mut h = EngineHarness::with_defaults();
    h.engine.seed_bin(bin_at("B1", 25.00000, 51.00000, 90));
    h.engine.seed_bin(bin_at("B2", 25.10000, 51.10000, 40));
    h.engine.seed_driver(driver("D1"));
    h.engine
        .seed_route(route_with_bins("R1", "D1", &["B1", "B2"]));

    // ~7m from B1.
    h.engine
        .handle_location_sample(location("D1", 25.00005, 51.00005, 0));

    let outcome = h
        .engine
        .handle_manual_collection(ManualCollectionRequest {
            bin_id: "B1".to_string(),
            driver_id: "D1".to_string(),
        })
        .expect("collection should pass the proximity gate");

    let c = &outcome.collection;
    assert_eq!(c.original_fill_level, 90);
    assert!(c.verified_by_proximity);
    assert!(!c.auto_collection);
    assert_eq!(c.route_id.as_deref(), Some("R1"));
    let d = c.distance_meters.expect("distance recorded");
    assert!(d < 100.0, "measured distance should be well under the gate: {d}");

    let bin = h.engine.store().bin("B1").unwrap();
    assert_eq!(bin.fill_level, 0);
    assert_eq!(bin.status, BinStatus::Normal);

    let route = h.engine.store().route("R1").unwrap();
    assert_eq!(route.status, RouteStatus::InProgress);
    assert_eq!(route.bins, vec!["B2".to_string()]);
    assert_eq!(route.progress(), 0.5);
    assert_eq!(outcome.reconcile.updated, vec!["R1".to_string()]);

    // Record → reconcile → push, strictly in that order: the push happens on
    // the sync cycle and carries exactly what the flow dirtied.
    let report = h.engine.sync_cycle();
    assert!(report.push_ok);
    let pushed = h.remote.pushed();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].collections.len(), 1);
    assert_eq!(pushed[0].bins.len(), 1);
    assert_eq!(pushed[0].bins[0].fill_level, 0);
    assert_eq!(pushed[0].routes.len(), 1);

    // History streams got their entries.
    assert_eq!(h.audit.events_for_topic("driver/D1").len(), 1);
    assert_eq!(h.audit.events_for_topic("bin/B1").len(), 1);
}

#[test]
fn collection_off_route_is_ad_hoc() {
    let mut h = EngineHarness::with_defaults();
    h.engine.seed_bin(bin_at("B9", 25.0, 51.0, 60));
    h.engine.seed_driver(driver("D1"));

    h.engine.handle_location_sample(location("D1", 25.0, 51.0, 0));
    let outcome = h
        .engine
        .handle_manual_collection(ManualCollectionRequest {
            bin_id: "B9".to_string(),
            driver_id: "D1".to_string(),
        })
        .unwrap();

    assert_eq!(outcome.collection.route_id, None);
    assert!(outcome.reconcile.is_noop());
}
