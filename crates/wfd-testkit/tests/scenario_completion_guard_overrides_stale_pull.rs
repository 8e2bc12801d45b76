//! Replication lag: the server can still report a route as pending seconds
//! after it completed locally. Inside the 60-second guard the local
//! completion wins; after expiry the server is authoritative again.

use wfd_schemas::{ManualCollectionRequest, RemoteSnapshot, RouteStatus};
use wfd_testkit::{bin_at, driver, location, route_with_bins, EngineHarness};

#[test]
fn local_completion_survives_stale_pull_inside_guard_window() {
    let mut h = EngineHarness::with_defaults();
    h.engine.seed_bin(bin_at("B1", 25.0, 51.0, 90));
    h.engine.seed_driver(driver("D1"));
    h.engine.seed_route(route_with_bins("R1", "D1", &["B1"]));

    h.engine.handle_location_sample(location("D1", 25.0, 51.0, 0));
    let outcome = h
        .engine
        .handle_manual_collection(ManualCollectionRequest {
            bin_id: "B1".to_string(),
            driver_id: "D1".to_string(),
        })
        .unwrap();
    assert_eq!(outcome.reconcile.completed, vec!["R1".to_string()]);

    // The server lags: its snapshot still carries the pre-collection route.
    h.remote.set_snapshot(RemoteSnapshot {
        routes: vec![route_with_bins("R1", "D1", &["B1"])],
        ..Default::default()
    });

    // T+5s: pull inside the guard window keeps the local completion.
    h.clock.set(5_000);
    let report = h.engine.sync_cycle();
    let pull = report.pull.expect("pull applied");
    assert_eq!(pull.routes_guarded, vec!["R1".to_string()]);
    assert_eq!(
        h.engine.store().route("R1").unwrap().status,
        RouteStatus::Completed
    );

    // T+61s: the guard expired; the server (still stale in this test) wins.
    h.clock.set(61_000);
    let report = h.engine.sync_cycle();
    let pull = report.pull.expect("pull applied");
    assert!(pull.routes_guarded.is_empty());
    assert_eq!(
        h.engine.store().route("R1").unwrap().status,
        RouteStatus::Pending
    );
}
