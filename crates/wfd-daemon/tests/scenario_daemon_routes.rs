//! In-process scenario tests for wfd-daemon HTTP endpoints.
//!
//! The Axum router is driven via `tower::ServiceExt::oneshot` — no TCP
//! socket, no network IO. The engine behind the router uses the testkit
//! doubles, so every response is deterministic.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt; // oneshot

use wfd_config::EngineConfig;
use wfd_daemon::{routes, state};
use wfd_runtime::CollectionEngine;
use wfd_testkit::{bin_at, driver, location, route_with_bins, FakeRemote, ManualClock, SharedAudit};

fn make_router() -> axum::Router {
    let clock = ManualClock::new(0);
    let mut engine = CollectionEngine::new(
        EngineConfig::default(),
        Box::new(SharedAudit::new()),
        Box::new(FakeRemote::new()),
        clock.as_clock(),
    );
    engine.seed_bin(bin_at("B1", 25.0, 51.0, 90));
    engine.seed_driver(driver("D1"));
    engine.seed_route(route_with_bins("R1", "D1", &["B1"]));
    engine.handle_location_sample(location("D1", 25.0, 51.0, 0));

    routes::build_router(Arc::new(state::AppState::new(engine)))
}

async fn call(
    router: axum::Router,
    req: Request<axum::body::Body>,
) -> (StatusCode, serde_json::Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).expect("body is not valid JSON")
    };
    (status, json)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_returns_200_ok_true() {
    let req = Request::builder()
        .method("GET")
        .uri("/v1/health")
        .body(axum::body::Body::empty())
        .unwrap();

    let (status, json) = call(make_router(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "wfd-daemon");
}

#[tokio::test]
async fn manual_collection_within_range_returns_outcome() {
    let body = serde_json::json!({ "bin_id": "B1", "driver_id": "D1" });
    let (status, json) = call(make_router(), post_json("/v1/collections/manual", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["collection"]["bin_id"], "B1");
    assert_eq!(json["collection"]["original_fill_level"], 90);
    assert_eq!(json["reconcile"]["completed"][0], "R1");
}

#[tokio::test]
async fn manual_collection_too_far_is_422_proximity() {
    let router = make_router();

    // Move the driver out of range first.
    let far = serde_json::json!({
        "driver_id": "D1", "lat": 26.0, "lng": 52.0, "ts_ms": 1000
    });
    let (status, _) = call(router.clone(), post_json("/v1/locations", far)).await;
    assert_eq!(status, StatusCode::OK);

    let body = serde_json::json!({ "bin_id": "B1", "driver_id": "D1" });
    let (status, json) = call(router, post_json("/v1/collections/manual", body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["kind"], "proximity");
}

#[tokio::test]
async fn unknown_bin_is_422_validation() {
    let body = serde_json::json!({ "bin_id": "B404", "driver_id": "D1" });
    let (status, json) = call(make_router(), post_json("/v1/collections/manual", body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["kind"], "validation");
}

#[tokio::test]
async fn sensor_report_round_trips_through_the_engine() {
    let router = make_router();

    let body = serde_json::json!({
        "prev": [{ "bin_id": "B1", "fill_level": 90 }],
        "new":  [{ "bin_id": "B1", "fill_level": 2 }]
    });
    let (status, json) = call(router.clone(), post_json("/v1/sensors/report", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["attributed"].as_array().unwrap().len(), 1);

    let req = Request::builder()
        .method("GET")
        .uri("/v1/bins")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, json) = call(router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["fill_level"], 0);
}
