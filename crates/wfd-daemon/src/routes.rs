//! Axum router and all HTTP handlers for wfd-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)`-free on purpose: the
//! scenario tests in `tests/` compose the router directly.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use wfd_runtime::CollectError;
use wfd_schemas::{Bin, DriverLocationSample, ManualCollectionRequest, Route};

use crate::api_types::{HealthResponse, LocationAccepted, RefusedResponse, SensorReportBody};
use crate::state::AppState;

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are not applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/bins", get(list_bins))
        .route("/v1/routes", get(list_routes))
        .route("/v1/locations", post(post_location))
        .route("/v1/sensors/report", post(post_sensor_report))
        .route("/v1/collections/manual", post(post_manual_collection))
        .with_state(state)
}

async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

async fn list_bins(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let engine = st.engine.lock().await;
    let bins: Vec<Bin> = engine.store().bins().cloned().collect();
    (StatusCode::OK, Json(bins))
}

async fn list_routes(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let engine = st.engine.lock().await;
    let routes: Vec<Route> = engine.store().routes().cloned().collect();
    (StatusCode::OK, Json(routes))
}

async fn post_location(
    State(st): State<Arc<AppState>>,
    Json(sample): Json<DriverLocationSample>,
) -> impl IntoResponse {
    let mut engine = st.engine.lock().await;
    let stamped_bins = engine.handle_location_sample(sample);
    (StatusCode::OK, Json(LocationAccepted { stamped_bins }))
}

async fn post_sensor_report(
    State(st): State<Arc<AppState>>,
    Json(body): Json<SensorReportBody>,
) -> impl IntoResponse {
    let mut engine = st.engine.lock().await;
    let outcome = engine.handle_sensor_report(&body.prev, &body.new);
    info!(
        attributed = outcome.attributed.len(),
        skipped = outcome.skipped_bins.len(),
        "sensor report processed"
    );
    (StatusCode::OK, Json(outcome))
}

async fn post_manual_collection(
    State(st): State<Arc<AppState>>,
    Json(req): Json<ManualCollectionRequest>,
) -> Response {
    let mut engine = st.engine.lock().await;
    match engine.handle_manual_collection(req) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => {
            let kind = match &err {
                CollectError::Validation(_) => "validation",
                CollectError::Proximity(_) => "proximity",
            };
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(RefusedResponse {
                    error: err.to_string(),
                    kind: kind.to_string(),
                }),
            )
                .into_response()
        }
    }
}
