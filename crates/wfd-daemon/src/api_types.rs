//! Request/response bodies owned by the HTTP surface.

use serde::{Deserialize, Serialize};
use wfd_schemas::BinLevelReading;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// Body of `POST /v1/sensors/report`: the before/after array pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReportBody {
    pub prev: Vec<BinLevelReading>,
    pub new: Vec<BinLevelReading>,
}

/// Uniform refusal payload for validation and proximity errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefusedResponse {
    pub error: String,
    /// "validation" | "proximity"
    pub kind: String,
}

/// Body of `POST /v1/locations` responses: which bins the sample stamped as
/// near-bin proximity events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationAccepted {
    pub stamped_bins: Vec<String>,
}
