//! GPS proximity verification for manual collections.
//!
//! Pure distance math, no side effects. Auto-collections never pass through
//! here: they are already evidence-based (sensor drop + prior proximity).

use wfd_schemas::GeoPoint;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Why a manual collection was refused at the proximity gate.
///
/// Fail-closed: any refusal means the collection is not recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum ProximityError {
    /// No location sample on file for the driver.
    MissingLocation,
    /// Driver is farther from the bin than the configured maximum.
    /// Carries the measured distance so the refusal is actionable.
    TooFar {
        distance_meters: f64,
        max_meters: f64,
    },
}

impl std::fmt::Display for ProximityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProximityError::MissingLocation => {
                write!(f, "PROXIMITY_REFUSED: no driver location on file")
            }
            ProximityError::TooFar {
                distance_meters,
                max_meters,
            } => write!(
                f,
                "PROXIMITY_REFUSED: driver is {distance_meters:.0}m from bin \
                 (max {max_meters:.0}m)"
            ),
        }
    }
}

impl std::error::Error for ProximityError {}

/// Great-circle distance between two coordinates in meters.
pub fn haversine_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_METERS * c
}

/// Gate a manual collection on driver-to-bin distance.
///
/// Returns the measured distance on success so the recorder can store it on
/// the Collection.
///
/// # Errors
///
/// [`ProximityError::MissingLocation`] when `driver_loc` is `None`;
/// [`ProximityError::TooFar`] when the measured distance exceeds `max_meters`.
pub fn verify(
    driver_loc: Option<&GeoPoint>,
    bin_loc: &GeoPoint,
    max_meters: f64,
) -> Result<f64, ProximityError> {
    let driver_loc = driver_loc.ok_or(ProximityError::MissingLocation)?;
    let distance_meters = haversine_meters(driver_loc, bin_loc);
    if distance_meters > max_meters {
        return Err(ProximityError::TooFar {
            distance_meters,
            max_meters,
        });
    }
    Ok(distance_meters)
}
