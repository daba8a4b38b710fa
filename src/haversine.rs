//! Haversine distance estimator (fallback when OSRM unavailable).
//!
//! Uses great-circle distance to estimate travel time.
//! Less accurate than OSRM (ignores roads) but always available.

use crate::model::GeoPoint;

/// Average truck speed assumption for time estimation.
pub const DEFAULT_SPEED_KMH: f64 = 50.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers.
///
/// Pure and total: callers filter out sentinel coordinates beforehand.
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lng = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Straight-line estimator.
///
/// Estimates travel time using straight-line distance and an assumed speed.
#[derive(Debug, Clone, Copy)]
pub struct HaversineEstimator {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineEstimator {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineEstimator {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Convert distance in km to travel time in hours.
    pub fn km_to_hours(&self, km: f64) -> f64 {
        if self.speed_kmh > 0.0 {
            km / self.speed_kmh
        } else {
            0.0
        }
    }

    /// Distance (km) and duration (hours) between two points.
    pub fn estimate(&self, from: GeoPoint, to: GeoPoint) -> (f64, f64) {
        let km = haversine_km(from, to);
        (km, self.km_to_hours(km))
    }

    /// Distance and duration along an ordered list of points.
    pub fn path(&self, points: &[GeoPoint]) -> (f64, f64) {
        let km: f64 = points
            .windows(2)
            .map(|pair| haversine_km(pair[0], pair[1]))
            .sum();
        (km, self.km_to_hours(km))
    }
}
