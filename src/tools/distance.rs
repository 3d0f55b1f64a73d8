//! Great-circle distance and travel time estimates

use crate::error::ToolError;
use crate::models::Coordinates;
use crate::tools::ToolResult;
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0088;
const KM_TO_MILES: f64 = 0.621371;

// Average speeds in km/h
const WALKING_KMH: f64 = 5.0;
const CYCLING_KMH: f64 = 15.0;
const PUBLIC_TRANSPORT_KMH: f64 = 30.0;
const DRIVING_KMH: f64 = 50.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DistanceEstimate {
    pub distance_km: f64,
    pub distance_miles: f64,
    pub walking_hours: f64,
    pub cycling_hours: f64,
    pub public_transport_hours: f64,
    pub driving_hours: f64,
}

impl DistanceEstimate {
    /// Practical travel time inside a city: walk short hops, ride the rest.
    pub fn travel_hours(&self) -> f64 {
        if self.distance_km <= 2.0 {
            self.walking_hours
        } else {
            self.public_transport_hours
        }
    }
}

/// Distance between two points. Pure; fails only on invalid coordinates.
pub fn calculate_distance(a: Coordinates, b: Coordinates) -> ToolResult<DistanceEstimate> {
    for point in [a, b] {
        if !point.is_valid() {
            return Err(ToolError::InvalidCoordinate {
                lat: point.lat,
                lon: point.lon,
            });
        }
    }

    let distance_km = haversine_km(a, b);

    Ok(DistanceEstimate {
        distance_km: round2(distance_km),
        distance_miles: round2(distance_km * KM_TO_MILES),
        walking_hours: round2(distance_km / WALKING_KMH),
        cycling_hours: round2(distance_km / CYCLING_KMH),
        public_transport_hours: round2(distance_km / PUBLIC_TRANSPORT_KMH),
        driving_hours: round2(distance_km / DRIVING_KMH),
    })
}

fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_distance() {
        // Eiffel Tower to the Louvre, roughly 3.2 km
        let eiffel = Coordinates::new(48.8584, 2.2945);
        let louvre = Coordinates::new(48.8606, 2.3376);
        let d = calculate_distance(eiffel, louvre).unwrap();

        assert!((d.distance_km - 3.16).abs() < 0.1, "got {}", d.distance_km);
        assert!(d.walking_hours > d.driving_hours);
        assert!((d.distance_miles - d.distance_km * KM_TO_MILES).abs() < 0.02);
        assert_eq!(d.travel_hours(), d.public_transport_hours);
    }

    #[test]
    fn test_same_point_is_zero() {
        let p = Coordinates::new(35.6762, 139.6503);
        let d = calculate_distance(p, p).unwrap();
        assert_eq!(d.distance_km, 0.0);
        assert_eq!(d.travel_hours(), 0.0);
    }

    #[test]
    fn test_invalid_coordinate() {
        let good = Coordinates::new(0.0, 0.0);
        let bad = Coordinates::new(120.0, 0.0);
        assert_eq!(
            calculate_distance(good, bad),
            Err(ToolError::InvalidCoordinate { lat: 120.0, lon: 0.0 })
        );
    }
}
