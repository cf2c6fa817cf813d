use async_trait::async_trait;
use tandem_shared::Coord;

use crate::{EstimatorError, RouteEstimate, RouteEstimator};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers.
pub fn haversine_km(a: Coord, b: Coord) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Offline estimator: great-circle distance inflated by a road-curvature
/// factor, duration from a flat average speed. Deterministic, which makes it
/// the default for tests and local development; production wires a routing
/// backend behind the same trait.
#[derive(Debug, Clone)]
pub struct HaversineEstimator {
    /// Multiplier applied to the great-circle distance to approximate road
    /// distance.
    pub road_factor: f64,
    pub avg_speed_kmh: f64,
}

impl Default for HaversineEstimator {
    fn default() -> Self {
        Self {
            road_factor: 1.3,
            avg_speed_kmh: 40.0,
        }
    }
}

#[async_trait]
impl RouteEstimator for HaversineEstimator {
    async fn estimate(
        &self,
        origin: Coord,
        destination: Coord,
    ) -> Result<RouteEstimate, EstimatorError> {
        if !origin.is_valid() || !destination.is_valid() {
            return Err(EstimatorError::NoRoute);
        }

        let distance_km = haversine_km(origin, destination) * self.road_factor;
        let duration_sec = (distance_km / self.avg_speed_kmh * 3600.0).round() as u32;

        Ok(RouteEstimate {
            distance_km,
            duration_sec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Hamilton city hall to McMaster campus, roughly 4.4 km great-circle
        let a = Coord::new(43.2557, -79.8711);
        let b = Coord::new(43.2609, -79.9192);
        let d = haversine_km(a, b);
        assert!((3.5..5.0).contains(&d), "unexpected distance {d}");
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = Coord::new(43.25, -79.92);
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[tokio::test]
    async fn test_estimate_scales_with_speed() {
        let slow = HaversineEstimator {
            road_factor: 1.0,
            avg_speed_kmh: 20.0,
        };
        let fast = HaversineEstimator {
            road_factor: 1.0,
            avg_speed_kmh: 40.0,
        };
        let a = Coord::new(43.2557, -79.8711);
        let b = Coord::new(43.2609, -79.9192);

        let s = slow.estimate(a, b).await.unwrap();
        let f = fast.estimate(a, b).await.unwrap();
        assert_eq!(s.distance_km, f.distance_km);
        assert!(s.duration_sec > f.duration_sec);
    }

    #[tokio::test]
    async fn test_estimate_rejects_invalid_coords() {
        let est = HaversineEstimator::default();
        let bad = Coord::new(200.0, 0.0);
        let ok = Coord::new(43.25, -79.92);
        assert!(est.estimate(bad, ok).await.is_err());
    }

    #[tokio::test]
    async fn test_multi_leg_route_sums_legs() {
        let est = HaversineEstimator::default();
        let a = Coord::new(43.25, -79.92);
        let b = Coord::new(43.26, -79.90);
        let c = Coord::new(43.27, -79.88);

        let direct = est.estimate(a, c).await.unwrap();
        let via = est.estimate_route(&[a, b, c]).await.unwrap();
        // A detour through b cannot be shorter than the direct leg
        assert!(via.distance_km >= direct.distance_km);
    }
}
