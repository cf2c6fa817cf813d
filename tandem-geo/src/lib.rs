pub mod bounded;
pub mod haversine;
#[cfg(feature = "osrm")]
pub mod osrm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tandem_shared::Coord;

pub use bounded::BoundedEstimator;
pub use haversine::HaversineEstimator;

/// Distance and travel-duration estimate between two points or along a
/// sequence of legs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_sec: u32,
}

impl RouteEstimate {
    pub const ZERO: RouteEstimate = RouteEstimate {
        distance_km: 0.0,
        duration_sec: 0,
    };

    pub fn add(self, other: RouteEstimate) -> RouteEstimate {
        RouteEstimate {
            distance_km: self.distance_km + other.distance_km,
            duration_sec: self.duration_sec + other.duration_sec,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EstimatorError {
    #[error("route estimate timed out")]
    Timeout,

    #[error("no route between the given points")]
    NoRoute,

    #[error("routing backend failure: {0}")]
    Backend(String),
}

/// Narrow contract over the external routing collaborator. The engine only
/// ever needs point-to-point and multi-leg estimates; everything else the
/// backend offers stays outside this seam.
#[async_trait]
pub trait RouteEstimator: Send + Sync {
    async fn estimate(&self, origin: Coord, destination: Coord)
        -> Result<RouteEstimate, EstimatorError>;

    /// Estimate a route visiting `legs` in order, as the sum of consecutive
    /// point-to-point estimates.
    async fn estimate_route(&self, legs: &[Coord]) -> Result<RouteEstimate, EstimatorError> {
        let mut total = RouteEstimate::ZERO;
        for pair in legs.windows(2) {
            total = total.add(self.estimate(pair[0], pair[1]).await?);
        }
        Ok(total)
    }
}
