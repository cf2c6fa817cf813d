use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tandem_shared::Coord;

use crate::{EstimatorError, RouteEstimate, RouteEstimator};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Thin HTTP client for an OSRM routing backend.
#[derive(Debug, Clone)]
pub struct OsrmEstimator {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
}

impl OsrmEstimator {
    /// Create a client for the given OSRM endpoint (e.g. `http://localhost:5000`).
    pub fn new(endpoint: &str) -> Result<Self, EstimatorError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| EstimatorError::Backend(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn route(&self, coords: &[Coord]) -> Result<RouteEstimate, EstimatorError> {
        let coord_segment = coords
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");

        let url = format!(
            "{}/route/v1/driving/{}?overview=false",
            self.endpoint, coord_segment
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    EstimatorError::Timeout
                } else {
                    EstimatorError::Backend(err.to_string())
                }
            })?;

        let parsed: OsrmRouteResponse = response
            .json()
            .await
            .map_err(|err| EstimatorError::Backend(err.to_string()))?;

        if parsed.code != "Ok" {
            return Err(EstimatorError::Backend(parsed.code));
        }
        let route = parsed.routes.first().ok_or(EstimatorError::NoRoute)?;

        Ok(RouteEstimate {
            distance_km: route.distance / 1000.0,
            duration_sec: route.duration.round() as u32,
        })
    }
}

#[async_trait]
impl RouteEstimator for OsrmEstimator {
    async fn estimate(
        &self,
        origin: Coord,
        destination: Coord,
    ) -> Result<RouteEstimate, EstimatorError> {
        self.route(&[origin, destination]).await
    }

    async fn estimate_route(&self, legs: &[Coord]) -> Result<RouteEstimate, EstimatorError> {
        if legs.len() < 2 {
            return Ok(RouteEstimate::ZERO);
        }
        // One routed request instead of per-leg summation.
        self.route(legs).await
    }
}
