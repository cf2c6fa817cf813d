use std::time::Duration;

use async_trait::async_trait;
use tandem_shared::Coord;

use crate::{EstimatorError, RouteEstimate, RouteEstimator};

/// Wraps any estimator with a hard per-call timeout so no core operation can
/// block on the routing collaborator indefinitely. Elapsed calls surface as
/// `EstimatorError::Timeout`, which matching treats as a per-candidate drop.
pub struct BoundedEstimator<E> {
    inner: E,
    timeout: Duration,
}

impl<E> BoundedEstimator<E> {
    pub fn new(inner: E, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<E: RouteEstimator> RouteEstimator for BoundedEstimator<E> {
    async fn estimate(
        &self,
        origin: Coord,
        destination: Coord,
    ) -> Result<RouteEstimate, EstimatorError> {
        match tokio::time::timeout(self.timeout, self.inner.estimate(origin, destination)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "route estimate timed out");
                Err(EstimatorError::Timeout)
            }
        }
    }
}
