use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One passenger's share of a settled trip. The amount is the fare locked in
/// when the request was created, not a completion-time recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerFare {
    pub request_id: Uuid,
    pub rider_id: String,
    pub fare_cents: i64,
}

/// The final fare/earnings computation, produced exactly once per trip at the
/// in_progress -> completed transition and stored with it. Re-completing a
/// trip returns this stored object unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub trip_id: Uuid,
    /// None when the trip has no recorded start time.
    pub duration_minutes: Option<i64>,
    pub total_distance_km: f64,
    pub per_passenger: Vec<PassengerFare>,
    pub platform_fee_cents: i64,
    pub total_earnings_cents: i64,
    pub settled_at: DateTime<Utc>,
}

impl Settlement {
    pub fn fare_total_cents(&self) -> i64 {
        self.per_passenger.iter().map(|p| p.fare_cents).sum()
    }

    pub fn passenger_count(&self) -> usize {
        self.per_passenger.len()
    }
}
