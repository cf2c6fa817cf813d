use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_shared::Coord;
use uuid::Uuid;

/// How the rider wants candidates weighted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceMode {
    #[default]
    Default,
    CostPriority,
    ComfortPriority,
}

/// A rider's search for trips heading their way.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchQuery {
    pub rider_id: String,
    pub origin: Coord,
    pub destination: Coord,
    pub desired_arrival: DateTime<Utc>,
    #[serde(default = "one_seat")]
    pub seats_needed: u8,
    #[serde(default)]
    pub preference: PreferenceMode,
    /// Adds deterministic synthetic candidates for designated test accounts.
    /// Ignored for everyone else and never affects regular scoring.
    #[serde(default)]
    pub include_synthetic: bool,
}

fn one_seat() -> u8 {
    1
}

/// Per-component scores, all in [0, 1], kept on the match for debugging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub schedule: f64,
    pub detour: f64,
    pub cost: f64,
    pub preferences: f64,
    pub seat_slack: f64,
}

/// A ranked candidate trip. Ephemeral: recomputed on every query, never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RideMatch {
    pub trip_id: Uuid,
    pub driver_id: String,
    pub departure_time: DateTime<Utc>,
    pub available_seats: u8,
    pub estimated_cost_cents: i64,
    pub estimated_distance_km: f64,
    pub estimated_duration_sec: u32,
    pub detour_seconds: u32,
    /// Compatibility score scaled to 0..=100.
    pub match_percentage: u8,
    pub synthetic: bool,
    pub breakdown: ScoreBreakdown,
}
