use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_shared::Coord;
use uuid::Uuid;

use crate::error::Error;

/// Trip status in the lifecycle.
///
/// `Pending` trips have no accepted riders yet; the first acceptance moves
/// them to `Active`. `InProgress` is entered by an explicit driver start and
/// left when every passenger request is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Pending,
    Active,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Pending => "pending",
            TripStatus::Active => "active",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// Whether riders may still file requests against the trip.
    pub fn accepts_requests(&self) -> bool {
        matches!(self, TripStatus::Pending | TripStatus::Active)
    }

    /// The exhaustive transition table. Everything not listed here is a
    /// state conflict, caught centrally instead of at call sites.
    pub fn can_transition(&self, to: TripStatus) -> bool {
        use TripStatus::*;
        matches!(
            (self, to),
            (Pending, Active)
                | (Active, InProgress)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (Active, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl std::str::FromStr for TripStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TripStatus::Pending),
            "active" => Ok(TripStatus::Active),
            "in_progress" => Ok(TripStatus::InProgress),
            "completed" => Ok(TripStatus::Completed),
            "cancelled" => Ok(TripStatus::Cancelled),
            other => Err(Error::Validation(format!("unknown trip status: {other}"))),
        }
    }
}

/// A driver's published trip: the capacity and schedule riders match against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: String,
    pub origin: Coord,
    pub origin_address: Option<String>,
    pub destination: Coord,
    pub destination_address: Option<String>,
    pub departure_time: DateTime<Utc>,
    pub max_seats: u8,
    pub booked_seats: u8,
    /// Driver's stated detour tolerance, feeds the match scorer.
    pub detour_tolerance_min: u16,
    /// Origin-to-destination estimate captured at creation; settlement's
    /// fallback when a request carries no distance of its own.
    pub estimated_distance_km: Option<f64>,
    pub status: TripStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for publishing a trip.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub origin: Coord,
    pub origin_address: Option<String>,
    pub destination: Coord,
    pub destination_address: Option<String>,
    pub departure_time: DateTime<Utc>,
    pub max_seats: u8,
    pub detour_tolerance_min: Option<u16>,
}

impl Trip {
    pub fn new(driver_id: String, input: NewTrip, default_detour_tolerance_min: u16) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            driver_id,
            origin: input.origin,
            origin_address: input.origin_address,
            destination: input.destination,
            destination_address: input.destination_address,
            departure_time: input.departure_time,
            max_seats: input.max_seats,
            booked_seats: 0,
            detour_tolerance_min: input
                .detour_tolerance_min
                .unwrap_or(default_detour_tolerance_min),
            estimated_distance_km: None,
            status: TripStatus::Pending,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn available_seats(&self) -> u8 {
        self.max_seats.saturating_sub(self.booked_seats)
    }

    /// Apply a status transition, or report the conflict.
    pub fn transition(&mut self, to: TripStatus, action: &'static str) -> Result<(), Error> {
        if !self.status.can_transition(to) {
            return Err(Error::StateConflict {
                entity: "trip",
                state: self.status.as_str(),
                action,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
