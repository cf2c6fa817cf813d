use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_shared::Coord;
use uuid::Uuid;

use crate::error::Error;

/// Passenger request status. Terminal: `Rejected`, `Cancelled`, `Completed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    OnTrip,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
            RequestStatus::OnTrip => "on_trip",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Rejected | RequestStatus::Cancelled | RequestStatus::Completed
        )
    }

    /// Statuses that hold a seat on the trip. The trip invariant is
    /// `booked_seats == count(requests where occupies_seat())`.
    pub fn occupies_seat(&self) -> bool {
        matches!(
            self,
            RequestStatus::Accepted | RequestStatus::OnTrip | RequestStatus::Completed
        )
    }

    /// The exhaustive transition table for passenger requests.
    pub fn can_transition(&self, to: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, to),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Accepted, Cancelled)
                | (Accepted, OnTrip)
                | (OnTrip, Completed)
        )
    }

    /// Seat-count delta implied by a transition into/out of a seat-holding
    /// status. Completed keeps its seat, so dropoff is delta zero.
    pub fn seat_delta(&self, to: RequestStatus) -> i16 {
        i16::from(to.occupies_seat()) - i16::from(self.occupies_seat())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "rejected" => Ok(RequestStatus::Rejected),
            "on_trip" => Ok(RequestStatus::OnTrip),
            "completed" => Ok(RequestStatus::Completed),
            "cancelled" => Ok(RequestStatus::Cancelled),
            other => Err(Error::Validation(format!("unknown request status: {other}"))),
        }
    }
}

/// A rider's seat booking on a trip, with the fare estimate locked in at
/// request time so completion never reprices a ride mid-flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerRequest {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub rider_id: String,
    pub pickup: Coord,
    /// Absent means the rider gets off at the trip destination.
    pub dropoff: Option<Coord>,
    pub estimated_distance_km: Option<f64>,
    pub estimated_duration_sec: Option<u32>,
    pub estimated_detour_sec: Option<u32>,
    pub estimated_cost_cents: i64,
    pub status: RequestStatus,
    pub rider_pickup_confirmed_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PassengerRequest {
    pub fn new(trip_id: Uuid, rider_id: String, pickup: Coord, dropoff: Option<Coord>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trip_id,
            rider_id,
            pickup,
            dropoff,
            estimated_distance_km: None,
            estimated_duration_sec: None,
            estimated_detour_sec: None,
            estimated_cost_cents: 0,
            status: RequestStatus::Pending,
            rider_pickup_confirmed_at: None,
            accepted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status transition, or report the conflict.
    pub fn transition(&mut self, to: RequestStatus, action: &'static str) -> Result<(), Error> {
        if !self.status.can_transition(to) {
            return Err(Error::StateConflict {
                entity: "request",
                state: self.status.as_str(),
                action,
            });
        }
        if to == RequestStatus::Accepted {
            self.accepted_at = Some(Utc::now());
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Dropoff coordinate with the trip-destination fallback applied.
    pub fn dropoff_or(&self, trip_destination: Coord) -> Coord {
        self.dropoff.unwrap_or(trip_destination)
    }
}
