use serde::Serialize;
use tandem_core::request::{PassengerRequest, RequestStatus};
use tandem_core::trip::Trip;
use tandem_shared::Coord;
use uuid::Uuid;

/// The driver's next actionable stop on an active trip.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NextStop {
    Pickup {
        request_id: Uuid,
        rider_id: String,
        location: Coord,
        /// True until the rider confirms they are at the pickup point; the
        /// driver surface blocks the confirm action without treating this
        /// as a failure.
        awaiting_rider_confirmation: bool,
    },
    Dropoff {
        request_id: Uuid,
        rider_id: String,
        location: Coord,
    },
    /// Every passenger is picked up and dropped off.
    Idle,
}

/// Resolve the driver's next stop. All pickups are handled before any
/// dropoff; within each phase, requests are served in acceptance order.
/// Ordering is intentionally not geospatially optimized.
pub fn next_stop(trip: &Trip, requests: &[PassengerRequest]) -> NextStop {
    let mut active: Vec<&PassengerRequest> = requests
        .iter()
        .filter(|r| r.status.occupies_seat())
        .collect();
    active.sort_by(|a, b| {
        let a_key = a.accepted_at.unwrap_or(a.created_at);
        let b_key = b.accepted_at.unwrap_or(b.created_at);
        a_key.cmp(&b_key).then(a.id.cmp(&b.id))
    });

    if let Some(pickup) = active.iter().find(|r| r.status == RequestStatus::Accepted) {
        return NextStop::Pickup {
            request_id: pickup.id,
            rider_id: pickup.rider_id.clone(),
            location: pickup.pickup,
            awaiting_rider_confirmation: pickup.rider_pickup_confirmed_at.is_none(),
        };
    }

    if let Some(dropoff) = active.iter().find(|r| r.status == RequestStatus::OnTrip) {
        return NextStop::Dropoff {
            request_id: dropoff.id,
            rider_id: dropoff.rider_id.clone(),
            location: dropoff.dropoff_or(trip.destination),
        };
    }

    NextStop::Idle
}
