use uuid::Uuid;

/// Trip lifecycle events handed to the notification dispatcher.
/// Delivery is best-effort; producers never block on these.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TripEvent {
    RequestAccepted {
        trip_id: Uuid,
        request_id: Uuid,
        rider_id: String,
    },
    RequestRejected {
        trip_id: Uuid,
        request_id: Uuid,
        rider_id: String,
    },
    TripStarted {
        trip_id: Uuid,
        rider_ids: Vec<String>,
    },
    TripCancelled {
        trip_id: Uuid,
        rider_ids: Vec<String>,
    },
    TripCompleted {
        trip_id: Uuid,
        rider_ids: Vec<String>,
        total_earnings_cents: i64,
    },
}

impl TripEvent {
    pub fn trip_id(&self) -> Uuid {
        match self {
            TripEvent::RequestAccepted { trip_id, .. }
            | TripEvent::RequestRejected { trip_id, .. }
            | TripEvent::TripStarted { trip_id, .. }
            | TripEvent::TripCancelled { trip_id, .. }
            | TripEvent::TripCompleted { trip_id, .. } => *trip_id,
        }
    }
}
