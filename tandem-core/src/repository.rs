use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::preferences::RiderPreferences;
use crate::request::PassengerRequest;
use crate::settlement::Settlement;
use crate::trip::Trip;

/// Departure-time window used when generating match candidates.
#[derive(Debug, Clone, Copy)]
pub struct DepartureWindow {
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

/// Data access seam for trips, passenger requests, and settlements.
///
/// Callers are expected to hold the owning trip's lock around any sequence of
/// reads and writes that must be consistent; the store additionally guards
/// the seat counter so a lost race with an outside writer cannot corrupt it.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn create_trip(&self, trip: &Trip) -> Result<(), Error>;

    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, Error>;

    /// Persist status/timestamp changes on a trip. Seat-count changes go
    /// through `apply_request_transition` instead.
    async fn save_trip(&self, trip: &Trip) -> Result<(), Error>;

    /// Trips still open for requests (pending/active, seats free) departing
    /// inside the window. Ordered by departure time.
    async fn list_open_trips(&self, window: DepartureWindow) -> Result<Vec<Trip>, Error>;

    async fn create_request(&self, request: &PassengerRequest) -> Result<(), Error>;

    async fn get_request(&self, id: Uuid) -> Result<Option<PassengerRequest>, Error>;

    async fn requests_for_trip(&self, trip_id: Uuid) -> Result<Vec<PassengerRequest>, Error>;

    async fn requests_for_rider(&self, rider_id: &str) -> Result<Vec<PassengerRequest>, Error>;

    /// Write the request row and apply `seat_delta` to the owning trip's
    /// seat counter as one atomic unit. The counter write is conditional on
    /// staying within `0..=max_seats`; a failed guard rolls back the request
    /// write too and surfaces `ConcurrencyConflict`. Returns the trip as it
    /// stands after the write.
    async fn apply_request_transition(
        &self,
        request: &PassengerRequest,
        seat_delta: i16,
    ) -> Result<Trip, Error>;

    async fn save_settlement(&self, settlement: &Settlement) -> Result<(), Error>;

    async fn get_settlement(&self, trip_id: Uuid) -> Result<Option<Settlement>, Error>;

    async fn preferences_for(&self, user_id: &str) -> Result<Option<RiderPreferences>, Error>;
}
