use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tandem_core::preferences::RiderPreferences;
use tandem_core::repository::{DepartureWindow, TripStore};
use tandem_core::request::PassengerRequest;
use tandem_core::settlement::Settlement;
use tandem_core::trip::Trip;
use tandem_core::Error;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    trips: HashMap<Uuid, Trip>,
    requests: HashMap<Uuid, PassengerRequest>,
    settlements: HashMap<Uuid, Settlement>,
    preferences: HashMap<String, RiderPreferences>,
}

/// HashMap-backed store for tests and local development. All writes go
/// through a single lock, so the seat-counter guard sees a consistent view.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed preferences for a user; profile management itself is outside the
    /// engine.
    pub fn set_preferences(&self, user_id: &str, prefs: RiderPreferences) {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.preferences.insert(user_id.to_string(), prefs);
    }
}

#[async_trait]
impl TripStore for MemoryStore {
    async fn create_trip(&self, trip: &Trip) -> Result<(), Error> {
        let mut inner = self.inner.write().map_err(Error::store)?;
        inner.trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, Error> {
        let inner = self.inner.read().map_err(Error::store)?;
        Ok(inner.trips.get(&id).cloned())
    }

    async fn save_trip(&self, trip: &Trip) -> Result<(), Error> {
        let mut inner = self.inner.write().map_err(Error::store)?;
        let stored = inner
            .trips
            .get_mut(&trip.id)
            .ok_or_else(|| Error::not_found("trip", trip.id))?;
        // Seat counts are owned by apply_request_transition.
        let booked_seats = stored.booked_seats;
        *stored = trip.clone();
        stored.booked_seats = booked_seats;
        Ok(())
    }

    async fn list_open_trips(&self, window: DepartureWindow) -> Result<Vec<Trip>, Error> {
        let inner = self.inner.read().map_err(Error::store)?;
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .filter(|t| {
                t.status.accepts_requests()
                    && t.available_seats() > 0
                    && t.departure_time >= window.from
                    && t.departure_time <= window.until
            })
            .cloned()
            .collect();
        trips.sort_by(|a, b| {
            a.departure_time
                .cmp(&b.departure_time)
                .then(a.id.cmp(&b.id))
        });
        Ok(trips)
    }

    async fn create_request(&self, request: &PassengerRequest) -> Result<(), Error> {
        let mut inner = self.inner.write().map_err(Error::store)?;
        if !inner.trips.contains_key(&request.trip_id) {
            return Err(Error::not_found("trip", request.trip_id));
        }
        inner.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<PassengerRequest>, Error> {
        let inner = self.inner.read().map_err(Error::store)?;
        Ok(inner.requests.get(&id).cloned())
    }

    async fn requests_for_trip(&self, trip_id: Uuid) -> Result<Vec<PassengerRequest>, Error> {
        let inner = self.inner.read().map_err(Error::store)?;
        let mut requests: Vec<PassengerRequest> = inner
            .requests
            .values()
            .filter(|r| r.trip_id == trip_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(requests)
    }

    async fn requests_for_rider(&self, rider_id: &str) -> Result<Vec<PassengerRequest>, Error> {
        let inner = self.inner.read().map_err(Error::store)?;
        let mut requests: Vec<PassengerRequest> = inner
            .requests
            .values()
            .filter(|r| r.rider_id == rider_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(requests)
    }

    async fn apply_request_transition(
        &self,
        request: &PassengerRequest,
        seat_delta: i16,
    ) -> Result<Trip, Error> {
        let mut inner = self.inner.write().map_err(Error::store)?;

        let trip = inner
            .trips
            .get_mut(&request.trip_id)
            .ok_or_else(|| Error::not_found("trip", request.trip_id))?;

        let new_booked = i16::from(trip.booked_seats) + seat_delta;
        if new_booked < 0 || new_booked > i16::from(trip.max_seats) {
            // Guard failed: leave both the counter and the request untouched.
            return Err(Error::ConcurrencyConflict);
        }
        trip.booked_seats = new_booked as u8;
        trip.updated_at = Utc::now();
        let trip = trip.clone();

        inner.requests.insert(request.id, request.clone());
        Ok(trip)
    }

    async fn save_settlement(&self, settlement: &Settlement) -> Result<(), Error> {
        let mut inner = self.inner.write().map_err(Error::store)?;
        inner
            .settlements
            .insert(settlement.trip_id, settlement.clone());
        Ok(())
    }

    async fn get_settlement(&self, trip_id: Uuid) -> Result<Option<Settlement>, Error> {
        let inner = self.inner.read().map_err(Error::store)?;
        Ok(inner.settlements.get(&trip_id).cloned())
    }

    async fn preferences_for(&self, user_id: &str) -> Result<Option<RiderPreferences>, Error> {
        let inner = self.inner.read().map_err(Error::store)?;
        Ok(inner.preferences.get(user_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::request::RequestStatus;
    use tandem_core::trip::NewTrip;
    use tandem_shared::Coord;

    fn sample_trip() -> Trip {
        Trip::new(
            "driver-1".to_string(),
            NewTrip {
                origin: Coord::new(43.25, -79.92),
                origin_address: None,
                destination: Coord::new(43.26, -79.91),
                destination_address: None,
                departure_time: Utc::now() + chrono::Duration::hours(2),
                max_seats: 2,
                detour_tolerance_min: None,
            },
            10,
        )
    }

    #[tokio::test]
    async fn test_seat_guard_rejects_overbooking() {
        let store = MemoryStore::new();
        let trip = sample_trip();
        store.create_trip(&trip).await.unwrap();

        let mut request =
            PassengerRequest::new(trip.id, "rider-1".to_string(), trip.origin, None);
        store.create_request(&request).await.unwrap();

        request.status = RequestStatus::Accepted;
        let updated = store.apply_request_transition(&request, 2).await.unwrap();
        assert_eq!(updated.booked_seats, 2);

        // A third seat would exceed max_seats; the guard must refuse and
        // leave the stored request untouched.
        let mut stale = request.clone();
        stale.status = RequestStatus::Cancelled;
        let err = store.apply_request_transition(&stale, 1).await.unwrap_err();
        assert!(matches!(err, Error::ConcurrencyConflict));
        let stored = store.get_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn test_save_trip_does_not_touch_seat_count() {
        let store = MemoryStore::new();
        let trip = sample_trip();
        store.create_trip(&trip).await.unwrap();

        let request = PassengerRequest::new(trip.id, "rider-1".to_string(), trip.origin, None);
        store.create_request(&request).await.unwrap();
        store.apply_request_transition(&request, 1).await.unwrap();

        // A stale in-memory copy with booked_seats = 0 must not clobber the
        // counter on save.
        let mut stale = trip.clone();
        stale.status = tandem_core::trip::TripStatus::Active;
        store.save_trip(&stale).await.unwrap();

        let stored = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.booked_seats, 1);
        assert_eq!(stored.status, tandem_core::trip::TripStatus::Active);
    }
}
