use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tandem_core::repository::TripStore;
use tandem_core::request::{PassengerRequest, RequestStatus};
use tandem_core::trip::{NewTrip, Trip};
use tandem_core::{Error, FareSchedule};
use tandem_geo::{EstimatorError, HaversineEstimator, RouteEstimate, RouteEstimator};
use tandem_match::{MatchConfig, MatchEngine, MatchQuery, PreferenceMode};
use tandem_shared::Coord;
use tandem_store::MemoryStore;

const RIDER: &str = "rider-1";

fn rider_origin() -> Coord {
    Coord::new(43.2520, -79.9180)
}

fn campus() -> Coord {
    Coord::new(43.2609, -79.9192)
}

fn desired_arrival() -> DateTime<Utc> {
    Utc::now() + Duration::hours(2)
}

fn trip_for(driver: &str, departure: DateTime<Utc>, max_seats: u8) -> Trip {
    Trip::new(
        driver.to_string(),
        NewTrip {
            origin: Coord::new(43.2500, -79.9200),
            origin_address: None,
            destination: campus(),
            destination_address: None,
            departure_time: departure,
            max_seats,
            detour_tolerance_min: Some(10),
        },
        10,
    )
}

fn query() -> MatchQuery {
    MatchQuery {
        rider_id: RIDER.to_string(),
        origin: rider_origin(),
        destination: campus(),
        desired_arrival: desired_arrival(),
        seats_needed: 1,
        preference: PreferenceMode::Default,
        include_synthetic: false,
    }
}

fn engine(store: Arc<MemoryStore>) -> MatchEngine {
    MatchEngine::new(
        store,
        Arc::new(HaversineEstimator::default()),
        FareSchedule::default(),
        MatchConfig::default(),
    )
}

async fn seed_accepted(store: &MemoryStore, trip: &Trip, rider: &str) {
    let mut request =
        PassengerRequest::new(trip.id, rider.to_string(), rider_origin(), None);
    store.create_request(&request).await.unwrap();
    request.transition(RequestStatus::Accepted, "accept").unwrap();
    store.apply_request_transition(&request, 1).await.unwrap();
}

#[tokio::test]
async fn test_no_candidates_is_an_empty_result() {
    let store = Arc::new(MemoryStore::new());
    let matches = engine(store).find_matches(query()).await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_reports_available_seats_net_of_accepted_requests() {
    let store = Arc::new(MemoryStore::new());
    let trip = trip_for("driver-1", desired_arrival() - Duration::minutes(20), 4);
    store.create_trip(&trip).await.unwrap();

    // Two accepted riders book seats; a pending one does not.
    seed_accepted(&store, &trip, "rider-a").await;
    seed_accepted(&store, &trip, "rider-b").await;
    let pending = PassengerRequest::new(trip.id, "rider-c".to_string(), rider_origin(), None);
    store.create_request(&pending).await.unwrap();

    let matches = engine(store).find_matches(query()).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].available_seats, 2);
}

#[tokio::test]
async fn test_own_trips_and_already_requested_trips_are_excluded() {
    let store = Arc::new(MemoryStore::new());

    let own = trip_for(RIDER, desired_arrival() - Duration::minutes(20), 4);
    store.create_trip(&own).await.unwrap();

    let requested = trip_for("driver-2", desired_arrival() - Duration::minutes(25), 4);
    store.create_trip(&requested).await.unwrap();
    let request = PassengerRequest::new(requested.id, RIDER.to_string(), rider_origin(), None);
    store.create_request(&request).await.unwrap();

    let open = trip_for("driver-3", desired_arrival() - Duration::minutes(30), 4);
    store.create_trip(&open).await.unwrap();

    let matches = engine(store).find_matches(query()).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].trip_id, open.id);
}

#[tokio::test]
async fn test_full_trips_are_not_candidates() {
    let store = Arc::new(MemoryStore::new());
    let trip = trip_for("driver-1", desired_arrival() - Duration::minutes(20), 1);
    store.create_trip(&trip).await.unwrap();
    seed_accepted(&store, &trip, "rider-a").await;

    let matches = engine(store).find_matches(query()).await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_departures_outside_the_window_are_excluded() {
    let store = Arc::new(MemoryStore::new());
    let far = trip_for("driver-1", desired_arrival() + Duration::hours(4), 4);
    store.create_trip(&far).await.unwrap();

    let matches = engine(store).find_matches(query()).await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_ordering_is_deterministic_with_stable_tie_breaks() {
    let store = Arc::new(MemoryStore::new());
    // Identical trips: scores tie, so ordering falls back to the trip id.
    let departure = desired_arrival() - Duration::minutes(20);
    for driver in ["driver-1", "driver-2", "driver-3"] {
        store.create_trip(&trip_for(driver, departure, 4)).await.unwrap();
    }

    let eng = engine(store);
    let first = eng.find_matches(query()).await.unwrap();
    let second = eng.find_matches(query()).await.unwrap();

    assert_eq!(first.len(), 3);
    let ids: Vec<_> = first.iter().map(|m| m.trip_id).collect();
    let ids_again: Vec<_> = second.iter().map(|m| m.trip_id).collect();
    assert_eq!(ids, ids_again, "repeated queries must rank identically");

    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted, "equal scores break ties by trip id");

    for m in &first {
        assert!(m.match_percentage <= 100);
    }
}

#[tokio::test]
async fn test_excessive_detour_rejects_the_candidate() {
    let store = Arc::new(MemoryStore::new());
    // A trip in a different city: picking this rider up means an enormous
    // detour.
    let mut trip = trip_for("driver-1", desired_arrival() - Duration::minutes(20), 4);
    trip.origin = Coord::new(44.30, -80.90);
    trip.destination = Coord::new(44.31, -80.91);
    store.create_trip(&trip).await.unwrap();

    let matches = engine(store).find_matches(query()).await.unwrap();
    assert!(matches.is_empty());
}

/// Fails estimates touching one poisoned coordinate, stands in for a routing
/// backend timing out on a single candidate.
struct PoisonedEstimator {
    inner: HaversineEstimator,
    poisoned: Coord,
}

#[async_trait]
impl RouteEstimator for PoisonedEstimator {
    async fn estimate(
        &self,
        origin: Coord,
        destination: Coord,
    ) -> Result<RouteEstimate, EstimatorError> {
        if origin == self.poisoned || destination == self.poisoned {
            return Err(EstimatorError::Timeout);
        }
        self.inner.estimate(origin, destination).await
    }
}

#[tokio::test]
async fn test_estimator_timeout_drops_only_the_affected_candidate() {
    let store = Arc::new(MemoryStore::new());

    let healthy = trip_for("driver-1", desired_arrival() - Duration::minutes(20), 4);
    store.create_trip(&healthy).await.unwrap();

    let mut unreachable = trip_for("driver-2", desired_arrival() - Duration::minutes(25), 4);
    unreachable.origin = Coord::new(43.2400, -79.9300);
    store.create_trip(&unreachable).await.unwrap();

    let estimator = PoisonedEstimator {
        inner: HaversineEstimator::default(),
        poisoned: unreachable.origin,
    };
    let eng = MatchEngine::new(
        store,
        Arc::new(estimator),
        FareSchedule::default(),
        MatchConfig::default(),
    );

    let matches = eng.find_matches(query()).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].trip_id, healthy.id);
}

#[tokio::test]
async fn test_synthetic_candidates_require_the_allowlist() {
    let store = Arc::new(MemoryStore::new());

    let mut q = query();
    q.include_synthetic = true;

    // Not allowlisted: the flag is ignored.
    let matches = engine(store.clone()).find_matches(q.clone()).await.unwrap();
    assert!(matches.iter().all(|m| !m.synthetic));
    assert!(matches.is_empty());

    // Allowlisted: synthetic candidates appear, flagged as such.
    let config = MatchConfig {
        synthetic_rider_ids: vec![RIDER.to_string()],
        ..MatchConfig::default()
    };
    let eng = MatchEngine::new(
        store.clone(),
        Arc::new(HaversineEstimator::default()),
        FareSchedule::default(),
        config,
    );
    let matches = eng.find_matches(q.clone()).await.unwrap();
    assert!(!matches.is_empty());
    assert!(matches.iter().all(|m| m.synthetic));

    // Allowlisted but the flag is off: nothing synthetic.
    q.include_synthetic = false;
    let matches = eng.find_matches(q).await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_cost_priority_prefers_the_cheaper_trip() {
    let store = Arc::new(MemoryStore::new());
    let departure = desired_arrival() - Duration::minutes(20);

    // Same route, but one car already has two riders aboard, which makes it
    // cheaper through the occupancy discount.
    let empty_car = trip_for("driver-1", departure, 4);
    store.create_trip(&empty_car).await.unwrap();

    let shared_car = trip_for("driver-2", departure, 4);
    store.create_trip(&shared_car).await.unwrap();
    seed_accepted(&store, &shared_car, "rider-a").await;
    seed_accepted(&store, &shared_car, "rider-b").await;

    // A longer ride makes the absolute price gap between the two cars wide
    // enough to dominate the seat-slack difference.
    let mut q = query();
    q.origin = Coord::new(43.2000, -79.8000);
    q.preference = PreferenceMode::CostPriority;

    let config = MatchConfig {
        max_detour_seconds: 10_000,
        ..MatchConfig::default()
    };
    let eng = MatchEngine::new(
        store,
        Arc::new(HaversineEstimator::default()),
        FareSchedule::default(),
        config,
    );
    let matches = eng.find_matches(q).await.unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].trip_id, shared_car.id);
    assert!(matches[0].estimated_cost_cents < matches[1].estimated_cost_cents);
}

#[tokio::test]
async fn test_invalid_queries_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let eng = engine(store);

    let mut q = query();
    q.seats_needed = 0;
    assert!(matches!(
        eng.find_matches(q).await,
        Err(Error::Validation(_))
    ));

    let mut q = query();
    q.origin = Coord::new(120.0, 0.0);
    assert!(matches!(
        eng.find_matches(q).await,
        Err(Error::Validation(_))
    ));
}
