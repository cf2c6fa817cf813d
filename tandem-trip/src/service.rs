use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tandem_core::notifier::Notifier;
use tandem_core::repository::TripStore;
use tandem_core::request::{PassengerRequest, RequestStatus};
use tandem_core::settlement::Settlement;
use tandem_core::trip::{NewTrip, Trip, TripStatus};
use tandem_core::{Error, FareSchedule};
use tandem_geo::RouteEstimator;
use tandem_shared::{Coord, TripEvent};
use uuid::Uuid;

use crate::locks::TripLocks;
use crate::sequencer::{self, NextStop};
use crate::settlement::compute_settlement;

/// Business rules around trip creation and readiness.
#[derive(Debug, Clone)]
pub struct TripPolicy {
    /// Trips must depart at least this far in the future when created.
    pub min_lead_minutes: i64,
    /// Drivers may not start a trip earlier than this before departure.
    pub pre_departure_window_minutes: i64,
    pub default_detour_tolerance_min: u16,
    pub max_seats: u8,
}

impl Default for TripPolicy {
    fn default() -> Self {
        Self {
            min_lead_minutes: 15,
            pre_departure_window_minutes: 30,
            default_detour_tolerance_min: 10,
            max_seats: 4,
        }
    }
}

/// Pre-computed estimates carried over from the match the rider selected,
/// keeping the request's locked-in fare consistent with what they saw.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RequestEstimates {
    pub distance_km: f64,
    pub duration_sec: u32,
    pub detour_sec: u32,
}

/// Outcome of a driver pickup/dropoff action. Waiting on the rider's
/// confirmation is a benign state, not a failure, and must not be retried
/// automatically.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PassengerUpdate {
    Updated(PassengerRequest),
    WaitingForConfirmation { request_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerAction {
    Pickup,
    Dropoff,
}

/// Trip plus its settlement, returned by completion.
#[derive(Debug, Clone, Serialize)]
pub struct TripCompletion {
    pub trip: Trip,
    pub settlement: Settlement,
}

/// Owns the trip and passenger-request state machines. Every mutation runs
/// under the owning trip's lock; request status and the seat counter are
/// written through the store's atomic transition so the two can never drift
/// apart. Notifications are dispatched outside the mutation path and never
/// fail it.
pub struct TripService {
    store: Arc<dyn TripStore>,
    estimator: Arc<dyn RouteEstimator>,
    notifier: Arc<dyn Notifier>,
    fares: FareSchedule,
    policy: TripPolicy,
    locks: TripLocks,
}

impl TripService {
    pub fn new(
        store: Arc<dyn TripStore>,
        estimator: Arc<dyn RouteEstimator>,
        notifier: Arc<dyn Notifier>,
        fares: FareSchedule,
        policy: TripPolicy,
    ) -> Self {
        Self {
            store,
            estimator,
            notifier,
            fares,
            policy,
            locks: TripLocks::new(),
        }
    }

    /// Publish a new trip for the driver.
    pub async fn create_trip(&self, driver_id: &str, input: NewTrip) -> Result<Trip, Error> {
        if !input.origin.is_valid() || !input.destination.is_valid() {
            return Err(Error::Validation("origin/destination out of range".into()));
        }
        if input.max_seats < 1 || input.max_seats > self.policy.max_seats {
            return Err(Error::Validation(format!(
                "max_seats must be between 1 and {}",
                self.policy.max_seats
            )));
        }
        let min_departure = Utc::now() + Duration::minutes(self.policy.min_lead_minutes);
        if input.departure_time < min_departure {
            return Err(Error::Validation(format!(
                "departure must be at least {} minutes in the future",
                self.policy.min_lead_minutes
            )));
        }

        let mut trip = Trip::new(
            driver_id.to_string(),
            input,
            self.policy.default_detour_tolerance_min,
        );

        // Baseline route estimate, kept as settlement's distance fallback. A
        // routing outage only leaves the estimate unset.
        match self.estimator.estimate(trip.origin, trip.destination).await {
            Ok(estimate) => trip.estimated_distance_km = Some(estimate.distance_km),
            Err(err) => {
                tracing::warn!(trip_id = %trip.id, error = %err, "baseline estimate unavailable at trip creation")
            }
        }

        self.store.create_trip(&trip).await?;
        tracing::info!(trip_id = %trip.id, driver_id, "trip created");
        Ok(trip)
    }

    /// Driver cancels a trip; pending and accepted requests are cancelled
    /// with it and the seat accounting stays consistent.
    pub async fn cancel_trip(&self, driver_id: &str, trip_id: Uuid) -> Result<Trip, Error> {
        let _guard = self.locks.lock(trip_id).await;

        let mut trip = self.trip_owned_by(trip_id, driver_id).await?;
        if trip.status.is_terminal() {
            return Err(Error::StateConflict {
                entity: "trip",
                state: trip.status.as_str(),
                action: "cancel",
            });
        }

        let requests = self.store.requests_for_trip(trip_id).await?;
        let mut cancelled_riders = Vec::new();
        for mut request in requests {
            if matches!(
                request.status,
                RequestStatus::Pending | RequestStatus::Accepted
            ) {
                let delta = request.status.seat_delta(RequestStatus::Cancelled);
                request.transition(RequestStatus::Cancelled, "cancel")?;
                trip = self.apply_with_retry(&request, delta).await?;
                cancelled_riders.push(request.rider_id);
            }
        }

        trip.transition(TripStatus::Cancelled, "cancel")?;
        self.store.save_trip(&trip).await?;

        self.dispatch(TripEvent::TripCancelled {
            trip_id,
            rider_ids: cancelled_riders,
        });
        Ok(trip)
    }

    /// Rider requests a seat on a trip. The fare estimate is computed here
    /// and locked into the request.
    pub async fn create_trip_request(
        &self,
        rider_id: &str,
        trip_id: Uuid,
        pickup: Coord,
        dropoff: Option<Coord>,
        precomputed: Option<RequestEstimates>,
    ) -> Result<PassengerRequest, Error> {
        if !pickup.is_valid() || dropoff.is_some_and(|c| !c.is_valid()) {
            return Err(Error::Validation("pickup/dropoff out of range".into()));
        }

        let _guard = self.locks.lock(trip_id).await;

        let trip = self
            .store
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| Error::not_found("trip", trip_id))?;

        if trip.driver_id == rider_id {
            return Err(Error::Validation(
                "you cannot request to join your own trip".into(),
            ));
        }
        if !trip.status.accepts_requests() {
            return Err(Error::StateConflict {
                entity: "trip",
                state: trip.status.as_str(),
                action: "request seat",
            });
        }
        if trip.available_seats() == 0 {
            return Err(Error::CapacityExceeded { trip_id });
        }

        let already_requested = self
            .store
            .requests_for_rider(rider_id)
            .await?
            .into_iter()
            .any(|r| {
                r.trip_id == trip_id
                    && matches!(r.status, RequestStatus::Pending | RequestStatus::Accepted)
            });
        if already_requested {
            return Err(Error::Validation(
                "you already have a live request for this trip".into(),
            ));
        }

        let estimates = match precomputed {
            Some(estimates) => estimates,
            None => self.estimate_ride(&trip, pickup, dropoff).await,
        };

        let mut request = PassengerRequest::new(trip_id, rider_id.to_string(), pickup, dropoff);
        request.estimated_distance_km = Some(estimates.distance_km);
        request.estimated_duration_sec = Some(estimates.duration_sec);
        request.estimated_detour_sec = Some(estimates.detour_sec);
        request.estimated_cost_cents = self.fares.estimate_cost_cents(
            estimates.distance_km,
            estimates.duration_sec,
            estimates.detour_sec,
            trip.booked_seats,
        );

        self.store.create_request(&request).await?;
        tracing::info!(request_id = %request.id, trip_id = %trip_id, rider_id, "trip request created");
        Ok(request)
    }

    /// Driver accepts a pending request, taking a seat. First acceptance
    /// activates the trip.
    pub async fn accept_request(
        &self,
        driver_id: &str,
        request_id: Uuid,
    ) -> Result<PassengerRequest, Error> {
        let trip_id = self.trip_id_of(request_id).await?;
        let _guard = self.locks.lock(trip_id).await;

        let mut request = self.request_by_id(request_id).await?;
        let trip = self.trip_owned_by(trip_id, driver_id).await?;

        if !trip.status.accepts_requests() {
            return Err(Error::StateConflict {
                entity: "trip",
                state: trip.status.as_str(),
                action: "accept request",
            });
        }
        if trip.available_seats() == 0 {
            return Err(Error::CapacityExceeded { trip_id });
        }

        request.transition(RequestStatus::Accepted, "accept")?;
        let mut trip = match self.apply_with_retry(&request, 1).await {
            Ok(trip) => trip,
            Err(Error::ConcurrencyConflict) => {
                // An outside writer moved the counter under us; re-read to
                // tell a full car from a transient race.
                let latest = self
                    .store
                    .get_trip(trip_id)
                    .await?
                    .ok_or_else(|| Error::not_found("trip", trip_id))?;
                return Err(if latest.available_seats() == 0 {
                    Error::CapacityExceeded { trip_id }
                } else {
                    Error::ConcurrencyConflict
                });
            }
            Err(other) => return Err(other),
        };

        if trip.status == TripStatus::Pending {
            trip.transition(TripStatus::Active, "first acceptance")?;
            self.store.save_trip(&trip).await?;
        }

        self.dispatch(TripEvent::RequestAccepted {
            trip_id,
            request_id,
            rider_id: request.rider_id.clone(),
        });
        Ok(request)
    }

    /// Driver rejects a pending request. No seat impact.
    pub async fn reject_request(
        &self,
        driver_id: &str,
        request_id: Uuid,
    ) -> Result<PassengerRequest, Error> {
        let trip_id = self.trip_id_of(request_id).await?;
        let _guard = self.locks.lock(trip_id).await;

        let mut request = self.request_by_id(request_id).await?;
        self.trip_owned_by(trip_id, driver_id).await?;

        request.transition(RequestStatus::Rejected, "reject")?;
        self.apply_with_retry(&request, 0).await?;

        self.dispatch(TripEvent::RequestRejected {
            trip_id,
            request_id,
            rider_id: request.rider_id.clone(),
        });
        Ok(request)
    }

    /// Rider cancels their own request; an accepted seat is released
    /// atomically with the status write.
    pub async fn cancel_request(
        &self,
        rider_id: &str,
        request_id: Uuid,
    ) -> Result<PassengerRequest, Error> {
        let trip_id = self.trip_id_of(request_id).await?;
        let _guard = self.locks.lock(trip_id).await;

        let mut request = self.request_by_id(request_id).await?;
        if request.rider_id != rider_id {
            return Err(Error::Forbidden(
                "you can only cancel your own requests".into(),
            ));
        }

        let delta = request.status.seat_delta(RequestStatus::Cancelled);
        request.transition(RequestStatus::Cancelled, "cancel")?;
        let trip = self.apply_with_retry(&request, delta).await?;

        // Cancelling the last open seat-holder on a running trip can leave
        // every request terminal.
        if trip.status == TripStatus::InProgress {
            self.try_auto_complete(trip_id).await?;
        }
        Ok(request)
    }

    /// Rider signals they are at the pickup point. Gates the driver's
    /// pickup action. Idempotent once confirmed.
    pub async fn confirm_pickup(
        &self,
        rider_id: &str,
        request_id: Uuid,
    ) -> Result<PassengerRequest, Error> {
        let trip_id = self.trip_id_of(request_id).await?;
        let _guard = self.locks.lock(trip_id).await;

        let mut request = self.request_by_id(request_id).await?;
        if request.rider_id != rider_id {
            return Err(Error::Forbidden(
                "you can only confirm pickup for your own requests".into(),
            ));
        }
        if request.status != RequestStatus::Accepted {
            return Err(Error::StateConflict {
                entity: "request",
                state: request.status.as_str(),
                action: "confirm pickup",
            });
        }
        if request.rider_pickup_confirmed_at.is_some() {
            return Ok(request);
        }

        request.rider_pickup_confirmed_at = Some(Utc::now());
        request.updated_at = Utc::now();
        self.apply_with_retry(&request, 0).await?;
        Ok(request)
    }

    /// Driver marks a passenger picked up or dropped off during an
    /// in-progress trip. The final dropoff auto-completes the trip inside
    /// the same lock scope.
    pub async fn update_passenger_status(
        &self,
        driver_id: &str,
        trip_id: Uuid,
        request_id: Uuid,
        action: PassengerAction,
    ) -> Result<PassengerUpdate, Error> {
        let _guard = self.locks.lock(trip_id).await;

        let trip = self.trip_owned_by(trip_id, driver_id).await?;
        if trip.status != TripStatus::InProgress {
            return Err(Error::StateConflict {
                entity: "trip",
                state: trip.status.as_str(),
                action: "update passenger",
            });
        }

        let mut request = self.request_by_id(request_id).await?;
        if request.trip_id != trip_id {
            return Err(Error::Validation(
                "request does not belong to this trip".into(),
            ));
        }

        match action {
            PassengerAction::Pickup => {
                if request.status != RequestStatus::Accepted {
                    return Err(Error::StateConflict {
                        entity: "request",
                        state: request.status.as_str(),
                        action: "pickup",
                    });
                }
                if request.rider_pickup_confirmed_at.is_none() {
                    // Benign: the rider has not confirmed yet. No state
                    // change, nothing to retry server-side.
                    return Ok(PassengerUpdate::WaitingForConfirmation { request_id });
                }
                request.transition(RequestStatus::OnTrip, "pickup")?;
                self.apply_with_retry(&request, 0).await?;
            }
            PassengerAction::Dropoff => {
                request.transition(RequestStatus::Completed, "dropoff")?;
                self.apply_with_retry(&request, 0).await?;
                self.try_auto_complete(trip_id).await?;
            }
        }

        Ok(PassengerUpdate::Updated(request))
    }

    /// Driver starts an active trip, subject to the pre-departure window.
    pub async fn start_trip(&self, driver_id: &str, trip_id: Uuid) -> Result<Trip, Error> {
        let _guard = self.locks.lock(trip_id).await;
        let trip = self.start_trip_locked(driver_id, trip_id).await?;
        Ok(trip)
    }

    /// Driver completes a trip and receives the settlement. Idempotent: a
    /// completed trip returns its stored settlement unchanged. With
    /// `auto_start`, an active trip is started first under the same lock.
    pub async fn complete_trip(
        &self,
        driver_id: &str,
        trip_id: Uuid,
        auto_start: bool,
    ) -> Result<TripCompletion, Error> {
        let _guard = self.locks.lock(trip_id).await;

        let mut trip = self.trip_owned_by(trip_id, driver_id).await?;

        if trip.status == TripStatus::Completed {
            let settlement = self.settlement_for(&trip).await?;
            return Ok(TripCompletion { trip, settlement });
        }

        if trip.status == TripStatus::Active {
            if !auto_start {
                return Err(Error::StateConflict {
                    entity: "trip",
                    state: trip.status.as_str(),
                    action: "complete",
                });
            }
            trip = self.start_trip_locked(driver_id, trip_id).await?;
        }

        if trip.status != TripStatus::InProgress {
            return Err(Error::StateConflict {
                entity: "trip",
                state: trip.status.as_str(),
                action: "complete",
            });
        }

        let requests = self.store.requests_for_trip(trip_id).await?;
        if requests.iter().any(|r| !r.status.is_terminal()) {
            return Err(Error::StateConflict {
                entity: "trip",
                state: "in_progress",
                action: "complete with passengers still aboard",
            });
        }

        let (trip, settlement) = self.complete_locked(trip, &requests).await?;
        Ok(TripCompletion { trip, settlement })
    }

    /// The driver's next pickup/dropoff stop, or idle.
    pub async fn next_stop(&self, driver_id: &str, trip_id: Uuid) -> Result<NextStop, Error> {
        let trip = self.trip_owned_by(trip_id, driver_id).await?;
        let requests = self.store.requests_for_trip(trip_id).await?;
        Ok(sequencer::next_stop(&trip, &requests))
    }

    // --- internals -------------------------------------------------------

    async fn start_trip_locked(&self, driver_id: &str, trip_id: Uuid) -> Result<Trip, Error> {
        let mut trip = self.trip_owned_by(trip_id, driver_id).await?;

        let earliest_start =
            trip.departure_time - Duration::minutes(self.policy.pre_departure_window_minutes);
        if Utc::now() < earliest_start {
            return Err(Error::Validation(format!(
                "trip cannot start more than {} minutes before departure",
                self.policy.pre_departure_window_minutes
            )));
        }

        trip.transition(TripStatus::InProgress, "start")?;
        trip.started_at = Some(Utc::now());
        self.store.save_trip(&trip).await?;

        let riders = self.seated_riders(trip_id).await?;
        self.dispatch(TripEvent::TripStarted {
            trip_id,
            rider_ids: riders,
        });
        Ok(trip)
    }

    /// Re-check latest state and complete the trip if every request reached
    /// a terminal status. Called under the trip lock by whatever mutation
    /// made the last request terminal, so completion happens exactly once.
    async fn try_auto_complete(&self, trip_id: Uuid) -> Result<(), Error> {
        let trip = self
            .store
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| Error::not_found("trip", trip_id))?;
        if trip.status != TripStatus::InProgress {
            return Ok(());
        }

        let requests = self.store.requests_for_trip(trip_id).await?;
        if requests.is_empty() || requests.iter().any(|r| !r.status.is_terminal()) {
            return Ok(());
        }

        self.complete_locked(trip, &requests).await?;
        Ok(())
    }

    /// Completion body, callers hold the trip lock and have verified every
    /// request is terminal.
    async fn complete_locked(
        &self,
        mut trip: Trip,
        requests: &[PassengerRequest],
    ) -> Result<(Trip, Settlement), Error> {
        // Converging path for concurrent completion attempts: a stored
        // settlement means an earlier completion already committed.
        if let Some(existing) = self.store.get_settlement(trip.id).await? {
            let latest = self
                .store
                .get_trip(trip.id)
                .await?
                .ok_or_else(|| Error::not_found("trip", trip.id))?;
            return Ok((latest, existing));
        }

        let completed_at = Utc::now();
        trip.transition(TripStatus::Completed, "complete")?;
        trip.completed_at = Some(completed_at);
        self.store.save_trip(&trip).await?;

        let settlement = compute_settlement(&trip, requests, &self.fares, completed_at);
        self.store.save_settlement(&settlement).await?;

        tracing::info!(
            trip_id = %trip.id,
            passengers = settlement.passenger_count(),
            earnings_cents = settlement.total_earnings_cents,
            "trip completed"
        );
        self.dispatch(TripEvent::TripCompleted {
            trip_id: trip.id,
            rider_ids: settlement
                .per_passenger
                .iter()
                .map(|p| p.rider_id.clone())
                .collect(),
            total_earnings_cents: settlement.total_earnings_cents,
        });
        Ok((trip, settlement))
    }

    async fn settlement_for(&self, trip: &Trip) -> Result<Settlement, Error> {
        if let Some(settlement) = self.store.get_settlement(trip.id).await? {
            return Ok(settlement);
        }
        // A completed trip without a stored settlement predates settlement
        // persistence; rebuild it from the locked-in request data once.
        let requests = self.store.requests_for_trip(trip.id).await?;
        let settlement = compute_settlement(
            trip,
            &requests,
            &self.fares,
            trip.completed_at.unwrap_or(trip.updated_at),
        );
        self.store.save_settlement(&settlement).await?;
        Ok(settlement)
    }

    async fn estimate_ride(
        &self,
        trip: &Trip,
        pickup: Coord,
        dropoff: Option<Coord>,
    ) -> RequestEstimates {
        let destination = dropoff.unwrap_or(trip.destination);
        match self.estimator.estimate(pickup, destination).await {
            Ok(estimate) => RequestEstimates {
                distance_km: estimate.distance_km,
                duration_sec: estimate.duration_sec,
                detour_sec: 0,
            },
            Err(err) => {
                // Flag and fall back rather than failing the request.
                tracing::warn!(trip_id = %trip.id, error = %err, "ride estimate unavailable, using fallback");
                RequestEstimates {
                    distance_km: 10.0,
                    duration_sec: 20 * 60,
                    detour_sec: 0,
                }
            }
        }
    }

    /// Apply a request transition, retrying a lost counter race once before
    /// surfacing it.
    async fn apply_with_retry(
        &self,
        request: &PassengerRequest,
        seat_delta: i16,
    ) -> Result<Trip, Error> {
        match self.store.apply_request_transition(request, seat_delta).await {
            Err(Error::ConcurrencyConflict) => {
                tracing::warn!(request_id = %request.id, "seat counter race, retrying once");
                self.store.apply_request_transition(request, seat_delta).await
            }
            other => other,
        }
    }

    async fn trip_owned_by(&self, trip_id: Uuid, driver_id: &str) -> Result<Trip, Error> {
        let trip = self
            .store
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| Error::not_found("trip", trip_id))?;
        if trip.driver_id != driver_id {
            return Err(Error::Forbidden(
                "only the trip's driver may perform this action".into(),
            ));
        }
        Ok(trip)
    }

    async fn request_by_id(&self, request_id: Uuid) -> Result<PassengerRequest, Error> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or_else(|| Error::not_found("request", request_id))
    }

    async fn trip_id_of(&self, request_id: Uuid) -> Result<Uuid, Error> {
        Ok(self.request_by_id(request_id).await?.trip_id)
    }

    async fn seated_riders(&self, trip_id: Uuid) -> Result<Vec<String>, Error> {
        Ok(self
            .store
            .requests_for_trip(trip_id)
            .await?
            .into_iter()
            .filter(|r| r.status == RequestStatus::Accepted)
            .map(|r| r.rider_id)
            .collect())
    }

    fn dispatch(&self, event: TripEvent) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            notifier.notify(event).await;
        });
    }
}
