use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use tandem_core::preferences::RiderPreferences;
use tandem_core::repository::{DepartureWindow, TripStore};
use tandem_core::trip::Trip;
use tandem_core::{Error, FareSchedule};
use tandem_geo::RouteEstimator;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::models::{MatchQuery, RideMatch, ScoreBreakdown};
use crate::scoring::{self, Weights};
use crate::synthetic::synthetic_trips;

/// Tunables for candidate generation and ranking.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// How far a trip's departure may sit from the rider's desired arrival.
    pub arrival_tolerance_min: i64,
    /// Candidates whose detour exceeds this are rejected outright.
    pub max_detour_seconds: u32,
    pub max_candidates: usize,
    /// Minimum normalized score (0..1) a candidate must reach.
    pub match_threshold: f64,
    /// Test accounts allowed to see synthetic candidates.
    pub synthetic_rider_ids: Vec<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            arrival_tolerance_min: 90,
            max_detour_seconds: 1500,
            max_candidates: 20,
            match_threshold: 0.3,
            synthetic_rider_ids: Vec::new(),
        }
    }
}

/// Read-only matcher: ranks seat-available, direction-compatible trips
/// against a rider query. Side-effect free and safe under unbounded
/// concurrent invocation.
pub struct MatchEngine {
    store: Arc<dyn TripStore>,
    estimator: Arc<dyn RouteEstimator>,
    fares: FareSchedule,
    config: MatchConfig,
}

struct ScoredCandidate {
    trip: Trip,
    synthetic: bool,
    detour_sec: u32,
    cost_cents: i64,
    distance_km: f64,
    duration_sec: u32,
    schedule: f64,
    detour: f64,
    preferences: f64,
    seat_slack: f64,
}

impl MatchEngine {
    pub fn new(
        store: Arc<dyn TripStore>,
        estimator: Arc<dyn RouteEstimator>,
        fares: FareSchedule,
        config: MatchConfig,
    ) -> Self {
        Self {
            store,
            estimator,
            fares,
            config,
        }
    }

    /// Rank candidate trips for the query. An empty result is a valid
    /// answer, not an error; estimator failures drop only the affected
    /// candidate.
    pub async fn find_matches(&self, query: MatchQuery) -> Result<Vec<RideMatch>, Error> {
        if !query.origin.is_valid() || !query.destination.is_valid() {
            return Err(Error::Validation("origin/destination out of range".into()));
        }
        if query.seats_needed == 0 {
            return Err(Error::Validation("seats_needed must be at least 1".into()));
        }

        let tolerance = Duration::minutes(self.config.arrival_tolerance_min);
        let window = DepartureWindow {
            from: query.desired_arrival - tolerance,
            until: query.desired_arrival + tolerance,
        };

        let mut trips = self.store.list_open_trips(window).await?;

        // Trips the rider already has a live request on are not candidates.
        let taken: HashSet<Uuid> = self
            .store
            .requests_for_rider(&query.rider_id)
            .await?
            .into_iter()
            .filter(|r| !r.status.is_terminal())
            .map(|r| r.trip_id)
            .collect();

        trips.retain(|t| {
            t.driver_id != query.rider_id
                && t.available_seats() >= query.seats_needed
                && !taken.contains(&t.id)
        });

        let mut synthetic_ids: HashSet<Uuid> = HashSet::new();
        if query.include_synthetic && self.config.synthetic_rider_ids.contains(&query.rider_id) {
            for trip in synthetic_trips(query.origin, query.destination, query.desired_arrival) {
                if trip.available_seats() >= query.seats_needed {
                    synthetic_ids.insert(trip.id);
                    trips.push(trip);
                }
            }
        }

        let rider_prefs = self
            .store
            .preferences_for(&query.rider_id)
            .await?
            .unwrap_or_default();

        let mut tasks: JoinSet<Option<ScoredCandidate>> = JoinSet::new();
        for trip in trips {
            let estimator = Arc::clone(&self.estimator);
            let store = Arc::clone(&self.store);
            let fares = self.fares.clone();
            let query = query.clone();
            let synthetic = synthetic_ids.contains(&trip.id);
            let max_detour = self.config.max_detour_seconds;
            tasks.spawn(score_candidate(
                trip, synthetic, store, estimator, fares, rider_prefs, query, max_detour,
            ));
        }

        let mut candidates = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(candidate)) => candidates.push(candidate),
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "candidate scoring task failed"),
            }
        }

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // Cost is normalized against the cheapest candidate in the batch.
        let min_cost = candidates.iter().map(|c| c.cost_cents).min().unwrap_or(0);
        let weights = Weights::for_mode(query.preference);

        let mut matches: Vec<RideMatch> = candidates
            .into_iter()
            .filter_map(|c| self.rank(c, min_cost, &weights))
            .collect();

        matches.sort_by(|a, b| {
            b.match_percentage
                .cmp(&a.match_percentage)
                .then(a.departure_time.cmp(&b.departure_time))
                .then(a.detour_seconds.cmp(&b.detour_seconds))
                .then(a.trip_id.cmp(&b.trip_id))
        });
        matches.truncate(self.config.max_candidates);

        Ok(matches)
    }

    fn rank(&self, c: ScoredCandidate, min_cost: i64, weights: &Weights) -> Option<RideMatch> {
        let cost = scoring::cost_score(c.cost_cents, min_cost);
        let total = c.schedule * weights.schedule
            + c.detour * weights.detour
            + cost * weights.cost
            + c.preferences * weights.preferences
            + c.seat_slack * weights.seat_slack;
        let fraction = total / weights.total();

        if fraction < self.config.match_threshold {
            return None;
        }

        let match_percentage = (fraction * 100.0).round().clamp(0.0, 100.0) as u8;

        Some(RideMatch {
            trip_id: c.trip.id,
            driver_id: c.trip.driver_id.clone(),
            departure_time: c.trip.departure_time,
            available_seats: c.trip.available_seats(),
            estimated_cost_cents: c.cost_cents,
            estimated_distance_km: c.distance_km,
            estimated_duration_sec: c.duration_sec,
            detour_seconds: c.detour_sec,
            match_percentage,
            synthetic: c.synthetic,
            breakdown: ScoreBreakdown {
                schedule: c.schedule,
                detour: c.detour,
                cost,
                preferences: c.preferences,
                seat_slack: c.seat_slack,
            },
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn score_candidate(
    trip: Trip,
    synthetic: bool,
    store: Arc<dyn TripStore>,
    estimator: Arc<dyn RouteEstimator>,
    fares: FareSchedule,
    rider_prefs: RiderPreferences,
    query: MatchQuery,
    max_detour_seconds: u32,
) -> Option<ScoredCandidate> {
    let baseline = match estimator.estimate(trip.origin, trip.destination).await {
        Ok(estimate) => estimate,
        Err(err) => {
            tracing::warn!(trip_id = %trip.id, error = %err, "dropping candidate, baseline estimate failed");
            return None;
        }
    };

    let augmented = match estimator
        .estimate_route(&[trip.origin, query.origin, query.destination, trip.destination])
        .await
    {
        Ok(estimate) => estimate,
        Err(err) => {
            tracing::warn!(trip_id = %trip.id, error = %err, "dropping candidate, augmented estimate failed");
            return None;
        }
    };

    let rider_leg = match estimator.estimate(query.origin, query.destination).await {
        Ok(estimate) => estimate,
        Err(err) => {
            tracing::warn!(trip_id = %trip.id, error = %err, "dropping candidate, rider leg estimate failed");
            return None;
        }
    };

    let detour_sec = augmented.duration_sec.saturating_sub(baseline.duration_sec);
    if detour_sec > max_detour_seconds {
        tracing::debug!(trip_id = %trip.id, detour_sec, "candidate exceeds maximum detour");
        return None;
    }

    let cost_cents = fares.estimate_cost_cents(
        rider_leg.distance_km,
        rider_leg.duration_sec,
        detour_sec,
        trip.booked_seats,
    );

    // When the rider rides along, the car reaches the destination after the
    // augmented route.
    let arrival = trip.departure_time + Duration::seconds(i64::from(augmented.duration_sec));
    let schedule = scoring::schedule_score(arrival, query.desired_arrival);
    let detour = scoring::detour_score(detour_sec, trip.detour_tolerance_min);

    let driver_prefs = if synthetic {
        RiderPreferences::default()
    } else {
        match store.preferences_for(&trip.driver_id).await {
            Ok(prefs) => prefs.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(trip_id = %trip.id, error = %err, "driver preferences unavailable, assuming defaults");
                RiderPreferences::default()
            }
        }
    };
    let preferences = rider_prefs.overlap(&driver_prefs);
    let seat_slack =
        scoring::seat_slack_score(trip.booked_seats, trip.max_seats, query.seats_needed);

    Some(ScoredCandidate {
        synthetic,
        detour_sec,
        cost_cents,
        distance_km: rider_leg.distance_km,
        duration_sec: rider_leg.duration_sec,
        schedule,
        detour,
        preferences,
        seat_slack,
        trip,
    })
}
