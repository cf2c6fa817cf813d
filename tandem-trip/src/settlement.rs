use chrono::{DateTime, Utc};
use tandem_core::request::{PassengerRequest, RequestStatus};
use tandem_core::settlement::{PassengerFare, Settlement};
use tandem_core::trip::Trip;
use tandem_core::FareSchedule;

/// Compute the settlement for a trip at completion time.
///
/// Per-passenger amounts are the fares locked in when each request was
/// created; distances fall back to the trip-level estimate when a request
/// carries none. Pure: callers persist the result exactly once and reuse it
/// for repeated completion calls.
pub fn compute_settlement(
    trip: &Trip,
    requests: &[PassengerRequest],
    fares: &FareSchedule,
    completed_at: DateTime<Utc>,
) -> Settlement {
    let completed: Vec<&PassengerRequest> = requests
        .iter()
        .filter(|r| r.status == RequestStatus::Completed)
        .collect();

    let duration_minutes = trip
        .started_at
        .map(|started| (completed_at - started).num_minutes().max(0));

    let trip_fallback_km = trip.estimated_distance_km.unwrap_or(0.0);
    let total_distance_km = completed
        .iter()
        .map(|r| r.estimated_distance_km.unwrap_or(trip_fallback_km))
        .sum();

    let per_passenger: Vec<PassengerFare> = completed
        .iter()
        .map(|r| PassengerFare {
            request_id: r.id,
            rider_id: r.rider_id.clone(),
            fare_cents: r.estimated_cost_cents,
        })
        .collect();

    let fare_total: i64 = per_passenger.iter().map(|p| p.fare_cents).sum();
    let platform_fee_cents = fares.platform_fee_cents(fare_total);

    Settlement {
        trip_id: trip.id,
        duration_minutes,
        total_distance_km,
        per_passenger,
        platform_fee_cents,
        total_earnings_cents: fare_total - platform_fee_cents,
        settled_at: completed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tandem_core::trip::NewTrip;
    use tandem_shared::Coord;

    fn trip_with_start(started_minutes_ago: i64) -> Trip {
        let mut trip = Trip::new(
            "driver-1".to_string(),
            NewTrip {
                origin: Coord::new(43.25, -79.92),
                origin_address: None,
                destination: Coord::new(43.26, -79.91),
                destination_address: None,
                departure_time: Utc::now(),
                max_seats: 4,
                detour_tolerance_min: None,
            },
            10,
        );
        trip.started_at = Some(Utc::now() - Duration::minutes(started_minutes_ago));
        trip.estimated_distance_km = Some(8.0);
        trip
    }

    fn completed_request(trip: &Trip, rider: &str, cost: i64, km: Option<f64>) -> PassengerRequest {
        let mut req =
            PassengerRequest::new(trip.id, rider.to_string(), Coord::new(43.251, -79.921), None);
        req.status = RequestStatus::Completed;
        req.estimated_cost_cents = cost;
        req.estimated_distance_km = km;
        req
    }

    #[test]
    fn test_settlement_uses_locked_in_fares() {
        let trip = trip_with_start(25);
        let requests = vec![
            completed_request(&trip, "rider-a", 650, Some(10.0)),
            completed_request(&trip, "rider-b", 553, Some(9.5)),
        ];
        let fares = FareSchedule::default();

        let settlement = compute_settlement(&trip, &requests, &fares, Utc::now());
        assert_eq!(settlement.passenger_count(), 2);
        assert_eq!(settlement.fare_total_cents(), 1203);
        // 15% platform fee
        assert_eq!(settlement.platform_fee_cents, 180);
        assert_eq!(settlement.total_earnings_cents, 1023);
        assert_eq!(settlement.duration_minutes, Some(25));
        assert!((settlement.total_distance_km - 19.5).abs() < 1e-9);
    }

    #[test]
    fn test_distance_falls_back_to_trip_estimate() {
        let trip = trip_with_start(10);
        let requests = vec![
            completed_request(&trip, "rider-a", 500, None),
            completed_request(&trip, "rider-b", 500, Some(12.0)),
        ];
        let settlement =
            compute_settlement(&trip, &requests, &FareSchedule::default(), Utc::now());
        assert!((settlement.total_distance_km - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_none_without_start_time() {
        let mut trip = trip_with_start(10);
        trip.started_at = None;
        let settlement = compute_settlement(&trip, &[], &FareSchedule::default(), Utc::now());
        assert_eq!(settlement.duration_minutes, None);
        assert_eq!(settlement.passenger_count(), 0);
        assert_eq!(settlement.total_earnings_cents, 0);
    }

    #[test]
    fn test_non_completed_requests_do_not_earn() {
        let trip = trip_with_start(10);
        let mut cancelled = completed_request(&trip, "rider-a", 700, Some(5.0));
        cancelled.status = RequestStatus::Cancelled;
        let requests = vec![cancelled, completed_request(&trip, "rider-b", 600, Some(7.0))];

        let settlement =
            compute_settlement(&trip, &requests, &FareSchedule::default(), Utc::now());
        assert_eq!(settlement.passenger_count(), 1);
        assert_eq!(settlement.fare_total_cents(), 600);
    }
}
