use chrono::{DateTime, Duration, Utc};
use tandem_core::trip::{Trip, TripStatus};
use tandem_shared::Coord;
use uuid::Uuid;

/// Stable ids so repeated queries return identical synthetic candidates.
const SYNTHETIC_TRIP_IDS: [u128; 3] = [
    0x7ab1_0000_0000_0000_0000_0000_0000_0001,
    0x7ab1_0000_0000_0000_0000_0000_0000_0002,
    0x7ab1_0000_0000_0000_0000_0000_0000_0003,
];

/// Deterministic candidate trips for designated test accounts. They run
/// through the exact scoring pipeline regular candidates do; only their
/// eligibility is gated.
pub fn synthetic_trips(
    rider_origin: Coord,
    rider_destination: Coord,
    desired_arrival: DateTime<Utc>,
) -> Vec<Trip> {
    let offsets = [
        // (lat offset, lng offset, minutes before desired arrival, max seats, booked)
        (0.010, -0.005, 45, 3, 0),
        (-0.015, 0.012, 30, 2, 1),
        (0.030, 0.020, 60, 4, 0),
    ];

    offsets
        .iter()
        .zip(SYNTHETIC_TRIP_IDS)
        .enumerate()
        .map(|(i, (&(dlat, dlng, lead_min, max_seats, booked), id))| {
            let now = Utc::now();
            Trip {
                id: Uuid::from_u128(id),
                driver_id: format!("synthetic-driver-{}", i + 1),
                origin: Coord::new(rider_origin.lat + dlat, rider_origin.lng + dlng),
                origin_address: None,
                destination: rider_destination,
                destination_address: None,
                departure_time: desired_arrival - Duration::minutes(lead_min),
                max_seats,
                booked_seats: booked,
                detour_tolerance_min: 10,
                estimated_distance_km: None,
                status: TripStatus::Pending,
                started_at: None,
                completed_at: None,
                created_at: now,
                updated_at: now,
            }
        })
        .collect()
}
