use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tandem_core::preferences::RiderPreferences;
use tandem_core::repository::{DepartureWindow, TripStore};
use tandem_core::request::PassengerRequest;
use tandem_core::settlement::{PassengerFare, Settlement};
use tandem_core::trip::Trip;
use tandem_core::Error;
use tandem_shared::Coord;
use tracing::info;
use uuid::Uuid;

/// Postgres-backed store. Queries are bound at runtime so the crate builds
/// without a live database; schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

fn trip_from_row(row: &PgRow) -> Result<Trip, Error> {
    let status: String = row.try_get("status").map_err(Error::store)?;
    Ok(Trip {
        id: row.try_get("id").map_err(Error::store)?,
        driver_id: row.try_get("driver_id").map_err(Error::store)?,
        origin: Coord::new(
            row.try_get("origin_lat").map_err(Error::store)?,
            row.try_get("origin_lng").map_err(Error::store)?,
        ),
        origin_address: row.try_get("origin_address").map_err(Error::store)?,
        destination: Coord::new(
            row.try_get("dest_lat").map_err(Error::store)?,
            row.try_get("dest_lng").map_err(Error::store)?,
        ),
        destination_address: row.try_get("dest_address").map_err(Error::store)?,
        departure_time: row.try_get("departure_time").map_err(Error::store)?,
        max_seats: row.try_get::<i32, _>("max_seats").map_err(Error::store)? as u8,
        booked_seats: row.try_get::<i32, _>("booked_seats").map_err(Error::store)? as u8,
        detour_tolerance_min: row
            .try_get::<i32, _>("detour_tolerance_min")
            .map_err(Error::store)? as u16,
        estimated_distance_km: row.try_get("estimated_distance_km").map_err(Error::store)?,
        status: status.parse()?,
        started_at: row.try_get("started_at").map_err(Error::store)?,
        completed_at: row.try_get("completed_at").map_err(Error::store)?,
        created_at: row.try_get("created_at").map_err(Error::store)?,
        updated_at: row.try_get("updated_at").map_err(Error::store)?,
    })
}

fn request_from_row(row: &PgRow) -> Result<PassengerRequest, Error> {
    let status: String = row.try_get("status").map_err(Error::store)?;
    let dropoff_lat: Option<f64> = row.try_get("dropoff_lat").map_err(Error::store)?;
    let dropoff_lng: Option<f64> = row.try_get("dropoff_lng").map_err(Error::store)?;
    let dropoff = match (dropoff_lat, dropoff_lng) {
        (Some(lat), Some(lng)) => Some(Coord::new(lat, lng)),
        _ => None,
    };
    Ok(PassengerRequest {
        id: row.try_get("id").map_err(Error::store)?,
        trip_id: row.try_get("trip_id").map_err(Error::store)?,
        rider_id: row.try_get("rider_id").map_err(Error::store)?,
        pickup: Coord::new(
            row.try_get("pickup_lat").map_err(Error::store)?,
            row.try_get("pickup_lng").map_err(Error::store)?,
        ),
        dropoff,
        estimated_distance_km: row.try_get("estimated_distance_km").map_err(Error::store)?,
        estimated_duration_sec: row
            .try_get::<Option<i32>, _>("estimated_duration_sec")
            .map_err(Error::store)?
            .map(|v| v as u32),
        estimated_detour_sec: row
            .try_get::<Option<i32>, _>("estimated_detour_sec")
            .map_err(Error::store)?
            .map(|v| v as u32),
        estimated_cost_cents: row.try_get("estimated_cost_cents").map_err(Error::store)?,
        status: status.parse()?,
        rider_pickup_confirmed_at: row
            .try_get("rider_pickup_confirmed_at")
            .map_err(Error::store)?,
        accepted_at: row.try_get("accepted_at").map_err(Error::store)?,
        created_at: row.try_get("created_at").map_err(Error::store)?,
        updated_at: row.try_get("updated_at").map_err(Error::store)?,
    })
}

const REQUEST_COLUMNS: &str = "id, trip_id, rider_id, pickup_lat, pickup_lng, dropoff_lat, \
     dropoff_lng, estimated_distance_km, estimated_duration_sec, estimated_detour_sec, \
     estimated_cost_cents, status, rider_pickup_confirmed_at, accepted_at, created_at, updated_at";

const TRIP_COLUMNS: &str = "id, driver_id, origin_lat, origin_lng, origin_address, dest_lat, \
     dest_lng, dest_address, departure_time, max_seats, booked_seats, detour_tolerance_min, \
     estimated_distance_km, status, started_at, completed_at, created_at, updated_at";

async fn write_request<'e, E>(executor: E, request: &PassengerRequest) -> Result<(), Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "UPDATE trip_requests SET status = $2, dropoff_lat = $3, dropoff_lng = $4, \
         estimated_distance_km = $5, estimated_duration_sec = $6, estimated_detour_sec = $7, \
         estimated_cost_cents = $8, rider_pickup_confirmed_at = $9, accepted_at = $10, \
         updated_at = $11 WHERE id = $1",
    )
    .bind(request.id)
    .bind(request.status.as_str())
    .bind(request.dropoff.map(|c| c.lat))
    .bind(request.dropoff.map(|c| c.lng))
    .bind(request.estimated_distance_km)
    .bind(request.estimated_duration_sec.map(|v| v as i32))
    .bind(request.estimated_detour_sec.map(|v| v as i32))
    .bind(request.estimated_cost_cents)
    .bind(request.rider_pickup_confirmed_at)
    .bind(request.accepted_at)
    .bind(request.updated_at)
    .execute(executor)
    .await
    .map_err(Error::store)?;
    Ok(())
}

#[async_trait]
impl TripStore for PgStore {
    async fn create_trip(&self, trip: &Trip) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO trips (id, driver_id, origin_lat, origin_lng, origin_address, \
             dest_lat, dest_lng, dest_address, departure_time, max_seats, booked_seats, \
             detour_tolerance_min, estimated_distance_km, status, started_at, completed_at, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(trip.id)
        .bind(&trip.driver_id)
        .bind(trip.origin.lat)
        .bind(trip.origin.lng)
        .bind(&trip.origin_address)
        .bind(trip.destination.lat)
        .bind(trip.destination.lng)
        .bind(&trip.destination_address)
        .bind(trip.departure_time)
        .bind(i32::from(trip.max_seats))
        .bind(i32::from(trip.booked_seats))
        .bind(i32::from(trip.detour_tolerance_min))
        .bind(trip.estimated_distance_km)
        .bind(trip.status.as_str())
        .bind(trip.started_at)
        .bind(trip.completed_at)
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::store)?;
        Ok(())
    }

    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, Error> {
        let row = sqlx::query(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::store)?;
        row.as_ref().map(trip_from_row).transpose()
    }

    async fn save_trip(&self, trip: &Trip) -> Result<(), Error> {
        let result = sqlx::query(
            "UPDATE trips SET status = $2, started_at = $3, completed_at = $4, \
             estimated_distance_km = $5, updated_at = $6 WHERE id = $1",
        )
        .bind(trip.id)
        .bind(trip.status.as_str())
        .bind(trip.started_at)
        .bind(trip.completed_at)
        .bind(trip.estimated_distance_km)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::store)?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("trip", trip.id));
        }
        Ok(())
    }

    async fn list_open_trips(&self, window: DepartureWindow) -> Result<Vec<Trip>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips \
             WHERE status IN ('pending', 'active') AND booked_seats < max_seats \
             AND departure_time >= $1 AND departure_time <= $2 \
             ORDER BY departure_time, id"
        ))
        .bind(window.from)
        .bind(window.until)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::store)?;
        rows.iter().map(trip_from_row).collect()
    }

    async fn create_request(&self, request: &PassengerRequest) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO trip_requests (id, trip_id, rider_id, pickup_lat, pickup_lng, \
             dropoff_lat, dropoff_lng, estimated_distance_km, estimated_duration_sec, \
             estimated_detour_sec, estimated_cost_cents, status, rider_pickup_confirmed_at, \
             accepted_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(request.id)
        .bind(request.trip_id)
        .bind(&request.rider_id)
        .bind(request.pickup.lat)
        .bind(request.pickup.lng)
        .bind(request.dropoff.map(|c| c.lat))
        .bind(request.dropoff.map(|c| c.lng))
        .bind(request.estimated_distance_km)
        .bind(request.estimated_duration_sec.map(|v| v as i32))
        .bind(request.estimated_detour_sec.map(|v| v as i32))
        .bind(request.estimated_cost_cents)
        .bind(request.status.as_str())
        .bind(request.rider_pickup_confirmed_at)
        .bind(request.accepted_at)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::store)?;
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<PassengerRequest>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM trip_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::store)?;
        row.as_ref().map(request_from_row).transpose()
    }

    async fn requests_for_trip(&self, trip_id: Uuid) -> Result<Vec<PassengerRequest>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM trip_requests WHERE trip_id = $1 \
             ORDER BY created_at, id"
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::store)?;
        rows.iter().map(request_from_row).collect()
    }

    async fn requests_for_rider(&self, rider_id: &str) -> Result<Vec<PassengerRequest>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM trip_requests WHERE rider_id = $1 \
             ORDER BY created_at, id"
        ))
        .bind(rider_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::store)?;
        rows.iter().map(request_from_row).collect()
    }

    async fn apply_request_transition(
        &self,
        request: &PassengerRequest,
        seat_delta: i16,
    ) -> Result<Trip, Error> {
        let mut tx = self.pool.begin().await.map_err(Error::store)?;

        // Conditional seat update: the guard runs against the row's current
        // value, so a racing writer cannot push the counter out of range.
        let result = sqlx::query(
            "UPDATE trips SET booked_seats = booked_seats + $2, updated_at = NOW() \
             WHERE id = $1 AND booked_seats + $2 >= 0 AND booked_seats + $2 <= max_seats",
        )
        .bind(request.trip_id)
        .bind(i32::from(seat_delta))
        .execute(&mut *tx)
        .await
        .map_err(Error::store)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM trips WHERE id = $1")
                .bind(request.trip_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::store)?;
            // Dropping the transaction rolls everything back.
            return Err(if exists.is_some() {
                Error::ConcurrencyConflict
            } else {
                Error::not_found("trip", request.trip_id)
            });
        }

        write_request(&mut *tx, request).await?;

        let row = sqlx::query(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"))
            .bind(request.trip_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::store)?;
        let trip = trip_from_row(&row)?;

        tx.commit().await.map_err(Error::store)?;
        Ok(trip)
    }

    async fn save_settlement(&self, settlement: &Settlement) -> Result<(), Error> {
        let per_passenger =
            serde_json::to_string(&settlement.per_passenger).map_err(Error::store)?;
        sqlx::query(
            "INSERT INTO settlements (trip_id, duration_minutes, total_distance_km, \
             per_passenger, platform_fee_cents, total_earnings_cents, settled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (trip_id) DO NOTHING",
        )
        .bind(settlement.trip_id)
        .bind(settlement.duration_minutes)
        .bind(settlement.total_distance_km)
        .bind(per_passenger)
        .bind(settlement.platform_fee_cents)
        .bind(settlement.total_earnings_cents)
        .bind(settlement.settled_at)
        .execute(&self.pool)
        .await
        .map_err(Error::store)?;
        Ok(())
    }

    async fn get_settlement(&self, trip_id: Uuid) -> Result<Option<Settlement>, Error> {
        let row = sqlx::query(
            "SELECT trip_id, duration_minutes, total_distance_km, per_passenger, \
             platform_fee_cents, total_earnings_cents, settled_at \
             FROM settlements WHERE trip_id = $1",
        )
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::store)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let per_passenger_raw: String = row.try_get("per_passenger").map_err(Error::store)?;
        let per_passenger: Vec<PassengerFare> =
            serde_json::from_str(&per_passenger_raw).map_err(Error::store)?;

        Ok(Some(Settlement {
            trip_id: row.try_get("trip_id").map_err(Error::store)?,
            duration_minutes: row.try_get("duration_minutes").map_err(Error::store)?,
            total_distance_km: row.try_get("total_distance_km").map_err(Error::store)?,
            per_passenger,
            platform_fee_cents: row.try_get("platform_fee_cents").map_err(Error::store)?,
            total_earnings_cents: row.try_get("total_earnings_cents").map_err(Error::store)?,
            settled_at: row
                .try_get::<DateTime<Utc>, _>("settled_at")
                .map_err(Error::store)?,
        }))
    }

    async fn preferences_for(&self, user_id: &str) -> Result<Option<RiderPreferences>, Error> {
        let row = sqlx::query(
            "SELECT music, chatty, smoking, pets FROM preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::store)?;

        row.map(|row| {
            Ok(RiderPreferences {
                music: row.try_get("music").map_err(Error::store)?,
                chatty: row.try_get("chatty").map_err(Error::store)?,
                smoking: row.try_get("smoking").map_err(Error::store)?,
                pets: row.try_get("pets").map_err(Error::store)?,
            })
        })
        .transpose()
    }
}
