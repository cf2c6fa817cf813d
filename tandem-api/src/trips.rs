use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tandem_core::trip::{NewTrip, Trip};
use tandem_trip::{NextStop, PassengerAction, PassengerUpdate, TripCompletion};
use uuid::Uuid;

use crate::auth::actor;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", post(create_trip))
        .route("/v1/trips/{id}/cancel", post(cancel_trip))
        .route("/v1/trips/{id}/start", post(start_trip))
        .route("/v1/trips/{id}/complete", post(complete_trip))
        .route("/v1/trips/{id}/next-stop", get(next_stop))
        .route("/v1/trips/{id}/passenger-status", post(passenger_status))
}

async fn create_trip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewTrip>,
) -> Result<Json<Trip>, ApiError> {
    let driver_id = actor(&headers)?;
    let trip = state.trips.create_trip(&driver_id, input).await?;
    Ok(Json(trip))
}

async fn cancel_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Trip>, ApiError> {
    let driver_id = actor(&headers)?;
    let trip = state.trips.cancel_trip(&driver_id, trip_id).await?;
    Ok(Json(trip))
}

async fn start_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Trip>, ApiError> {
    let driver_id = actor(&headers)?;
    let trip = state.trips.start_trip(&driver_id, trip_id).await?;
    Ok(Json(trip))
}

#[derive(Debug, Default, Deserialize)]
struct CompleteTripRequest {
    #[serde(default)]
    auto_start: bool,
}

async fn complete_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    headers: HeaderMap,
    body: Option<Json<CompleteTripRequest>>,
) -> Result<Json<TripCompletion>, ApiError> {
    let driver_id = actor(&headers)?;
    let auto_start = body.map(|Json(req)| req.auto_start).unwrap_or(false);
    let completion = state
        .trips
        .complete_trip(&driver_id, trip_id, auto_start)
        .await?;
    Ok(Json(completion))
}

async fn next_stop(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<NextStop>, ApiError> {
    let driver_id = actor(&headers)?;
    let stop = state.trips.next_stop(&driver_id, trip_id).await?;
    Ok(Json(stop))
}

#[derive(Debug, Deserialize)]
struct PassengerStatusRequest {
    request_id: Uuid,
    action: PassengerAction,
}

async fn passenger_status(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<PassengerStatusRequest>,
) -> Result<Json<PassengerUpdate>, ApiError> {
    let driver_id = actor(&headers)?;
    let update = state
        .trips
        .update_passenger_status(&driver_id, trip_id, req.request_id, req.action)
        .await?;
    Ok(Json(update))
}
