use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tandem_core::request::PassengerRequest;
use tandem_shared::Coord;
use tandem_trip::RequestEstimates;
use uuid::Uuid;

use crate::auth::actor;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips/{id}/requests", post(create_request))
        .route("/v1/requests/{id}/accept", post(accept_request))
        .route("/v1/requests/{id}/reject", post(reject_request))
        .route("/v1/requests/{id}/cancel", post(cancel_request))
        .route("/v1/requests/{id}/confirm-pickup", post(confirm_pickup))
}

#[derive(Debug, Deserialize)]
struct CreateRequestBody {
    pickup: Coord,
    dropoff: Option<Coord>,
    /// Estimates carried over from the selected match, so the locked-in
    /// fare agrees with what the rider saw.
    estimates: Option<RequestEstimates>,
}

async fn create_request(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<CreateRequestBody>,
) -> Result<Json<PassengerRequest>, ApiError> {
    let rider_id = actor(&headers)?;
    let request = state
        .trips
        .create_trip_request(&rider_id, trip_id, body.pickup, body.dropoff, body.estimates)
        .await?;
    Ok(Json(request))
}

async fn accept_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<PassengerRequest>, ApiError> {
    let driver_id = actor(&headers)?;
    let request = state.trips.accept_request(&driver_id, request_id).await?;
    Ok(Json(request))
}

async fn reject_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<PassengerRequest>, ApiError> {
    let driver_id = actor(&headers)?;
    let request = state.trips.reject_request(&driver_id, request_id).await?;
    Ok(Json(request))
}

async fn cancel_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<PassengerRequest>, ApiError> {
    let rider_id = actor(&headers)?;
    let request = state.trips.cancel_request(&rider_id, request_id).await?;
    Ok(Json(request))
}

async fn confirm_pickup(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<PassengerRequest>, ApiError> {
    let rider_id = actor(&headers)?;
    let request = state.trips.confirm_pickup(&rider_id, request_id).await?;
    Ok(Json(request))
}
