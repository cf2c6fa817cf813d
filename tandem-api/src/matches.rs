use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tandem_match::{MatchQuery, PreferenceMode, RideMatch};
use tandem_shared::Coord;

use crate::auth::actor;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/matches", post(find_matches))
}

#[derive(Debug, Deserialize)]
struct FindMatchesRequest {
    origin: Coord,
    destination: Coord,
    desired_arrival: DateTime<Utc>,
    #[serde(default = "one_seat")]
    seats_needed: u8,
    #[serde(default)]
    preference: PreferenceMode,
    #[serde(default)]
    include_synthetic: bool,
}

fn one_seat() -> u8 {
    1
}

async fn find_matches(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FindMatchesRequest>,
) -> Result<Json<Vec<RideMatch>>, ApiError> {
    let rider_id = actor(&headers)?;
    let matches = state
        .matching
        .find_matches(MatchQuery {
            rider_id,
            origin: req.origin,
            destination: req.destination,
            desired_arrival: req.desired_arrival,
            seats_needed: req.seats_needed,
            preference: req.preference,
            include_synthetic: req.include_synthetic,
        })
        .await?;
    Ok(Json(matches))
}
