use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tandem_api::{app, AppState};
use tandem_core::notifier::LogNotifier;
use tandem_core::FareSchedule;
use tandem_geo::HaversineEstimator;
use tandem_match::{MatchConfig, MatchEngine};
use tandem_store::MemoryStore;
use tandem_trip::{TripPolicy, TripService};
use tower::util::ServiceExt;

fn test_app() -> axum::Router {
    let store = Arc::new(MemoryStore::new());
    let estimator = Arc::new(HaversineEstimator::default());

    let trips = Arc::new(TripService::new(
        store.clone(),
        estimator.clone(),
        Arc::new(LogNotifier),
        FareSchedule::default(),
        TripPolicy::default(),
    ));
    let matching = Arc::new(MatchEngine::new(
        store,
        estimator,
        FareSchedule::default(),
        MatchConfig::default(),
    ));

    app(AppState { trips, matching })
}

fn post(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-tandem-user", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn new_trip_body() -> Value {
    json!({
        "origin": { "lat": 43.2500, "lng": -79.9200 },
        "origin_address": "Main St W",
        "destination": { "lat": 43.2609, "lng": -79.9192 },
        "destination_address": "University Ave",
        "departure_time": (Utc::now() + Duration::minutes(20)).to_rfc3339(),
        "max_seats": 4
    })
}

#[tokio::test]
async fn test_find_matches_returns_empty_list() {
    let app = test_app();
    let body = json!({
        "origin": { "lat": 43.2520, "lng": -79.9180 },
        "destination": { "lat": 43.2609, "lng": -79.9192 },
        "desired_arrival": (Utc::now() + Duration::hours(2)).to_rfc3339()
    });

    let response = app
        .oneshot(post("/v1/matches", Some("rider-1"), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let app = test_app();
    let response = app
        .oneshot(post("/v1/trips", None, new_trip_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_accept_flow_over_http() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(post("/v1/trips", Some("driver-1"), new_trip_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let trip = body_json(response).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();
    assert_eq!(trip["status"], "pending");

    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/trips/{trip_id}/requests"),
            Some("rider-1"),
            json!({ "pickup": { "lat": 43.2525, "lng": -79.9195 } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let request = body_json(response).await;
    let request_id = request["id"].as_str().unwrap().to_string();
    assert_eq!(request["status"], "pending");

    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/requests/{request_id}/accept"),
            Some("driver-1"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let accepted = body_json(response).await;
    assert_eq!(accepted["status"], "accepted");

    // Completing before starting is a state conflict.
    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/trips/{trip_id}/complete"),
            Some("driver-1"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_foreign_trip_actions_are_forbidden() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(post("/v1/trips", Some("driver-1"), new_trip_body()))
        .await
        .unwrap();
    let trip = body_json(response).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(post(
            &format!("/v1/trips/{trip_id}/cancel"),
            Some("driver-2"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
