use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error;
pub mod matches;
pub mod requests;
pub mod state;
pub mod trips;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static(auth::USER_HEADER),
        ]);

    Router::new()
        .merge(matches::routes())
        .merge(trips::routes())
        .merge(requests::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
