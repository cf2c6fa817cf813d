use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tandem_api::{app, AppState};
use tandem_core::notifier::BroadcastNotifier;
use tandem_geo::{BoundedEstimator, HaversineEstimator, RouteEstimator};
use tandem_match::{MatchConfig, MatchEngine};
use tandem_store::PgStore;
use tandem_trip::{TripPolicy, TripService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = tandem_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Tandem API on port {}", config.server.port);

    let store = PgStore::connect(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    store.migrate().await.expect("Failed to run migrations");
    let store = Arc::new(store);

    let estimator: Arc<dyn RouteEstimator> = Arc::new(BoundedEstimator::new(
        HaversineEstimator {
            road_factor: config.estimator.road_factor,
            avg_speed_kmh: config.estimator.avg_speed_kmh,
        },
        Duration::from_millis(config.estimator.timeout_ms),
    ));

    let notifier = Arc::new(BroadcastNotifier::new(256));

    let trips = Arc::new(TripService::new(
        store.clone(),
        estimator.clone(),
        notifier,
        config.fares.clone(),
        TripPolicy {
            min_lead_minutes: config.trips.min_lead_minutes,
            pre_departure_window_minutes: config.trips.pre_departure_window_minutes,
            default_detour_tolerance_min: config.trips.default_detour_tolerance_min,
            max_seats: config.trips.max_seats,
        },
    ));

    let matching = Arc::new(MatchEngine::new(
        store,
        estimator,
        config.fares.clone(),
        MatchConfig {
            arrival_tolerance_min: config.matching.arrival_tolerance_min,
            max_detour_seconds: config.matching.max_detour_seconds,
            max_candidates: config.matching.max_candidates,
            match_threshold: config.matching.match_threshold,
            synthetic_rider_ids: config.matching.synthetic_rider_ids.clone(),
        },
    ));

    let app = app(AppState { trips, matching });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
