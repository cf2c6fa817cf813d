use serde::Deserialize;
use std::env;
use tandem_core::FareSchedule;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub matching: MatchingConfig,
    pub trips: TripRulesConfig,
    pub estimator: EstimatorConfig,
    pub fares: FareSchedule,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    pub arrival_tolerance_min: i64,
    pub max_detour_seconds: u32,
    pub max_candidates: usize,
    pub match_threshold: f64,
    /// Test accounts allowed to request synthetic candidates.
    #[serde(default)]
    pub synthetic_rider_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TripRulesConfig {
    /// Trips must depart at least this far in the future when created.
    pub min_lead_minutes: i64,
    /// Drivers may not start a trip earlier than this before departure.
    pub pre_departure_window_minutes: i64,
    pub default_detour_tolerance_min: u16,
    pub max_seats: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EstimatorConfig {
    pub avg_speed_kmh: f64,
    pub road_factor: f64,
    pub timeout_ms: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("TANDEM").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
