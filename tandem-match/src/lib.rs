pub mod engine;
pub mod models;
pub mod scoring;
pub mod synthetic;

pub use engine::{MatchConfig, MatchEngine};
pub use models::{MatchQuery, PreferenceMode, RideMatch, ScoreBreakdown};
