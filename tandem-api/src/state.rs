use std::sync::Arc;

use tandem_match::MatchEngine;
use tandem_trip::TripService;

#[derive(Clone)]
pub struct AppState {
    pub trips: Arc<TripService>,
    pub matching: Arc<MatchEngine>,
}
