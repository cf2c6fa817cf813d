pub mod events;
pub mod geo;

pub use events::TripEvent;
pub use geo::Coord;
