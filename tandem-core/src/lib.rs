pub mod error;
pub mod fare;
pub mod notifier;
pub mod preferences;
pub mod repository;
pub mod request;
pub mod settlement;
pub mod trip;

pub use error::Error;
pub use fare::FareSchedule;
pub use notifier::{BroadcastNotifier, LogNotifier, Notifier};
pub use preferences::RiderPreferences;
pub use repository::{DepartureWindow, TripStore};
pub use request::{PassengerRequest, RequestStatus};
pub use settlement::{PassengerFare, Settlement};
pub use trip::{NewTrip, Trip, TripStatus};
