pub mod locks;
pub mod sequencer;
pub mod service;
pub mod settlement;

pub use sequencer::{next_stop, NextStop};
pub use service::{
    PassengerAction, PassengerUpdate, RequestEstimates, TripCompletion, TripPolicy, TripService,
};
