use uuid::Uuid;

/// Failure taxonomy shared by every layer of the engine.
///
/// Validation and state errors carry enough context for a caller-facing
/// message and are never retried automatically. `ConcurrencyConflict` may be
/// retried once under the owning trip's lock before surfacing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{action} not allowed while {entity} is {state}")]
    StateConflict {
        entity: &'static str,
        state: &'static str,
        action: &'static str,
    },

    #[error("trip {trip_id} has no available seats")]
    CapacityExceeded { trip_id: Uuid },

    #[error("lost a concurrent update race, caller may retry")]
    ConcurrencyConflict,

    #[error("route estimator unavailable")]
    EstimatorUnavailable,

    #[error("{0}")]
    Forbidden(String),

    #[error("storage failure: {0}")]
    Store(String),
}

impl Error {
    /// Wrap a backend error from the persistence layer.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Error::Store(err.to_string())
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Error::NotFound { entity, id }
    }
}
