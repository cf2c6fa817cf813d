use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tandem_core::Error;

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    Core(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "missing authenticated user".to_string(),
            ),
            ApiError::Core(err) => match &err {
                Error::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                Error::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
                Error::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
                Error::StateConflict { .. }
                | Error::CapacityExceeded { .. }
                | Error::ConcurrencyConflict => (StatusCode::CONFLICT, err.to_string()),
                Error::EstimatorUnavailable => {
                    (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
                }
                Error::Store(detail) => {
                    tracing::error!("storage failure: {detail}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_string(),
                    )
                }
            },
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
