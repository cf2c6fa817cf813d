use axum::http::HeaderMap;

use crate::error::ApiError;

/// Header carrying the pre-authenticated actor id. Session handling lives in
/// the gateway in front of this service; by the time a request lands here
/// the user is already verified.
pub const USER_HEADER: &str = "x-tandem-user";

pub fn actor(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::Unauthenticated)
}
