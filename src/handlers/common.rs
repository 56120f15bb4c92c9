use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use validator::Validate;

use crate::errors::ServiceError;

/// 200 with a JSON body.
pub fn success<T: Serialize>(body: T) -> impl IntoResponse {
    (StatusCode::OK, Json(body))
}

/// 201 with a JSON body.
pub fn created<T: Serialize>(body: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(body))
}

/// 204 with no body.
pub fn no_content() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

/// Runs `validator` checks on a request body and converts failures into the
/// standard 400 response.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(ServiceError::from)
}
