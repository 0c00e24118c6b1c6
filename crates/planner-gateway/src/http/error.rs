//! Error → HTTP response mapping.
//!
//! `NotFound` maps to 404, invalid input to 400, and everything
//! infrastructure-shaped to an opaque 500 — the detail goes to the log,
//! never to the caller.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;

use planner_directory::DirectoryError;
use planner_events::EventError;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

pub fn not_found() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "not found".to_string(),
        }),
    )
}

pub fn internal() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "internal server error".to_string(),
        }),
    )
}

pub fn from_event_error(e: EventError) -> ApiError {
    match e {
        EventError::NotFound => not_found(),
        EventError::MalformedRule(_)
        | EventError::UnknownFrequency(_)
        | EventError::UnknownKind(_)
        | EventError::MalformedId(_)
        | EventError::Invalid(_) => bad_request(e.to_string()),
        EventError::Database(_) | EventError::Serialization(_) => {
            error!(error = %e, "events storage failure");
            internal()
        }
    }
}

pub fn from_directory_error(e: DirectoryError) -> ApiError {
    match e {
        DirectoryError::UserNotFound { .. } | DirectoryError::GroupNotFound { .. } => not_found(),
        DirectoryError::Database(_) => {
            error!(error = %e, "directory storage failure");
            internal()
        }
    }
}
