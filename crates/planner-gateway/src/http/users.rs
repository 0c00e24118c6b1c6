//! User endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use planner_directory::{Group, NewUser, User};

use crate::app::AppState;
use crate::http::error::{bad_request, from_directory_error, ApiError};

/// POST /users — register a user.
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if req.full_name.is_empty() {
        return Err(bad_request("full_name must be provided"));
    }
    if req.email.is_empty() {
        return Err(bad_request("email must be provided"));
    }
    let user = state
        .directory
        .create_user(&req)
        .map_err(from_directory_error)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/{id} — one user record.
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let user = state.directory.get_user(id).map_err(from_directory_error)?;
    Ok(Json(user))
}

/// GET /users/{id}/groups — the groups the user belongs to.
pub async fn get_user_groups_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Group>>, ApiError> {
    let groups = state
        .directory
        .get_user_groups(id)
        .map_err(from_directory_error)?;
    Ok(Json(groups))
}

#[derive(Deserialize)]
pub struct PushTokenRequest {
    pub push_token: String,
}

/// PUT /users/{id}/push_token — register the device token pushes go to.
pub async fn update_push_token_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<PushTokenRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .directory
        .update_push_token(id, &req.push_token)
        .map_err(from_directory_error)?;
    Ok(StatusCode::NO_CONTENT)
}
