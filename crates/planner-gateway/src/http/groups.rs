//! Group endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use planner_directory::{Group, GroupSettings, NewGroup};

use crate::app::AppState;
use crate::http::error::{bad_request, from_directory_error, ApiError};

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub creator_id: i64,
    #[serde(default)]
    pub users_ids: Vec<i64>,
    pub color: String,
}

/// POST /groups — create a group with its initial members.
pub async fn create_group_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    if req.name.is_empty() {
        return Err(bad_request("name must be provided"));
    }
    validate_color(&req.color)?;

    let group = state
        .directory
        .create_group(&NewGroup {
            name: req.name,
            creator_id: req.creator_id,
            user_ids: req.users_ids,
            color: req.color,
        })
        .map_err(from_directory_error)?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// GET /groups/{id} — one group with its member id list.
pub async fn get_group_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Group>, ApiError> {
    let group = state.directory.get_group(id).map_err(from_directory_error)?;
    Ok(Json(group))
}

#[derive(Deserialize)]
pub struct UpdateGroupRequest {
    pub name: String,
}

/// PUT /groups/{id} — rename a group.
pub async fn update_group_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateGroupRequest>,
) -> Result<StatusCode, ApiError> {
    if req.name.is_empty() {
        return Err(bad_request("name must be provided"));
    }
    state
        .directory
        .update_group_name(id, &req.name)
        .map_err(from_directory_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i64,
    pub color: String,
}

/// POST /groups/{id}/members — add a user to the group.
pub async fn add_member_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AddMemberRequest>,
) -> Result<StatusCode, ApiError> {
    validate_color(&req.color)?;
    // Reject unknown targets up front so the membership row never dangles.
    state.directory.get_group(id).map_err(from_directory_error)?;
    state
        .directory
        .get_user(req.user_id)
        .map_err(from_directory_error)?;
    state
        .directory
        .add_member(&GroupSettings {
            user_id: req.user_id,
            group_id: id,
            color: req.color,
            notify: true,
        })
        .map_err(from_directory_error)?;
    Ok(StatusCode::CREATED)
}

/// DELETE /groups/{id}/members/{user_id} — remove a user from the group.
pub async fn remove_member_handler(
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state
        .directory
        .remove_member(id, user_id)
        .map_err(from_directory_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub user_id: i64,
    pub color: String,
    pub notify: bool,
}

/// PUT /groups/{id}/settings — one member's color and notify flag.
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<StatusCode, ApiError> {
    validate_color(&req.color)?;
    state
        .directory
        .update_settings(&GroupSettings {
            user_id: req.user_id,
            group_id: id,
            color: req.color,
            notify: req.notify,
        })
        .map_err(from_directory_error)?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_color(color: &str) -> Result<(), ApiError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].bytes().all(|b| b.is_ascii_hexdigit());
    if !valid {
        return Err(bad_request(format!("invalid color {:?}", color)));
    }
    Ok(())
}
