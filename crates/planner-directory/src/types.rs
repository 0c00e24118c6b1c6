use serde::{Deserialize, Serialize};

/// Full user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub photo: String,
    /// Push token registered by the mobile client; empty when the user has
    /// no registered device.
    pub push_token: String,
    /// Global notification opt-in. Off silences every group.
    pub notify: bool,
}

/// Fields required to create a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub photo: String,
}

/// A group with its member id list attached.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub creator_id: i64,
    pub user_ids: Vec<i64>,
}

/// Fields required to create a group. The creator becomes a member
/// automatically; `user_ids` lists the other initial members.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub creator_id: i64,
    pub user_ids: Vec<i64>,
    /// Calendar color assigned to every initial membership (`#rrggbb`).
    pub color: String,
}

/// One (user, group) membership row: display color + notification opt-in.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSettings {
    pub user_id: i64,
    pub group_id: i64,
    pub color: String,
    pub notify: bool,
}

/// Batch settings lookup. Empty lists mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct SettingsFilter {
    pub user_ids: Vec<i64>,
    pub group_ids: Vec<i64>,
}
