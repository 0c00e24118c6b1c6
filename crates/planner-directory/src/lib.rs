//! `planner-directory` — users, groups, and per-(user, group) notification
//! settings.
//!
//! The notifier reads this directory in batches every tick (groups with
//! member lists, users with push tokens, settings rows); the gateway writes
//! it through the usual CRUD surface. Group creation inserts the group row
//! and all membership rows inside one transaction.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{DirectoryError, Result};
pub use store::Directory;
pub use types::{Group, GroupSettings, NewGroup, NewUser, SettingsFilter, User};
