use thiserror::Error;

/// Errors that can occur within the directory subsystem.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No user with the given id.
    #[error("User not found: {id}")]
    UserNotFound { id: i64 },

    /// No group with the given id.
    #[error("Group not found: {id}")]
    GroupNotFound { id: i64 },
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
