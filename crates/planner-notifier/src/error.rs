use thiserror::Error;

/// Errors that can occur during a notification tick.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Events error: {0}")]
    Events(#[from] planner_events::EventError),

    #[error("Directory error: {0}")]
    Directory(#[from] planner_directory::DirectoryError),

    #[error("Push error: {0}")]
    Push(#[from] planner_push::PushError),
}

pub type Result<T> = std::result::Result<T, NotifierError>;
