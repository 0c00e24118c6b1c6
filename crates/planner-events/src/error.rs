use thiserror::Error;

/// Errors that can occur within the events subsystem.
#[derive(Debug, Error)]
pub enum EventError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON (de)serialization of a stored column failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No series with the given id, or the timestamp is not a visible
    /// occurrence of the series.
    #[error("Event not found")]
    NotFound,

    /// Stored recurrence text does not match the recognized grammar.
    #[error("Malformed recurrence rule: {0}")]
    MalformedRule(String),

    /// A repeat-frequency wire code outside 0–5.
    #[error("Unknown repeat frequency code: {0}")]
    UnknownFrequency(u8),

    /// An event-kind wire code outside 0–1.
    #[error("Unknown event kind code: {0}")]
    UnknownKind(u8),

    /// A composite occurrence id that is not `digits '_' digits`.
    #[error("Malformed occurrence id: {0:?}")]
    MalformedId(String),

    /// Event content that violates a model invariant.
    #[error("Invalid event: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, EventError>;
