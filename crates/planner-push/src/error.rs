use thiserror::Error;

/// Errors that can occur while dispatching push messages.
#[derive(Debug, Error)]
pub enum PushError {
    /// Transport-level failure talking to the provider.
    #[error("Push transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Push request rejected: HTTP {status}")]
    Rejected { status: u16 },
}

pub type Result<T> = std::result::Result<T, PushError>;
