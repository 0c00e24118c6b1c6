use async_trait::async_trait;

use crate::error::Result;
use crate::message::PushMessage;

/// Provider-imposed cap on messages per batch request.
pub const BATCH_SIZE: usize = 500;

/// Common interface implemented by every push backend.
///
/// Implementations must be `Send + Sync` so the notifier can hold one behind
/// an `Arc<dyn PushDispatcher>` and call it from its tick tasks.
#[async_trait]
pub trait PushDispatcher: Send + Sync {
    /// Deliver a single message.
    async fn send(&self, message: &PushMessage) -> Result<()>;

    /// Deliver a batch, internally chunked at [`BATCH_SIZE`] messages per
    /// provider request. Chunks are sent concurrently; the first chunk
    /// failure is reported, per-message partial failures are not.
    async fn send_batch(&self, messages: &[PushMessage]) -> Result<()>;
}
