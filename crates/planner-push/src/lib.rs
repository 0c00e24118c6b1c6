//! `planner-push` — the push delivery boundary.
//!
//! The notifier hands over a batch of [`PushMessage`]s once per tick; what
//! happens after that is this crate's concern. Delivery is best-effort,
//! at-least-once: a failed batch call is reported once, per-message partial
//! failures inside a provider batch are not surfaced back.

pub mod dispatcher;
pub mod error;
pub mod http;
pub mod message;

pub use dispatcher::PushDispatcher;
pub use error::{PushError, Result};
pub use http::{HttpPushDispatcher, LogPushDispatcher};
pub use message::PushMessage;
