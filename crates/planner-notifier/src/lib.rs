//! `planner-notifier` — the notification scheduler.
//!
//! One instance per process runs a minute-aligned tick loop. Each tick owns
//! a half-open wall-clock window `[from, to)` and selects exactly the
//! (occurrence, lead-time) pairs whose notify instant — occurrence start
//! minus lead — falls inside it, so every notify instant belongs to exactly
//! one window and nothing fires twice. Recipients are resolved from a
//! per-tick snapshot of groups, users, and settings, then the whole batch
//! goes to the push dispatcher in one call.
//!
//! Best-effort by design: a failed tick is logged and the loop continues;
//! windows that pass while the process is down are not recovered.

pub mod clock;
pub mod engine;
pub mod error;

pub use clock::{Clock, SystemClock};
pub use engine::Notifier;
pub use error::{NotifierError, Result};
