//! `planner-events` — event series storage, recurrence expansion, and the
//! event lifecycle service.
//!
//! # Model
//!
//! A **series** is the stored row: anchor start/end, repeat frequency,
//! canonical recurrence text, an exception set, and content fields. An
//! **occurrence** is one concrete instantiation of a series at a specific
//! start instant — computed on every read, never stored. Clients address
//! occurrences with the composite id `"{series_id}_{unix_start}"`.
//!
//! # Modules
//!
//! - [`rule`] — canonical recurrence text codec + occurrence math
//! - [`expand`] — series + window → visible occurrences
//! - [`store`] — SQLite row mapping and CRUD
//! - [`service`] — create/update/delete semantics for series vs. instances
//! - [`db`] — schema migrations

pub mod db;
pub mod error;
pub mod expand;
pub mod rule;
pub mod service;
pub mod store;
pub mod types;

pub use error::{EventError, Result};
pub use rule::RecurrenceRule;
pub use service::EventService;
pub use types::{
    Attachment, EventContent, EventKind, EventSeries, EventsFilter, Occurrence, OccurrenceId,
    RepeatFrequency,
};
