//! `planner-core` — shared building blocks for the planner workspace.
//!
//! Holds the pieces every other crate needs: configuration loading
//! (`planner.toml` + `PLANNER_*` env overrides), the core error type, and
//! the fixed six-value notification lead-time vocabulary.

pub mod config;
pub mod error;
pub mod lead_time;

pub use config::PlannerConfig;
pub use error::{CoreError, Result};
pub use lead_time::LeadTime;
