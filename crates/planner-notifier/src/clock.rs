use chrono::{DateTime, Duration, Timelike, Utc};

/// Source of "now" for the tick loop.
///
/// Injected so tests can drive deterministic `[from, to)` windows instead of
/// the wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Truncate to the containing minute boundary.
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts - Duration::seconds(ts.second() as i64)
        - Duration::nanoseconds(ts.timestamp_subsec_nanos() as i64)
}
