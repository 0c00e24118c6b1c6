use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use planner_core::LeadTime;

use crate::error::EventError;

/// Whether an end time is semantically required.
///
/// Wire code 0 = event (has an end), 1 = reminder (point in time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EventKind {
    Event,
    Reminder,
}

impl From<EventKind> for u8 {
    fn from(kind: EventKind) -> u8 {
        match kind {
            EventKind::Event => 0,
            EventKind::Reminder => 1,
        }
    }
}

impl TryFrom<u8> for EventKind {
    type Error = EventError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(EventKind::Event),
            1 => Ok(EventKind::Reminder),
            other => Err(EventError::UnknownKind(other)),
        }
    }
}

/// Repeat frequency of a series. Wire codes 0–5, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum RepeatFrequency {
    #[default]
    None,
    Daily,
    EveryThreeDays,
    Weekly,
    Monthly,
    Yearly,
}

impl RepeatFrequency {
    pub fn is_repeating(self) -> bool {
        !matches!(self, RepeatFrequency::None)
    }
}

impl From<RepeatFrequency> for u8 {
    fn from(freq: RepeatFrequency) -> u8 {
        match freq {
            RepeatFrequency::None => 0,
            RepeatFrequency::Daily => 1,
            RepeatFrequency::EveryThreeDays => 2,
            RepeatFrequency::Weekly => 3,
            RepeatFrequency::Monthly => 4,
            RepeatFrequency::Yearly => 5,
        }
    }
}

impl TryFrom<u8> for RepeatFrequency {
    type Error = EventError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(RepeatFrequency::None),
            1 => Ok(RepeatFrequency::Daily),
            2 => Ok(RepeatFrequency::EveryThreeDays),
            3 => Ok(RepeatFrequency::Weekly),
            4 => Ok(RepeatFrequency::Monthly),
            5 => Ok(RepeatFrequency::Yearly),
            other => Err(EventError::UnknownFrequency(other)),
        }
    }
}

/// An uploaded file attached to a series. Opaque to this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub path: String,
}

/// The client-supplied content of a series — everything except the pieces
/// the lifecycle service derives itself (rule text, exceptions, series end).
#[derive(Debug, Clone)]
pub struct EventContent {
    pub group_id: i64,
    pub kind: EventKind,
    pub title: String,
    pub description: String,
    /// Display hint only — does not alter expansion math.
    pub all_day: bool,
    /// Anchor start: the first occurrence's start instant.
    pub from: DateTime<Utc>,
    /// Anchor end; `to - from` is the duration of every occurrence.
    pub to: DateTime<Utc>,
    pub repeat: RepeatFrequency,
    pub lead_times: Vec<LeadTime>,
    pub attachments: Vec<Attachment>,
}

/// The stored, canonical representation of one recurring or one-off event.
#[derive(Debug, Clone)]
pub struct EventSeries {
    pub id: i64,
    /// Canonical recurrence text; empty iff `content.repeat` is `None`.
    pub rule_text: String,
    /// Occurrence-start instants hidden from expansion (deleted or detached
    /// single occurrences). Set semantics: membership checks are O(1).
    pub exceptions: HashSet<DateTime<Utc>>,
    /// Series bound used by range queries. For non-repeating series this is
    /// the single occurrence's end; open-ended repeating series carry `None`.
    pub until: Option<DateTime<Utc>>,
    pub content: EventContent,
}

impl EventSeries {
    pub fn duration(&self) -> chrono::Duration {
        self.content.to - self.content.from
    }
}

/// Composite identity of one occurrence: `"{series_id}_{unix_start_seconds}"`.
///
/// This is the only identity clients hold for get/update/delete of a single
/// instance — occurrences have no row of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OccurrenceId {
    pub series_id: i64,
    pub start_unix: i64,
}

impl OccurrenceId {
    pub fn new(series_id: i64, start: DateTime<Utc>) -> Self {
        Self {
            series_id,
            start_unix: start.timestamp(),
        }
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.start_unix, 0)
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.series_id, self.start_unix)
    }
}

impl FromStr for OccurrenceId {
    type Err = EventError;

    /// Strict parse: ASCII digits, a single underscore, ASCII digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || EventError::MalformedId(s.to_string());

        let (series, start) = s.split_once('_').ok_or_else(malformed)?;
        if series.is_empty()
            || start.is_empty()
            || !series.bytes().all(|b| b.is_ascii_digit())
            || !start.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }

        Ok(Self {
            series_id: series.parse().map_err(|_| malformed())?,
            start_unix: start.parse().map_err(|_| malformed())?,
        })
    }
}

/// One concrete, ephemeral instantiation of a series. Never stored.
#[derive(Debug, Clone)]
pub struct Occurrence {
    pub id: OccurrenceId,
    pub group_id: i64,
    pub kind: EventKind,
    pub title: String,
    pub description: String,
    pub all_day: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub repeat: RepeatFrequency,
    pub lead_times: Vec<LeadTime>,
    pub attachments: Vec<Attachment>,
}

/// Range query over stored series. An empty `group_ids` means all groups.
#[derive(Debug, Clone)]
pub struct EventsFilter {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub group_ids: Vec<i64>,
}
