//! SQLite persistence for event series.
//!
//! Every method takes a `&Connection` so the same code runs against the
//! service's long-lived connection or inside a transaction (`Transaction`
//! derefs to `Connection`) — the instance-detach path relies on that.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, params_from_iter, Connection};
use tracing::warn;

use planner_core::LeadTime;

use crate::error::{EventError, Result};
use crate::types::{
    Attachment, EventContent, EventKind, EventSeries, EventsFilter, RepeatFrequency,
};

const SELECT_COLUMNS: &str = "id, group_id, kind, title, description, all_day, repeat, \
     start_date, end_date, duration_secs, rule, exceptions, lead_times, attachments";

/// Stateless repository for the `events` table.
#[derive(Debug, Default)]
pub struct EventStore;

impl EventStore {
    /// Insert a new series and return its id. The exception set of a fresh
    /// series is always empty.
    pub fn create(
        &self,
        conn: &Connection,
        content: &EventContent,
        rule_text: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO events
             (group_id, kind, title, description, all_day, repeat, start_date,
              end_date, duration_secs, rule, exceptions, lead_times, attachments,
              created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,'[]',?11,?12,?13,?13)",
            params![
                content.group_id,
                u8::from(content.kind) as i64,
                content.title,
                content.description,
                content.all_day as i64,
                u8::from(content.repeat) as i64,
                content.from.timestamp(),
                until.map(|u| u.timestamp()),
                (content.to - content.from).num_seconds(),
                rule_text,
                encode_lead_times(&content.lead_times)?,
                serde_json::to_string(&content.attachments)?,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Fetch one series by id. `NotFound` when no row exists.
    pub fn get(&self, conn: &Connection, id: i64) -> Result<EventSeries> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM events WHERE id = ?1",
            SELECT_COLUMNS
        ))?;
        let raw = stmt.query_row(params![id], read_raw).map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => EventError::NotFound,
            other => EventError::Database(other),
        })?;
        into_series(raw)
    }

    /// All series that can produce occurrences overlapping the filter window:
    /// the anchor starts on or before `to`, and the series bound (if any)
    /// ends at or after `from` — the same keep-rule the expander applies,
    /// so a zero-duration reminder touching the window edge is not pruned.
    pub fn list(&self, conn: &Connection, filter: &EventsFilter) -> Result<Vec<EventSeries>> {
        let mut sql = format!(
            "SELECT {} FROM events
             WHERE start_date <= ?1 AND (end_date IS NULL OR end_date >= ?2)",
            SELECT_COLUMNS
        );
        let mut args = vec![filter.to.timestamp(), filter.from.timestamp()];
        if !filter.group_ids.is_empty() {
            let placeholders = vec!["?"; filter.group_ids.len()].join(",");
            sql.push_str(&format!(" AND group_id IN ({})", placeholders));
            args.extend_from_slice(&filter.group_ids);
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), read_raw)?;

        let mut res = Vec::new();
        for row in rows {
            res.push(into_series(row?)?);
        }
        Ok(res)
    }

    /// Overwrite a stored series. `NotFound` when no row matches.
    pub fn update(&self, conn: &Connection, series: &EventSeries) -> Result<()> {
        let content = &series.content;
        let n = conn.execute(
            "UPDATE events SET
               group_id = ?1, kind = ?2, title = ?3, description = ?4,
               all_day = ?5, repeat = ?6, start_date = ?7, end_date = ?8,
               duration_secs = ?9, rule = ?10, exceptions = ?11,
               lead_times = ?12, attachments = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                content.group_id,
                u8::from(content.kind) as i64,
                content.title,
                content.description,
                content.all_day as i64,
                u8::from(content.repeat) as i64,
                content.from.timestamp(),
                series.until.map(|u| u.timestamp()),
                (content.to - content.from).num_seconds(),
                series.rule_text,
                encode_exceptions(&series.exceptions)?,
                encode_lead_times(&content.lead_times)?,
                serde_json::to_string(&content.attachments)?,
                Utc::now().to_rfc3339(),
                series.id,
            ],
        )?;
        if n == 0 {
            return Err(EventError::NotFound);
        }
        Ok(())
    }

    /// Remove a series row (and with it, implicitly, every occurrence).
    pub fn delete(&self, conn: &Connection, id: i64) -> Result<()> {
        let n = conn.execute("DELETE FROM events WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(EventError::NotFound);
        }
        Ok(())
    }
}

// --- row mapping -----------------------------------------------------------

struct RawSeries {
    id: i64,
    group_id: i64,
    kind: i64,
    title: String,
    description: String,
    all_day: i64,
    repeat: i64,
    start_date: i64,
    end_date: Option<i64>,
    duration_secs: i64,
    rule: String,
    exceptions: String,
    lead_times: String,
    attachments: String,
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSeries> {
    Ok(RawSeries {
        id: row.get(0)?,
        group_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        all_day: row.get(5)?,
        repeat: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        duration_secs: row.get(9)?,
        rule: row.get(10)?,
        exceptions: row.get(11)?,
        lead_times: row.get(12)?,
        attachments: row.get(13)?,
    })
}

fn into_series(raw: RawSeries) -> Result<EventSeries> {
    let kind = EventKind::try_from(raw.kind as u8)?;
    let repeat = RepeatFrequency::try_from(raw.repeat as u8)?;

    let from = instant(raw.start_date)?;
    let to = from + Duration::seconds(raw.duration_secs);
    let until = raw.end_date.map(instant).transpose()?;

    let exception_secs: Vec<i64> = serde_json::from_str(&raw.exceptions)?;
    let mut exceptions = HashSet::with_capacity(exception_secs.len());
    for secs in exception_secs {
        exceptions.insert(instant(secs)?);
    }

    // Defensive decode: the vocabulary is validated on write, but a value
    // outside it must not poison reads for the whole series.
    let lead_secs: Vec<i64> = serde_json::from_str(&raw.lead_times)?;
    let mut lead_times = Vec::with_capacity(lead_secs.len());
    for secs in lead_secs {
        match LeadTime::from_seconds(secs) {
            Ok(lt) => lead_times.push(lt),
            Err(e) => {
                warn!(series_id = raw.id, error = %e, "skipping unrecognized stored lead time")
            }
        }
    }

    let attachments: Vec<Attachment> = serde_json::from_str(&raw.attachments)?;

    Ok(EventSeries {
        id: raw.id,
        rule_text: raw.rule,
        exceptions,
        until,
        content: EventContent {
            group_id: raw.group_id,
            kind,
            title: raw.title,
            description: raw.description,
            all_day: raw.all_day != 0,
            from,
            to,
            repeat,
            lead_times,
            attachments,
        },
    })
}

fn instant(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| EventError::Invalid(format!("timestamp {} out of range", secs)))
}

fn encode_lead_times(lead_times: &[LeadTime]) -> Result<String> {
    let secs: Vec<i64> = lead_times.iter().map(|lt| lt.seconds()).collect();
    Ok(serde_json::to_string(&secs)?)
}

fn encode_exceptions(exceptions: &HashSet<DateTime<Utc>>) -> Result<String> {
    // Sorted for deterministic rows; the in-memory form stays a set.
    let mut secs: Vec<i64> = exceptions.iter().map(|e| e.timestamp()).collect();
    secs.sort_unstable();
    Ok(serde_json::to_string(&secs)?)
}
