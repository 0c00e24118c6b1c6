//! Event lifecycle service.
//!
//! Client operations are always phrased against one target occurrence; this
//! service translates them into series-level storage mutations:
//!
//! - whole-series update shifts the anchor by the difference between the new
//!   start and the addressed occurrence, regenerates the recurrence text
//!   around the shifted anchor, and shifts every recorded exception by the
//!   same amount;
//! - single-instance update detaches the occurrence: the original instant is
//!   excepted and a standalone non-repeating series is inserted, both inside
//!   one transaction;
//! - single-instance delete records an exception.
//!
//! For a non-repeating series there is exactly one occurrence, so instance
//! operations collapse to their whole-series counterparts here — every
//! caller inherits that rule.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::debug;

use crate::error::{EventError, Result};
use crate::expand;
use crate::rule::RecurrenceRule;
use crate::store::EventStore;
use crate::types::{EventContent, EventSeries, EventsFilter, Occurrence, OccurrenceId};

/// Lifecycle manager over the events store.
///
/// Thread-safe: the SQLite connection is wrapped in a `Mutex`; the recurrence
/// math itself is pure and lock-free.
pub struct EventService {
    db: Mutex<Connection>,
    store: EventStore,
}

impl EventService {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
            store: EventStore,
        }
    }

    /// Create a series and return its first occurrence.
    pub fn create_event(&self, content: EventContent) -> Result<Occurrence> {
        validate_content(&content)?;

        let rule_text = if content.repeat.is_repeating() {
            RecurrenceRule::new(content.repeat, content.from, None)?.encode()
        } else {
            String::new()
        };
        // Non-repeating series are bounded by their own end so range queries
        // can prune them; repeating series stay open-ended.
        let until = (!content.repeat.is_repeating()).then_some(content.to);

        let conn = self.db.lock().unwrap();
        let id = self.store.create(&conn, &content, &rule_text, until)?;
        debug!(series_id = id, repeat = ?content.repeat, "event series created");

        Ok(Occurrence {
            id: OccurrenceId::new(id, content.from),
            group_id: content.group_id,
            kind: content.kind,
            title: content.title,
            description: content.description,
            all_day: content.all_day,
            start: content.from,
            end: content.to,
            repeat: content.repeat,
            lead_times: content.lead_times,
            attachments: content.attachments,
        })
    }

    /// The occurrence of series `id` starting exactly at `ts`.
    pub fn get_event(&self, id: i64, ts: DateTime<Utc>) -> Result<Occurrence> {
        let conn = self.db.lock().unwrap();
        let series = self.store.get(&conn, id)?;
        expand::occurrence_at(&series, ts)
    }

    /// All visible occurrences overlapping the filter window, ascending by
    /// start. Same-instant occurrences from different series keep storage
    /// order (stable sort).
    pub fn get_events(&self, filter: &EventsFilter) -> Result<Vec<Occurrence>> {
        let series = {
            let conn = self.db.lock().unwrap();
            self.store.list(&conn, filter)?
        };

        let mut res = Vec::new();
        for s in &series {
            res.extend(expand::expand_series(s, filter.from, filter.to)?);
        }
        res.sort_by_key(|o| o.start);
        Ok(res)
    }

    /// Update the whole series, addressed through the occurrence at `ts`.
    pub fn update_event(&self, id: i64, ts: DateTime<Utc>, content: EventContent) -> Result<()> {
        validate_content(&content)?;
        let conn = self.db.lock().unwrap();
        self.update_whole(&conn, id, ts, content)
    }

    /// Update exactly one occurrence by detaching it into a standalone
    /// non-repeating series. Both steps commit atomically: on any failure
    /// no exception is recorded and no new series exists.
    pub fn update_event_instance(
        &self,
        id: i64,
        ts: DateTime<Utc>,
        content: EventContent,
    ) -> Result<()> {
        validate_content(&content)?;
        let mut conn = self.db.lock().unwrap();
        let old = self.store.get(&conn, id)?;

        // One occurrence total: instance semantics equal series semantics.
        if !old.content.repeat.is_repeating() {
            return self.update_whole(&conn, id, ts, content);
        }

        let tx = conn.transaction()?;
        {
            let mut hidden = old.clone();
            hidden.exceptions.insert(ts);
            self.store.update(&tx, &hidden)?;

            let standalone = EventContent {
                group_id: content.group_id,
                kind: content.kind,
                title: content.title,
                description: content.description,
                all_day: content.all_day,
                from: content.from,
                to: content.to,
                repeat: crate::types::RepeatFrequency::None,
                lead_times: content.lead_times,
                // Attachments stay with the series; the detached copy keeps them.
                attachments: old.content.attachments.clone(),
            };
            let until = standalone.to;
            self.store.create(&tx, &standalone, "", Some(until))?;
        }
        tx.commit()?;

        debug!(series_id = id, ts = %ts, "occurrence detached into standalone event");
        Ok(())
    }

    /// Remove the series row and with it all occurrences, past and future.
    pub fn delete_event(&self, id: i64) -> Result<()> {
        let conn = self.db.lock().unwrap();
        self.store.delete(&conn, id)
    }

    /// Hide exactly one occurrence. The series and all other occurrences
    /// remain.
    pub fn delete_event_instance(&self, id: i64, ts: DateTime<Utc>) -> Result<()> {
        let conn = self.db.lock().unwrap();
        let mut series = self.store.get(&conn, id)?;

        if !series.content.repeat.is_repeating() {
            return self.store.delete(&conn, id);
        }

        series.exceptions.insert(ts);
        self.store.update(&conn, &series)
    }

    fn update_whole(
        &self,
        conn: &Connection,
        id: i64,
        ts: DateTime<Utc>,
        content: EventContent,
    ) -> Result<()> {
        let old = self.store.get(conn, id)?;

        // The caller addressed the occurrence at `ts`; moving it to
        // `content.from` shifts the whole series by the same amount.
        let diff = content.from - ts;
        let from = old.content.from + diff;
        let to = from + (content.to - content.from);

        let repeating = old.content.repeat.is_repeating();
        let rule_text = if repeating && from != old.content.from {
            // The rule's start-of-series must track the new first occurrence.
            RecurrenceRule::new(old.content.repeat, from, None)?.encode()
        } else {
            old.rule_text.clone()
        };

        let exceptions = if diff != Duration::zero() {
            old.exceptions.iter().map(|e| *e + diff).collect()
        } else {
            old.exceptions.clone()
        };

        let until = (!repeating).then_some(to);

        self.store.update(
            conn,
            &EventSeries {
                id: old.id,
                rule_text,
                exceptions,
                until,
                content: EventContent {
                    group_id: content.group_id,
                    kind: content.kind,
                    title: content.title,
                    description: content.description,
                    all_day: content.all_day,
                    from,
                    to,
                    // The repeat frequency of a series never changes after
                    // creation; attachments are managed at upload time.
                    repeat: old.content.repeat,
                    lead_times: content.lead_times,
                    attachments: old.content.attachments,
                },
            },
        )
    }
}

fn validate_content(content: &EventContent) -> Result<()> {
    if content.to < content.from {
        return Err(EventError::Invalid(
            "event end precedes its start".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::types::{EventKind, RepeatFrequency};
    use chrono::TimeZone;
    use planner_core::LeadTime;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn service() -> EventService {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        EventService::new(conn)
    }

    fn content(repeat: RepeatFrequency, from: DateTime<Utc>, to: DateTime<Utc>) -> EventContent {
        EventContent {
            group_id: 1,
            kind: EventKind::Event,
            title: "standup".to_string(),
            description: String::new(),
            all_day: false,
            from,
            to,
            repeat,
            lead_times: vec![],
            attachments: vec![],
        }
    }

    fn window(svc: &EventService, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Occurrence> {
        svc.get_events(&EventsFilter {
            from,
            to,
            group_ids: vec![],
        })
        .unwrap()
    }

    #[test]
    fn non_repeating_event_round_trips_through_a_window() {
        let svc = service();
        let from = utc(2024, 1, 1, 10, 0);
        let to = utc(2024, 1, 1, 11, 0);
        svc.create_event(content(RepeatFrequency::None, from, to))
            .unwrap();

        let occurrences = window(&svc, from, to);
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].start, from);
        assert_eq!(occurrences[0].end, to);
        assert!(occurrences[0].lead_times.is_empty());
    }

    #[test]
    fn create_rejects_inverted_times() {
        let svc = service();
        let err = svc
            .create_event(content(
                RepeatFrequency::None,
                utc(2024, 1, 2, 0, 0),
                utc(2024, 1, 1, 0, 0),
            ))
            .unwrap_err();
        assert!(matches!(err, EventError::Invalid(_)));
    }

    #[test]
    fn get_event_validates_the_instant() {
        let svc = service();
        let from = utc(2024, 1, 1, 9, 0);
        let created = svc
            .create_event(content(
                RepeatFrequency::Daily,
                from,
                utc(2024, 1, 1, 9, 30),
            ))
            .unwrap();
        let id = created.id.series_id;

        assert!(svc.get_event(id, utc(2024, 1, 5, 9, 0)).is_ok());
        assert!(matches!(
            svc.get_event(id, utc(2024, 1, 5, 9, 1)),
            Err(EventError::NotFound)
        ));
        assert!(matches!(
            svc.get_event(id + 100, from),
            Err(EventError::NotFound)
        ));
    }

    #[test]
    fn whole_series_update_shifts_anchor_rule_and_exceptions() {
        let svc = service();
        let anchor = utc(2024, 1, 1, 9, 0);
        let created = svc
            .create_event(content(
                RepeatFrequency::Daily,
                anchor,
                utc(2024, 1, 1, 9, 30),
            ))
            .unwrap();
        let id = created.id.series_id;

        // Hide Jan 3 before the shift.
        svc.delete_event_instance(id, utc(2024, 1, 3, 9, 0)).unwrap();

        // Address the Jan 5 occurrence and move it +2 days (same time).
        let mut update = content(
            RepeatFrequency::Daily,
            utc(2024, 1, 7, 9, 0),
            utc(2024, 1, 7, 9, 30),
        );
        update.title = "moved standup".to_string();
        svc.update_event(id, utc(2024, 1, 5, 9, 0), update).unwrap();

        // New anchor is Jan 3; the shifted exception hides Jan 5 now.
        let occurrences = window(&svc, utc(2024, 1, 1, 0, 0), utc(2024, 1, 8, 0, 0));
        let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 3, 9, 0),
                utc(2024, 1, 4, 9, 0),
                utc(2024, 1, 6, 9, 0),
                utc(2024, 1, 7, 9, 0),
            ]
        );
        assert!(occurrences.iter().all(|o| o.title == "moved standup"));

        // The regenerated rule anchors at the new first occurrence.
        assert_eq!(
            svc.get_event(id, utc(2024, 1, 3, 9, 0)).unwrap().start,
            utc(2024, 1, 3, 9, 0)
        );
        assert!(matches!(
            svc.get_event(id, utc(2024, 1, 1, 9, 0)),
            Err(EventError::NotFound)
        ));
    }

    #[test]
    fn instance_update_detaches_a_standalone_event() {
        let svc = service();
        let anchor = utc(2024, 1, 1, 9, 0);
        let created = svc
            .create_event(content(
                RepeatFrequency::Daily,
                anchor,
                utc(2024, 1, 1, 9, 30),
            ))
            .unwrap();
        let id = created.id.series_id;

        let detached_ts = utc(2024, 1, 3, 9, 0);
        let mut replacement = content(
            RepeatFrequency::None,
            utc(2024, 1, 3, 14, 0),
            utc(2024, 1, 3, 15, 0),
        );
        replacement.title = "offsite".to_string();
        replacement.lead_times = vec![LeadTime::Hour];
        svc.update_event_instance(id, detached_ts, replacement)
            .unwrap();

        let occurrences = window(&svc, utc(2024, 1, 1, 0, 0), utc(2024, 1, 4, 0, 0));
        let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();

        // The original instant is gone; the standalone replacement exists.
        assert!(!starts.contains(&detached_ts));
        let detached: Vec<_> = occurrences.iter().filter(|o| o.title == "offsite").collect();
        assert_eq!(detached.len(), 1);
        assert_eq!(detached[0].start, utc(2024, 1, 3, 14, 0));
        assert_eq!(detached[0].end, utc(2024, 1, 3, 15, 0));
        assert_eq!(detached[0].repeat, RepeatFrequency::None);
        assert_eq!(detached[0].lead_times, vec![LeadTime::Hour]);
        assert_ne!(detached[0].id.series_id, id);
    }

    #[test]
    fn instance_ops_on_non_repeating_series_take_the_whole_series_path() {
        let svc = service();
        let created = svc
            .create_event(content(
                RepeatFrequency::None,
                utc(2024, 1, 1, 10, 0),
                utc(2024, 1, 1, 11, 0),
            ))
            .unwrap();
        let id = created.id.series_id;

        // Instance delete removes the row entirely, not an exception.
        svc.delete_event_instance(id, utc(2024, 1, 1, 10, 0))
            .unwrap();
        assert!(matches!(
            svc.get_event(id, utc(2024, 1, 1, 10, 0)),
            Err(EventError::NotFound)
        ));
    }

    #[test]
    fn instance_delete_hides_one_occurrence_only() {
        let svc = service();
        let anchor = utc(2024, 1, 1, 9, 0);
        let created = svc
            .create_event(content(
                RepeatFrequency::Weekly,
                anchor,
                utc(2024, 1, 1, 10, 0),
            ))
            .unwrap();
        let id = created.id.series_id;

        svc.delete_event_instance(id, utc(2024, 1, 8, 9, 0)).unwrap();

        let starts: Vec<_> = window(&svc, utc(2024, 1, 1, 0, 0), utc(2024, 1, 22, 0, 0))
            .iter()
            .map(|o| o.start)
            .collect();
        assert_eq!(starts, vec![utc(2024, 1, 1, 9, 0), utc(2024, 1, 15, 9, 0)]);
    }

    #[test]
    fn delete_event_removes_every_occurrence() {
        let svc = service();
        let created = svc
            .create_event(content(
                RepeatFrequency::Daily,
                utc(2024, 1, 1, 9, 0),
                utc(2024, 1, 1, 9, 30),
            ))
            .unwrap();

        svc.delete_event(created.id.series_id).unwrap();
        assert!(window(&svc, utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0)).is_empty());
    }

    #[test]
    fn range_query_sorts_across_series() {
        let svc = service();
        svc.create_event(content(
            RepeatFrequency::None,
            utc(2024, 1, 2, 12, 0),
            utc(2024, 1, 2, 13, 0),
        ))
        .unwrap();
        svc.create_event(content(
            RepeatFrequency::Daily,
            utc(2024, 1, 1, 9, 0),
            utc(2024, 1, 1, 9, 30),
        ))
        .unwrap();

        let starts: Vec<_> = window(&svc, utc(2024, 1, 1, 0, 0), utc(2024, 1, 3, 0, 0))
            .iter()
            .map(|o| o.start)
            .collect();
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 1, 9, 0),
                utc(2024, 1, 2, 9, 0),
                utc(2024, 1, 2, 12, 0),
            ]
        );
    }
}
