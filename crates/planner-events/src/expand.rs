//! Occurrence expansion: series + window → the visible, concrete occurrences.
//!
//! Pure computation — no storage access. Exceptions are skipped, every
//! produced occurrence carries the composite id, and the window keep-rule is
//! "overlaps `[from, to]`": an occurrence is discarded only when it ends
//! before the window or starts after it.

use chrono::{DateTime, Duration, Utc};

use crate::error::EventError;
use crate::rule::RecurrenceRule;
use crate::types::{EventSeries, Occurrence, OccurrenceId};

/// Expand `series` over `[from, to]`, excluding exceptions.
///
/// The upper bound for occurrence *starts* is exclusive: an occurrence
/// starting exactly at `to` belongs to the next window. Results are ordered
/// ascending by start (the rule iterator is monotonic).
pub fn expand_series(
    series: &EventSeries,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Occurrence>, EventError> {
    let duration = series.duration();

    if !series.content.repeat.is_repeating() {
        let start = series.content.from;
        let end = series.content.to;
        if end < from || start > to || series.exceptions.contains(&start) {
            return Ok(Vec::new());
        }
        return Ok(vec![at(series, start, end)]);
    }

    let rule = RecurrenceRule::decode(&series.rule_text)?;

    // Occurrences starting before `from - duration` cannot reach the window,
    // so iteration may begin there; the -1s makes the upper bound exclusive
    // while the underlying primitive stays inclusive.
    let scan_from = from - duration;
    let scan_to = to - Duration::seconds(1);

    let mut res = Vec::new();
    for start in rule.occurrences(scan_from, scan_to, true) {
        let end = start + duration;
        if end < from || start > to {
            continue;
        }
        if series.exceptions.contains(&start) {
            continue;
        }
        res.push(at(series, start, end));
    }

    Ok(res)
}

/// The single occurrence of `series` starting exactly at `ts`.
///
/// Fails with [`EventError::NotFound`] when `ts` is not an occurrence the
/// rule produces, or when it has been excepted.
pub fn occurrence_at(series: &EventSeries, ts: DateTime<Utc>) -> Result<Occurrence, EventError> {
    if series.exceptions.contains(&ts) {
        return Err(EventError::NotFound);
    }

    if !series.content.repeat.is_repeating() {
        if series.content.from != ts {
            return Err(EventError::NotFound);
        }
        return Ok(at(series, series.content.from, series.content.to));
    }

    let rule = RecurrenceRule::decode(&series.rule_text)?;
    if rule.next_on_or_after(ts) != Some(ts) {
        return Err(EventError::NotFound);
    }

    Ok(at(series, ts, ts + series.duration()))
}

fn at(series: &EventSeries, start: DateTime<Utc>, end: DateTime<Utc>) -> Occurrence {
    Occurrence {
        id: OccurrenceId::new(series.id, start),
        group_id: series.content.group_id,
        kind: series.content.kind,
        title: series.content.title.clone(),
        description: series.content.description.clone(),
        all_day: series.content.all_day,
        start,
        end,
        repeat: series.content.repeat,
        lead_times: series.content.lead_times.clone(),
        attachments: series.content.attachments.clone(),
    }
}
