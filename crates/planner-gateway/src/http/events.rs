//! Event endpoints.
//!
//! Single instances are addressed with the composite id
//! `"{series_id}_{unix_start}"`. Update and delete accept `?instance=true`
//! to target one occurrence; without it the whole series is affected. For a
//! non-repeating series the two are the same operation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use planner_core::LeadTime;
use planner_events::{
    Attachment, EventContent, EventKind, EventsFilter, Occurrence, OccurrenceId, RepeatFrequency,
};

use crate::app::AppState;
use crate::http::error::{bad_request, from_event_error, ApiError};

#[derive(Deserialize)]
pub struct EventRequest {
    pub group_id: i64,
    pub event_type: EventKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub all_day: bool,
    pub from: DateTime<Utc>,
    /// Required for events; reminders default to a point in time.
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repeat_type: RepeatFrequency,
    #[serde(default)]
    pub notifications: Vec<LeadTime>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl EventRequest {
    fn into_content(self) -> Result<EventContent, ApiError> {
        if self.title.is_empty() {
            return Err(bad_request("title must be provided"));
        }
        let to = match (self.event_type, self.to) {
            (_, Some(to)) => to,
            (EventKind::Reminder, None) => self.from,
            (EventKind::Event, None) => return Err(bad_request("to must be provided")),
        };
        if to < self.from {
            return Err(bad_request("to must not precede from"));
        }
        Ok(EventContent {
            group_id: self.group_id,
            kind: self.event_type,
            title: self.title,
            description: self.description,
            all_day: self.all_day,
            from: self.from,
            to,
            repeat: self.repeat_type,
            lead_times: self.notifications,
            attachments: self.attachments,
        })
    }
}

#[derive(Serialize)]
pub struct EventResponse {
    pub id: String,
    pub group_id: i64,
    pub event_type: EventKind,
    pub title: String,
    pub description: String,
    pub all_day: bool,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub repeat_type: RepeatFrequency,
    pub notifications: Vec<LeadTime>,
    pub attachments: Vec<Attachment>,
}

impl From<Occurrence> for EventResponse {
    fn from(o: Occurrence) -> Self {
        Self {
            id: o.id.to_string(),
            group_id: o.group_id,
            event_type: o.kind,
            title: o.title,
            description: o.description,
            all_day: o.all_day,
            from: o.start,
            to: o.end,
            repeat_type: o.repeat,
            notifications: o.lead_times,
            attachments: o.attachments,
        }
    }
}

/// POST /events — create a series, respond with its first occurrence.
pub async fn create_event_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), ApiError> {
    let content = req.into_content()?;
    let occurrence = state
        .events
        .create_event(content)
        .map_err(from_event_error)?;
    Ok((StatusCode::CREATED, Json(occurrence.into())))
}

#[derive(Deserialize)]
pub struct EventsQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Comma-separated group ids; absent means all groups.
    pub group_ids: Option<String>,
}

/// GET /events?from=&to=&group_ids= — expanded occurrences in the window.
pub async fn get_events_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let group_ids = match &query.group_ids {
        None => Vec::new(),
        Some(raw) => raw
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| bad_request(format!("invalid group id {:?}", s)))
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    let occurrences = state
        .events
        .get_events(&EventsFilter {
            from: query.from,
            to: query.to,
            group_ids,
        })
        .map_err(from_event_error)?;

    Ok(Json(occurrences.into_iter().map(Into::into).collect()))
}

/// GET /events/{id} — one occurrence by composite id.
pub async fn get_event_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, ApiError> {
    let (series_id, ts) = split_id(&id)?;
    let occurrence = state
        .events
        .get_event(series_id, ts)
        .map_err(from_event_error)?;
    Ok(Json(occurrence.into()))
}

#[derive(Deserialize)]
pub struct InstanceQuery {
    /// When true, only the addressed occurrence is affected.
    #[serde(default)]
    pub instance: bool,
}

/// PUT /events/{id}?instance= — update the series or one occurrence.
pub async fn update_event_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<InstanceQuery>,
    Json(req): Json<EventRequest>,
) -> Result<StatusCode, ApiError> {
    let (series_id, ts) = split_id(&id)?;
    // The addressed occurrence must exist before we mutate anything —
    // exceptions must only ever name real occurrence starts.
    state
        .events
        .get_event(series_id, ts)
        .map_err(from_event_error)?;

    let content = req.into_content()?;
    let result = if query.instance {
        state.events.update_event_instance(series_id, ts, content)
    } else {
        state.events.update_event(series_id, ts, content)
    };
    result.map_err(from_event_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /events/{id}?instance= — delete the series or hide one occurrence.
pub async fn delete_event_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<StatusCode, ApiError> {
    let (series_id, ts) = split_id(&id)?;
    state
        .events
        .get_event(series_id, ts)
        .map_err(from_event_error)?;

    let result = if query.instance {
        state.events.delete_event_instance(series_id, ts)
    } else {
        state.events.delete_event(series_id)
    };
    result.map_err(from_event_error)?;
    Ok(StatusCode::NO_CONTENT)
}

fn split_id(raw: &str) -> Result<(i64, DateTime<Utc>), ApiError> {
    let id: OccurrenceId = raw.parse().map_err(from_event_error)?;
    let ts = id
        .start()
        .ok_or_else(|| bad_request(format!("timestamp out of range in id {:?}", raw)))?;
    Ok((id.series_id, ts))
}
