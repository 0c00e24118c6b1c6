use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use planner_core::LeadTime;
use planner_directory::{Directory, Group, SettingsFilter, User};
use planner_events::{EventsFilter, Occurrence};
use planner_push::{PushDispatcher, PushMessage};

use crate::clock::{truncate_to_minute, Clock};
use crate::error::Result;

/// The notification scheduler. One instance per process.
pub struct Notifier {
    events: Arc<planner_events::EventService>,
    directory: Arc<Directory>,
    push: Arc<dyn PushDispatcher>,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(
        events: Arc<planner_events::EventService>,
        directory: Arc<Directory>,
        push: Arc<dyn PushDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            directory,
            push,
            clock,
        }
    }

    /// Main tick loop. Runs until `shutdown` broadcasts `true`.
    ///
    /// Each tick's work is spawned as its own task so a slow tick never
    /// delays the next firing. The `[from, to)` bound is carried across
    /// ticks in memory only — after a restart the loop realigns to the next
    /// minute boundary and windows that passed during downtime are skipped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("notification scheduler started");
        let mut ticks: JoinSet<()> = JoinSet::new();

        // Initial window: the partial minute the process started in.
        let mut from = truncate_to_minute(self.clock.now());
        let mut to = from + Duration::minutes(1);
        let this = Arc::clone(&self);
        ticks.spawn(async move { this.tick(from, to).await });

        loop {
            let wait = (to - self.clock.now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    from = to;
                    to = truncate_to_minute(self.clock.now()) + Duration::minutes(1);
                    let this = Arc::clone(&self);
                    ticks.spawn(async move { this.tick(from, to).await });
                    // Reap finished tick tasks so the set stays small.
                    while ticks.try_join_next().is_some() {}
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("notification scheduler shutting down");
                        break;
                    }
                }
            }
        }

        // Let in-flight ticks finish: partially sent batches cannot be unsent.
        while ticks.join_next().await.is_some() {}
    }

    /// One tick. Failures are logged, never propagated — the loop continues
    /// to the next minute.
    async fn tick(&self, from: DateTime<Utc>, to: DateTime<Utc>) {
        debug!(%from, %to, "notification tick");
        if let Err(e) = self.run_window(from, to).await {
            error!(error = %e, %from, %to, "notification tick failed");
        }
    }

    /// Steps 1–5 for the window `[from, to)`: fetch candidates, select due
    /// pairs, resolve recipients from a per-tick snapshot, dispatch once.
    async fn run_window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<()> {
        // The longest lead is 24 h and the shortest 5 min, so occurrences
        // whose notify instant falls in the window all start inside
        // [from + 5m, to + 24h]. Widen the fetch, then filter precisely.
        let filter = EventsFilter {
            from: from + LeadTime::FiveMinutes.duration(),
            to: to + LeadTime::Day.duration(),
            group_ids: Vec::new(),
        };
        let occurrences = self.events.get_events(&filter)?;

        let due = due_pairs(&occurrences, from, to);
        if due.is_empty() {
            return Ok(());
        }

        let group_ids = distinct(due.iter().map(|d| d.occurrence.group_id));
        let groups: HashMap<i64, Group> = self
            .directory
            .get_groups(&group_ids)?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();

        let user_ids = distinct(groups.values().flat_map(|g| g.user_ids.iter().copied()));
        let users: HashMap<i64, User> = self
            .directory
            .get_users_by_ids(&user_ids)?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let settings: HashMap<(i64, i64), bool> = self
            .directory
            .get_settings(&SettingsFilter {
                user_ids,
                group_ids,
            })?
            .into_iter()
            .map(|s| ((s.user_id, s.group_id), s.notify))
            .collect();

        let messages = build_messages(&due, &groups, &users, &settings);
        if messages.is_empty() {
            return Ok(());
        }

        info!(pairs = due.len(), messages = messages.len(), "dispatching notifications");
        self.push.send_batch(&messages).await?;
        Ok(())
    }
}

/// One (occurrence, lead-time) pair whose notify instant is due.
struct DuePair<'a> {
    occurrence: &'a Occurrence,
    lead: LeadTime,
}

/// Keep exactly the pairs with `from <= start - lead < to`.
///
/// The half-open bound is what prevents duplicate delivery across ticks:
/// every notify instant belongs to exactly one minute-aligned window.
fn due_pairs<'a>(
    occurrences: &'a [Occurrence],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<DuePair<'a>> {
    let mut res = Vec::new();
    for occurrence in occurrences {
        for &lead in &occurrence.lead_times {
            let notify_at = occurrence.start - lead.duration();
            if notify_at >= from && notify_at < to {
                res.push(DuePair { occurrence, lead });
            }
        }
    }
    res
}

/// Resolve every due pair against its group's membership.
///
/// Skip rules per member: global notify off, no push token, group-specific
/// notify off. A vanished group/user or a missing settings row is logged and
/// skipped — never a batch abort.
fn build_messages(
    due: &[DuePair<'_>],
    groups: &HashMap<i64, Group>,
    users: &HashMap<i64, User>,
    settings: &HashMap<(i64, i64), bool>,
) -> Vec<PushMessage> {
    let mut messages = Vec::new();
    for pair in due {
        let occurrence = pair.occurrence;
        let Some(group) = groups.get(&occurrence.group_id) else {
            warn!(group_id = occurrence.group_id, "group vanished between fetch and resolve");
            continue;
        };

        for &user_id in &group.user_ids {
            let Some(user) = users.get(&user_id) else {
                warn!(user_id, "member vanished between fetch and resolve");
                continue;
            };
            if !user.notify || user.push_token.is_empty() {
                continue;
            }
            match settings.get(&(user_id, group.id)) {
                Some(true) => {}
                Some(false) => continue,
                None => {
                    warn!(user_id, group_id = group.id, "missing group settings; skipping member");
                    continue;
                }
            }

            let data = HashMap::from([
                (
                    "event_type".to_string(),
                    u8::from(occurrence.kind).to_string(),
                ),
                (
                    "notification_type".to_string(),
                    pair.lead.code().to_string(),
                ),
                ("event_title".to_string(), occurrence.title.clone()),
                ("group_id".to_string(), group.id.to_string()),
            ]);
            messages.push(PushMessage {
                token: user.push_token.clone(),
                data,
            });
        }
    }
    messages
}

fn distinct(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    let mut res = Vec::new();
    for id in ids {
        if seen.insert(id) {
            res.push(id);
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use planner_events::{EventContent, EventKind, EventService, OccurrenceId, RepeatFrequency};
    use std::sync::Mutex;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn occurrence(group_id: i64, start: DateTime<Utc>, leads: Vec<LeadTime>) -> Occurrence {
        Occurrence {
            id: OccurrenceId::new(1, start),
            group_id,
            kind: EventKind::Event,
            title: "dentist".to_string(),
            description: String::new(),
            all_day: false,
            start,
            end: start + Duration::hours(1),
            repeat: RepeatFrequency::None,
            lead_times: leads,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn day_lead_is_due_in_exactly_one_window() {
        let start = utc(2024, 3, 10, 9, 0);
        let occurrences = vec![occurrence(1, start, vec![LeadTime::Day])];

        // The window containing start - 24h selects the pair.
        let from = utc(2024, 3, 9, 9, 0);
        let hit = due_pairs(&occurrences, from, from + Duration::minutes(1));
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].lead, LeadTime::Day);

        // One minute earlier or later selects nothing.
        let earlier = from - Duration::minutes(1);
        assert!(due_pairs(&occurrences, earlier, from).is_empty());
        let later = from + Duration::minutes(1);
        assert!(due_pairs(&occurrences, later, later + Duration::minutes(1)).is_empty());
    }

    #[test]
    fn each_configured_lead_is_considered_independently() {
        let start = utc(2024, 3, 10, 9, 0);
        let occurrences = vec![occurrence(
            1,
            start,
            vec![LeadTime::FiveMinutes, LeadTime::ThirtyMinutes],
        )];

        let from = utc(2024, 3, 10, 8, 30);
        let due = due_pairs(&occurrences, from, from + Duration::minutes(1));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].lead, LeadTime::ThirtyMinutes);
    }

    fn member(id: i64, token: &str, notify: bool) -> User {
        User {
            id,
            full_name: format!("user {}", id),
            email: format!("u{}@example.com", id),
            phone_number: String::new(),
            photo: String::new(),
            push_token: token.to_string(),
            notify,
        }
    }

    #[test]
    fn member_skip_rules_apply() {
        let start = utc(2024, 3, 10, 9, 0);
        let occurrences = vec![occurrence(7, start, vec![LeadTime::FiveMinutes])];
        let due = due_pairs(&occurrences, start - Duration::minutes(5), start);

        let groups = HashMap::from([(
            7,
            Group {
                id: 7,
                name: "family".to_string(),
                creator_id: 1,
                user_ids: vec![1, 2, 3, 4, 5],
            },
        )]);
        let users = HashMap::from([
            (1, member(1, "tok-1", true)),   // receives
            (2, member(2, "", true)),        // no token
            (3, member(3, "tok-3", false)),  // global notify off
            (4, member(4, "tok-4", true)),   // group notify off
            (5, member(5, "tok-5", true)),   // no settings row
        ]);
        let settings = HashMap::from([
            ((1, 7), true),
            ((2, 7), true),
            ((3, 7), true),
            ((4, 7), false),
        ]);

        let messages = build_messages(&due, &groups, &users, &settings);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].token, "tok-1");
        assert_eq!(messages[0].data["event_type"], "0");
        assert_eq!(messages[0].data["notification_type"], "0");
        assert_eq!(messages[0].data["event_title"], "dentist");
        assert_eq!(messages[0].data["group_id"], "7");
    }

    // --- full pipeline -----------------------------------------------------

    struct CaptureDispatcher {
        sent: Mutex<Vec<PushMessage>>,
    }

    #[async_trait]
    impl PushDispatcher for CaptureDispatcher {
        async fn send(&self, message: &PushMessage) -> planner_push::Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn send_batch(&self, messages: &[PushMessage]) -> planner_push::Result<()> {
            self.sent.lock().unwrap().extend_from_slice(messages);
            Ok(())
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn pipeline(now: DateTime<Utc>) -> (Arc<Notifier>, Arc<Directory>, Arc<EventService>, Arc<CaptureDispatcher>) {
        let events_conn = rusqlite::Connection::open_in_memory().unwrap();
        planner_events::db::init_db(&events_conn).unwrap();
        let events = Arc::new(EventService::new(events_conn));

        let dir_conn = rusqlite::Connection::open_in_memory().unwrap();
        planner_directory::db::init_db(&dir_conn).unwrap();
        let directory = Arc::new(Directory::new(dir_conn));

        let push = Arc::new(CaptureDispatcher {
            sent: Mutex::new(Vec::new()),
        });
        let notifier = Arc::new(Notifier::new(
            Arc::clone(&events),
            Arc::clone(&directory),
            Arc::clone(&push) as Arc<dyn PushDispatcher>,
            Arc::new(FixedClock(now)),
        ));
        (notifier, directory, events, push)
    }

    #[tokio::test]
    async fn a_tick_notifies_opted_in_members_once() {
        let from = utc(2024, 3, 10, 8, 55);
        let (notifier, directory, events, push) = pipeline(from);

        let alice = directory
            .create_user(&planner_directory::NewUser {
                full_name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                phone_number: String::new(),
                photo: String::new(),
            })
            .unwrap();
        directory.update_push_token(alice.id, "tok-alice").unwrap();
        let group = directory
            .create_group(&planner_directory::NewGroup {
                name: "family".to_string(),
                creator_id: alice.id,
                user_ids: vec![],
                color: "#2196f3".to_string(),
            })
            .unwrap();

        // Starts at 09:00 with a 5-minute lead: due in [08:55, 08:56).
        events
            .create_event(EventContent {
                group_id: group.id,
                kind: EventKind::Event,
                title: "dentist".to_string(),
                description: String::new(),
                all_day: false,
                from: utc(2024, 3, 10, 9, 0),
                to: utc(2024, 3, 10, 10, 0),
                repeat: RepeatFrequency::None,
                lead_times: vec![LeadTime::FiveMinutes],
                attachments: vec![],
            })
            .unwrap();

        notifier
            .run_window(from, from + Duration::minutes(1))
            .await
            .unwrap();

        let sent = push.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, "tok-alice");
        assert_eq!(sent[0].data["notification_type"], "0");
        assert_eq!(sent[0].data["group_id"], group.id.to_string());

        // The adjacent windows select nothing.
        drop(sent);
        push.sent.lock().unwrap().clear();
        notifier
            .run_window(from + Duration::minutes(1), from + Duration::minutes(2))
            .await
            .unwrap();
        assert!(push.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn globally_muted_members_receive_nothing() {
        let from = utc(2024, 3, 10, 8, 55);
        let (notifier, directory, events, push) = pipeline(from);

        let alice = directory
            .create_user(&planner_directory::NewUser {
                full_name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                phone_number: String::new(),
                photo: String::new(),
            })
            .unwrap();
        directory.update_push_token(alice.id, "tok-alice").unwrap();
        directory.set_notify(alice.id, false).unwrap();
        let group = directory
            .create_group(&planner_directory::NewGroup {
                name: "family".to_string(),
                creator_id: alice.id,
                user_ids: vec![],
                color: "#2196f3".to_string(),
            })
            .unwrap();

        events
            .create_event(EventContent {
                group_id: group.id,
                kind: EventKind::Reminder,
                title: "pills".to_string(),
                description: String::new(),
                all_day: false,
                from: utc(2024, 3, 10, 9, 0),
                to: utc(2024, 3, 10, 9, 0),
                repeat: RepeatFrequency::None,
                lead_times: vec![LeadTime::FiveMinutes],
                attachments: vec![],
            })
            .unwrap();

        notifier
            .run_window(from, from + Duration::minutes(1))
            .await
            .unwrap();
        assert!(push.sent.lock().unwrap().is_empty());
    }
}
