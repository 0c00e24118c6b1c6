use rusqlite::Connection;

use crate::error::Result;

/// Initialise the events schema in `conn`.
///
/// Creates the `events` table (idempotent) and the window index so the range
/// query stays efficient — both the HTTP range reads and the notifier's
/// minute polling hit `start_date <= ? AND (end_date IS NULL OR end_date > ?)`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS events (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id      INTEGER NOT NULL,
            kind          INTEGER NOT NULL DEFAULT 0,
            title         TEXT    NOT NULL,
            description   TEXT    NOT NULL DEFAULT '',
            all_day       INTEGER NOT NULL DEFAULT 0,
            repeat        INTEGER NOT NULL DEFAULT 0,
            start_date    INTEGER NOT NULL,    -- anchor start, unix seconds UTC
            end_date      INTEGER,             -- series bound, NULL = open-ended
            duration_secs INTEGER NOT NULL,
            rule          TEXT    NOT NULL DEFAULT '',   -- canonical recurrence text
            exceptions    TEXT    NOT NULL DEFAULT '[]', -- JSON array of unix seconds
            lead_times    TEXT    NOT NULL DEFAULT '[]', -- JSON array of seconds
            attachments   TEXT    NOT NULL DEFAULT '[]', -- JSON [{name, path}]
            created_at    TEXT    NOT NULL,
            updated_at    TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_events_window ON events (start_date, end_date);
        CREATE INDEX IF NOT EXISTS idx_events_group ON events (group_id);
        ",
    )?;
    Ok(())
}
