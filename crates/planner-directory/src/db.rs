use rusqlite::{Connection, Result};

/// Initialise all tables for the directory subsystem. Safe to call on every
/// startup — CREATE IF NOT EXISTS means it's idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_users_table(conn)?;
    create_groups_tables(conn)?;
    Ok(())
}

fn create_users_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name    TEXT NOT NULL,
            email        TEXT NOT NULL UNIQUE,
            phone_number TEXT NOT NULL DEFAULT '',
            photo        TEXT NOT NULL DEFAULT '',
            push_token   TEXT NOT NULL DEFAULT '',
            notify       INTEGER NOT NULL DEFAULT 1,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        ) STRICT;",
    )
}

fn create_groups_tables(conn: &Connection) -> Result<()> {
    // UNIQUE(user_id, group_id) enforces one membership row per pair.
    // idx_members_group speeds up the member-list aggregation used by
    // the notifier's batched group fetch.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS groups (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT NOT NULL,
            creator_id INTEGER NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS group_members (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id  INTEGER NOT NULL REFERENCES users(id),
            group_id INTEGER NOT NULL REFERENCES groups(id),
            color    TEXT NOT NULL DEFAULT '#2196f3',
            notify   INTEGER NOT NULL DEFAULT 1,
            UNIQUE(user_id, group_id)
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_members_group ON group_members (group_id);",
    )
}
