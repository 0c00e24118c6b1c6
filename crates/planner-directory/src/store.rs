//! SQLite-backed directory service.

use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::info;

use crate::error::{DirectoryError, Result};
use crate::types::{Group, GroupSettings, NewGroup, NewUser, SettingsFilter, User};

const USER_COLUMNS: &str = "id, full_name, email, phone_number, photo, push_token, notify";

/// Users, groups, and membership settings over one SQLite connection.
///
/// Thread-safe: the connection is wrapped in a `Mutex`.
pub struct Directory {
    db: Mutex<Connection>,
}

impl Directory {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    // --- users -------------------------------------------------------------

    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (full_name, email, phone_number, photo, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![user.full_name, user.email, user.phone_number, user.photo, now],
        )?;
        let id = conn.last_insert_rowid();
        info!(user_id = id, "user created");
        Ok(User {
            id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            photo: user.photo.clone(),
            push_token: String::new(),
            notify: true,
        })
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        let conn = self.db.lock().unwrap();
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))?;
        stmt.query_row(params![id], row_to_user)
            .optional()?
            .ok_or(DirectoryError::UserNotFound { id })
    }

    /// Batch fetch; ids missing from the table are silently absent from the
    /// result, order follows ids ascending.
    pub fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.db.lock().unwrap();
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE id IN ({}) ORDER BY id",
            USER_COLUMNS, placeholders
        ))?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), row_to_user)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update_push_token(&self, id: i64, token: &str) -> Result<()> {
        let conn = self.db.lock().unwrap();
        let n = conn.execute(
            "UPDATE users SET push_token = ?1, updated_at = ?2 WHERE id = ?3",
            params![token, Utc::now().to_rfc3339(), id],
        )?;
        if n == 0 {
            return Err(DirectoryError::UserNotFound { id });
        }
        Ok(())
    }

    pub fn set_notify(&self, id: i64, notify: bool) -> Result<()> {
        let conn = self.db.lock().unwrap();
        let n = conn.execute(
            "UPDATE users SET notify = ?1, updated_at = ?2 WHERE id = ?3",
            params![notify as i64, Utc::now().to_rfc3339(), id],
        )?;
        if n == 0 {
            return Err(DirectoryError::UserNotFound { id });
        }
        Ok(())
    }

    // --- groups ------------------------------------------------------------

    /// Create a group and its initial memberships (creator included) inside
    /// one transaction — partial application rolls back wholesale.
    pub fn create_group(&self, group: &NewGroup) -> Result<Group> {
        let mut conn = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO groups (name, creator_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![group.name, group.creator_id, now],
        )?;
        let id = tx.last_insert_rowid();

        let mut member_ids = vec![group.creator_id];
        member_ids.extend(
            group
                .user_ids
                .iter()
                .copied()
                .filter(|&uid| uid != group.creator_id),
        );
        for user_id in &member_ids {
            tx.execute(
                "INSERT INTO group_members (user_id, group_id, color, notify)
                 VALUES (?1, ?2, ?3, 1)",
                params![user_id, id, group.color],
            )?;
        }
        tx.commit()?;

        info!(group_id = id, members = member_ids.len(), "group created");
        Ok(Group {
            id,
            name: group.name.clone(),
            creator_id: group.creator_id,
            user_ids: member_ids,
        })
    }

    pub fn get_group(&self, id: i64) -> Result<Group> {
        let conn = self.db.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, name, creator_id FROM groups WHERE id = ?1",
                params![id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?)),
            )
            .optional()?
            .ok_or(DirectoryError::GroupNotFound { id })?;

        Ok(Group {
            id: row.0,
            name: row.1,
            creator_id: row.2,
            user_ids: member_ids(&conn, row.0)?,
        })
    }

    /// Batch fetch with member id lists attached. Missing ids are absent
    /// from the result.
    pub fn get_groups(&self, ids: &[i64]) -> Result<Vec<Group>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.db.lock().unwrap();
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, creator_id FROM groups WHERE id IN ({}) ORDER BY id",
            placeholders
        ))?;
        let rows: Vec<(i64, String, i64)> = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut res = Vec::with_capacity(rows.len());
        for (id, name, creator_id) in rows {
            res.push(Group {
                id,
                name,
                creator_id,
                user_ids: member_ids(&conn, id)?,
            });
        }
        Ok(res)
    }

    /// Groups the user belongs to, in membership order.
    pub fn get_user_groups(&self, user_id: i64) -> Result<Vec<Group>> {
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT g.id, g.name, g.creator_id
             FROM groups g JOIN group_members m ON g.id = m.group_id
             WHERE m.user_id = ?1 ORDER BY m.id",
        )?;
        let rows: Vec<(i64, String, i64)> = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut res = Vec::with_capacity(rows.len());
        for (id, name, creator_id) in rows {
            res.push(Group {
                id,
                name,
                creator_id,
                user_ids: member_ids(&conn, id)?,
            });
        }
        Ok(res)
    }

    pub fn update_group_name(&self, group_id: i64, name: &str) -> Result<()> {
        let conn = self.db.lock().unwrap();
        let n = conn.execute(
            "UPDATE groups SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, Utc::now().to_rfc3339(), group_id],
        )?;
        if n == 0 {
            return Err(DirectoryError::GroupNotFound { id: group_id });
        }
        Ok(())
    }

    // --- membership settings ------------------------------------------------

    /// Batch settings lookup; empty filter lists mean no constraint.
    pub fn get_settings(&self, filter: &SettingsFilter) -> Result<Vec<GroupSettings>> {
        let conn = self.db.lock().unwrap();
        let mut sql =
            String::from("SELECT user_id, group_id, color, notify FROM group_members WHERE 1=1");
        let mut args: Vec<i64> = Vec::new();
        if !filter.user_ids.is_empty() {
            sql.push_str(&format!(
                " AND user_id IN ({})",
                vec!["?"; filter.user_ids.len()].join(",")
            ));
            args.extend_from_slice(&filter.user_ids);
        }
        if !filter.group_ids.is_empty() {
            sql.push_str(&format!(
                " AND group_id IN ({})",
                vec!["?"; filter.group_ids.len()].join(",")
            ));
            args.extend_from_slice(&filter.group_ids);
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok(GroupSettings {
                user_id: row.get(0)?,
                group_id: row.get(1)?,
                color: row.get(2)?,
                notify: row.get::<_, i64>(3)? != 0,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update_settings(&self, settings: &GroupSettings) -> Result<()> {
        let conn = self.db.lock().unwrap();
        let n = conn.execute(
            "UPDATE group_members SET color = ?1, notify = ?2
             WHERE group_id = ?3 AND user_id = ?4",
            params![
                settings.color,
                settings.notify as i64,
                settings.group_id,
                settings.user_id
            ],
        )?;
        if n == 0 {
            return Err(DirectoryError::GroupNotFound {
                id: settings.group_id,
            });
        }
        Ok(())
    }

    pub fn add_member(&self, settings: &GroupSettings) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO group_members (user_id, group_id, color, notify)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                settings.user_id,
                settings.group_id,
                settings.color,
                settings.notify as i64
            ],
        )?;
        Ok(())
    }

    pub fn remove_member(&self, group_id: i64, user_id: i64) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id, user_id],
        )?;
        Ok(())
    }
}

fn member_ids(conn: &Connection, group_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare_cached("SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map(params![group_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        phone_number: row.get(3)?,
        photo: row.get(4)?,
        push_token: row.get(5)?,
        notify: row.get::<_, i64>(6)? != 0,
    })
}
