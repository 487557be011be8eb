//! # Persistent Store
//!
//! SQLite-backed storage for notes, tasks, reminders and per-user settings.
//! Every call opens its own connection, so the store is safe to use from any
//! task without pooling or shared transactions. All mutations filter on
//! (user_id, entity_id) jointly; a mismatched user_id is a silent no-op.
//!
//! - **Version**: 1.2.1
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.1: Digest send time normalized to zero-padded HH:MM on write
//! - 1.2.0: Digest recipient query for the daily digest scheduler
//! - 1.1.0: Due-reminder query and reschedule for the dispatch scheduler
//! - 1.0.0: Initial release with notes/tasks/reminders/settings CRUD

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, NaiveTime};
use log::debug;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Wire format for timestamps stored as TEXT (matches sqlite CURRENT_TIMESTAMP)
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    /// Free-form deadline text; not interpreted by the store
    pub deadline: Option<String>,
    pub is_completed: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub remind_at: NaiveDateTime,
    pub is_recurring: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub user_id: i64,
    pub default_location: String,
    /// HH:MM wall-clock send time for the daily digest
    pub daily_digest_time: Option<String>,
    pub daily_digest_enabled: bool,
}

/// Typed settings column selector. Keeps column names out of caller code and
/// out of interpolated SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    DefaultLocation,
    DailyDigestTime,
    DailyDigestEnabled,
}

impl SettingKey {
    fn column(self) -> &'static str {
        match self {
            SettingKey::DefaultLocation => "default_location",
            SettingKey::DailyDigestTime => "daily_digest_time",
            SettingKey::DailyDigestEnabled => "daily_digest_enabled",
        }
    }
}

/// Handle to the SQLite database. Cheap to clone; each method opens a fresh
/// connection scoped to that single call.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Open (creating if necessary) the database at `path` and ensure the
    /// schema exists. This is the only call whose failure is fatal.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let db = Database { path: path.into() };
        db.init_tables()?;
        Ok(db)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.path)
            .with_context(|| format!("failed to open database at {}", self.path.display()))
    }

    fn init_tables(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                deadline TEXT,
                is_completed INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS reminders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                remind_at TEXT NOT NULL,
                is_recurring INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS settings (
                user_id INTEGER PRIMARY KEY,
                default_location TEXT NOT NULL DEFAULT 'London',
                daily_digest_time TEXT,
                daily_digest_enabled INTEGER NOT NULL DEFAULT 0
            );",
        )
        .context("failed to initialize database schema")?;
        Ok(())
    }

    // --- Notes ---

    pub fn add_note(&self, user_id: i64, text: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO notes (user_id, text) VALUES (?1, ?2)",
            params![user_id, text],
        )?;
        let id = conn.last_insert_rowid();
        debug!("added note {id} for user {user_id}");
        Ok(id)
    }

    pub fn list_notes(&self, user_id: i64) -> Result<Vec<Note>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, text, created_at FROM notes
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let notes = stmt
            .query_map(params![user_id], note_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    /// Returns false when no note matched (wrong id or wrong owner).
    pub fn update_note(&self, user_id: i64, note_id: i64, text: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE notes SET text = ?1 WHERE id = ?2 AND user_id = ?3",
            params![text, note_id, user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_note(&self, user_id: i64, note_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM notes WHERE id = ?1 AND user_id = ?2",
            params![note_id, user_id],
        )?;
        Ok(changed > 0)
    }

    // --- Tasks ---

    pub fn add_task(&self, user_id: i64, text: &str, deadline: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tasks (user_id, text, deadline) VALUES (?1, ?2, ?3)",
            params![user_id, text, deadline],
        )?;
        let id = conn.last_insert_rowid();
        debug!("added task {id} for user {user_id}");
        Ok(id)
    }

    pub fn list_tasks(&self, user_id: i64) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, text, deadline, is_completed, created_at FROM tasks
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let tasks = stmt
            .query_map(params![user_id], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Partial update: only the provided fields are written.
    pub fn update_task(
        &self,
        user_id: i64,
        task_id: i64,
        new_text: Option<&str>,
        new_deadline: Option<&str>,
        is_completed: Option<bool>,
    ) -> Result<bool> {
        let mut assignments = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(text) = new_text {
            assignments.push(format!("text = ?{}", values.len() + 1));
            values.push(Box::new(text.to_string()));
        }
        if let Some(deadline) = new_deadline {
            assignments.push(format!("deadline = ?{}", values.len() + 1));
            values.push(Box::new(deadline.to_string()));
        }
        if let Some(done) = is_completed {
            assignments.push(format!("is_completed = ?{}", values.len() + 1));
            values.push(Box::new(done));
        }
        if assignments.is_empty() {
            return Ok(false);
        }

        let sql = format!(
            "UPDATE tasks SET {} WHERE id = ?{} AND user_id = ?{}",
            assignments.join(", "),
            values.len() + 1,
            values.len() + 2,
        );
        values.push(Box::new(task_id));
        values.push(Box::new(user_id));

        let conn = self.conn()?;
        let changed = conn.execute(
            &sql,
            rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
        )?;
        Ok(changed > 0)
    }

    /// Flip completion state in place; no-op for a foreign user_id.
    pub fn toggle_task_status(&self, user_id: i64, task_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE tasks SET is_completed = 1 - is_completed
             WHERE id = ?1 AND user_id = ?2",
            params![task_id, user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_task(&self, user_id: i64, task_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
            params![task_id, user_id],
        )?;
        Ok(changed > 0)
    }

    // --- Reminders ---

    pub fn add_reminder(
        &self,
        user_id: i64,
        text: &str,
        remind_at: NaiveDateTime,
        is_recurring: bool,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO reminders (user_id, text, remind_at, is_recurring)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, text, encode_ts(remind_at), is_recurring],
        )?;
        let id = conn.last_insert_rowid();
        debug!("added reminder {id} for user {user_id} at {remind_at}");
        Ok(id)
    }

    pub fn list_reminders(&self, user_id: i64) -> Result<Vec<Reminder>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, text, remind_at, is_recurring, created_at FROM reminders
             WHERE user_id = ?1 ORDER BY remind_at ASC",
        )?;
        let reminders = stmt
            .query_map(params![user_id], reminder_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reminders)
    }

    /// Flip between one-off and recurring; no-op for a foreign user_id.
    pub fn toggle_reminder_type(&self, user_id: i64, reminder_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE reminders SET is_recurring = 1 - is_recurring
             WHERE id = ?1 AND user_id = ?2",
            params![reminder_id, user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_reminder(&self, user_id: i64, reminder_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM reminders WHERE id = ?1 AND user_id = ?2",
            params![reminder_id, user_id],
        )?;
        Ok(changed > 0)
    }

    /// All reminders across all users with remind_at <= now, oldest first.
    /// The dispatch scheduler applies its trailing window on top of this.
    pub fn due_reminders(&self, now: NaiveDateTime) -> Result<Vec<Reminder>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, text, remind_at, is_recurring, created_at FROM reminders
             WHERE remind_at <= ?1 ORDER BY remind_at ASC",
        )?;
        let reminders = stmt
            .query_map(params![encode_ts(now)], reminder_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reminders)
    }

    /// Move a recurring reminder to its next occurrence.
    pub fn reschedule_reminder(
        &self,
        user_id: i64,
        reminder_id: i64,
        remind_at: NaiveDateTime,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE reminders SET remind_at = ?1 WHERE id = ?2 AND user_id = ?3",
            params![encode_ts(remind_at), reminder_id, user_id],
        )?;
        Ok(changed > 0)
    }

    // --- Settings ---

    /// Settings for a user; falls back to defaults when no row exists.
    pub fn get_settings(&self, user_id: i64) -> Result<Settings> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, default_location, daily_digest_time, daily_digest_enabled
             FROM settings WHERE user_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![user_id], settings_from_row)?;
        match rows.next() {
            Some(row) => Ok(row?),
            None => Ok(Settings {
                user_id,
                default_location: "London".to_string(),
                daily_digest_time: None,
                daily_digest_enabled: false,
            }),
        }
    }

    /// Upsert a single settings column for a user. The digest send time is
    /// normalized to zero-padded HH:MM, since the digest scheduler matches
    /// it against the wall clock by exact string equality.
    pub fn set_setting(&self, user_id: i64, key: SettingKey, value: &str) -> Result<()> {
        let normalized;
        let value = if key == SettingKey::DailyDigestTime {
            let time = NaiveTime::parse_from_str(value, "%H:%M")
                .with_context(|| format!("digest time must be HH:MM, got '{value}'"))?;
            normalized = time.format("%H:%M").to_string();
            &normalized
        } else {
            value
        };
        let col = key.column();
        let sql = format!(
            "INSERT INTO settings (user_id, {col}) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET {col} = excluded.{col}"
        );
        let conn = self.conn()?;
        conn.execute(&sql, params![user_id, value])?;
        Ok(())
    }

    /// (user_id, HH:MM) pairs for every user with the digest enabled.
    pub fn digest_recipients(&self) -> Result<Vec<(i64, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, daily_digest_time FROM settings
             WHERE daily_digest_enabled = 1 AND daily_digest_time IS NOT NULL",
        )?;
        let recipients = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(recipients)
    }
}

fn encode_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn ts_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        user_id: row.get(1)?,
        text: row.get(2)?,
        created_at: ts_from_row(row, 3)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        text: row.get(2)?,
        deadline: row.get(3)?,
        is_completed: row.get(4)?,
        created_at: ts_from_row(row, 5)?,
    })
}

fn reminder_from_row(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: row.get(0)?,
        user_id: row.get(1)?,
        text: row.get(2)?,
        remind_at: ts_from_row(row, 3)?,
        is_recurring: row.get(4)?,
        created_at: ts_from_row(row, 5)?,
    })
}

fn settings_from_row(row: &Row<'_>) -> rusqlite::Result<Settings> {
    Ok(Settings {
        user_id: row.get(0)?,
        default_location: row.get(1)?,
        daily_digest_time: row.get(2)?,
        daily_digest_enabled: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local};
    use tempfile::tempdir;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("test.db")).expect("open db");
        (dir, db)
    }

    fn now() -> NaiveDateTime {
        // Truncate to whole seconds to match the storage format
        let now = Local::now().naive_local();
        NaiveDateTime::parse_from_str(&encode_ts(now), TS_FORMAT).unwrap()
    }

    #[test]
    fn test_note_round_trip() {
        let (_dir, db) = test_db();
        let id = db.add_note(1, "buy milk").unwrap();
        let notes = db.list_notes(1).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, id);
        assert_eq!(notes[0].text, "buy milk");

        let second = db.add_note(1, "call mom").unwrap();
        assert_ne!(id, second);

        assert!(db.delete_note(1, id).unwrap());
        assert_eq!(db.list_notes(1).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_is_noop_for_foreign_user() {
        let (_dir, db) = test_db();
        let id = db.add_note(1, "mine").unwrap();
        assert!(!db.delete_note(2, id).unwrap());
        assert_eq!(db.list_notes(1).unwrap().len(), 1);
    }

    #[test]
    fn test_update_ownership_isolation() {
        let (_dir, db) = test_db();
        let id = db.add_note(2, "user two's note").unwrap();
        assert!(!db.update_note(1, id, "hijacked").unwrap());
        let notes = db.list_notes(2).unwrap();
        assert_eq!(notes[0].text, "user two's note");

        let task_id = db.add_task(2, "user two's task", Some("friday")).unwrap();
        assert!(!db
            .update_task(1, task_id, Some("hijacked"), None, Some(true))
            .unwrap());
        let tasks = db.list_tasks(2).unwrap();
        assert_eq!(tasks[0].text, "user two's task");
        assert_eq!(tasks[0].deadline.as_deref(), Some("friday"));
        assert!(!tasks[0].is_completed);
    }

    #[test]
    fn test_task_partial_update_and_toggle() {
        let (_dir, db) = test_db();
        let id = db.add_task(1, "write report", None).unwrap();

        assert!(db.update_task(1, id, None, Some("monday"), None).unwrap());
        let task = &db.list_tasks(1).unwrap()[0];
        assert_eq!(task.text, "write report");
        assert_eq!(task.deadline.as_deref(), Some("monday"));

        assert!(db.toggle_task_status(1, id).unwrap());
        assert!(db.list_tasks(1).unwrap()[0].is_completed);
        assert!(db.toggle_task_status(1, id).unwrap());
        assert!(!db.list_tasks(1).unwrap()[0].is_completed);

        // Nothing requested, nothing written
        assert!(!db.update_task(1, id, None, None, None).unwrap());
    }

    #[test]
    fn test_reminder_round_trip_and_toggle() {
        let (_dir, db) = test_db();
        let at = now() + Duration::hours(2);
        let id = db.add_reminder(1, "stand up", at, false).unwrap();

        let reminders = db.list_reminders(1).unwrap();
        assert_eq!(reminders[0].remind_at, at);
        assert!(!reminders[0].is_recurring);

        assert!(db.toggle_reminder_type(1, id).unwrap());
        assert!(db.list_reminders(1).unwrap()[0].is_recurring);

        assert!(!db.toggle_reminder_type(9, id).unwrap());
        assert!(db.delete_reminder(1, id).unwrap());
        assert!(db.list_reminders(1).unwrap().is_empty());
    }

    #[test]
    fn test_due_reminders_filters_on_time_only() {
        let (_dir, db) = test_db();
        let now = now();
        db.add_reminder(1, "past", now - Duration::minutes(5), false)
            .unwrap();
        db.add_reminder(2, "other user, also past", now - Duration::minutes(1), true)
            .unwrap();
        db.add_reminder(1, "future", now + Duration::minutes(5), false)
            .unwrap();

        let due = db.due_reminders(now).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].text, "past");
        assert_eq!(due[1].text, "other user, also past");
    }

    #[test]
    fn test_reschedule_reminder() {
        let (_dir, db) = test_db();
        let at = now();
        let id = db.add_reminder(1, "daily", at, true).unwrap();
        let next = at + Duration::days(1);
        assert!(db.reschedule_reminder(1, id, next).unwrap());
        assert_eq!(db.list_reminders(1).unwrap()[0].remind_at, next);
    }

    #[test]
    fn test_settings_defaults_and_upsert() {
        let (_dir, db) = test_db();
        let settings = db.get_settings(7).unwrap();
        assert_eq!(settings.default_location, "London");
        assert!(!settings.daily_digest_enabled);
        assert!(settings.daily_digest_time.is_none());

        db.set_setting(7, SettingKey::DailyDigestTime, "08:30").unwrap();
        db.set_setting(7, SettingKey::DailyDigestEnabled, "1").unwrap();
        let settings = db.get_settings(7).unwrap();
        assert_eq!(settings.daily_digest_time.as_deref(), Some("08:30"));
        assert!(settings.daily_digest_enabled);

        assert_eq!(db.digest_recipients().unwrap(), vec![(7, "08:30".to_string())]);

        db.set_setting(7, SettingKey::DailyDigestEnabled, "0").unwrap();
        assert!(db.digest_recipients().unwrap().is_empty());
    }

    #[test]
    fn test_digest_time_is_normalized_to_padded_hh_mm() {
        let (_dir, db) = test_db();
        // "9:00" would never equal the wall clock's "09:00"
        db.set_setting(3, SettingKey::DailyDigestTime, "9:00").unwrap();
        assert_eq!(db.get_settings(3).unwrap().daily_digest_time.as_deref(), Some("09:00"));

        assert!(db.set_setting(3, SettingKey::DailyDigestTime, "25:00").is_err());
        assert!(db.set_setting(3, SettingKey::DailyDigestTime, "soonish").is_err());
        // rejected writes leave the stored value alone
        assert_eq!(db.get_settings(3).unwrap().daily_digest_time.as_deref(), Some("09:00"));
    }
}
