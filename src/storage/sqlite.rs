//! SQLite key-value store: one row per user holding the course JSON.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{next_revision, CourseStore, Result, StoreError, UserKey};
use crate::models::Course;

pub struct SqliteStore {
    /// `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             CREATE TABLE IF NOT EXISTS courses (
                 user TEXT PRIMARY KEY,
                 revision INTEGER NOT NULL,
                 body TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );",
        )?;
        debug!(path = ?self.db_path, "Opened SQLite course store");
        Ok(())
    }
}

fn to_sql_revision(revision: u64) -> i64 {
    i64::try_from(revision).unwrap_or(i64::MAX)
}

impl CourseStore for SqliteStore {
    fn load(&self, user: &UserKey) -> Result<Option<Course>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM courses WHERE user = ?1",
                params![user.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }

    fn save(&self, user: &UserKey, course: &Course) -> Result<u64> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction()?;

        let stored: Option<i64> = tx
            .query_row(
                "SELECT revision FROM courses WHERE user = ?1",
                params![user.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let stored = stored.map(|r| u64::try_from(r).unwrap_or(0));
        let revision = next_revision(user, stored, course)?;

        let mut course = course.clone();
        course.revision = revision;
        let body = serde_json::to_string(&course)?;
        tx.execute(
            "INSERT INTO courses (user, revision, body, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user) DO UPDATE SET
                 revision = excluded.revision,
                 body = excluded.body,
                 updated_at = excluded.updated_at",
            params![
                user.as_str(),
                to_sql_revision(revision),
                body,
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;

        debug!(%user, revision, "Saved course");
        Ok(revision)
    }

    fn delete(&self, user: &UserKey) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let removed = conn.execute("DELETE FROM courses WHERE user = ?1", params![user.as_str()])?;
        if removed > 0 {
            info!(%user, "Deleted course");
        }
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Language, StudySet};

    fn user() -> UserKey {
        UserKey::parse("ana@example.com").unwrap()
    }

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.db");
        let mut course = Course::new(Language::new("de", "German"), Utc::now());
        course
            .study_sets
            .push(StudySet::new("Basics".into(), Utc::now()));

        {
            let store = SqliteStore::new(&path).unwrap();
            assert_eq!(store.save(&user(), &course).unwrap(), 1);
        }

        let store = SqliteStore::new(&path).unwrap();
        let loaded = store.load(&user()).unwrap().unwrap();
        assert_eq!(loaded.study_sets[0].name, "Basics");
        assert_eq!(loaded.revision, 1);
    }

    #[test]
    fn conflicting_save_is_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let course = Course::new(Language::new("de", "German"), Utc::now());
        store.save(&user(), &course).unwrap();

        // Still revision 0 locally, stored is 1.
        let err = store.save(&user(), &course).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 0, found: 1, .. }));

        let mut fresh = store.load(&user()).unwrap().unwrap();
        fresh.study_sets.push(StudySet::new("Verbs".into(), Utc::now()));
        assert_eq!(store.save(&user(), &fresh).unwrap(), 2);
    }

    #[test]
    fn delete_missing_user() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(!store.delete(&user()).unwrap());
        assert!(store.load(&user()).unwrap().is_none());
    }
}
