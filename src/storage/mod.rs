//! Course persistence.
//!
//! A course is stored as one document per user and replaced whole on every
//! save. Saves are compare-and-swap on [`Course::revision`]: a save built from
//! a stale copy fails with [`StoreError::Conflict`].

mod backup;
mod import;
mod json;
mod memory;
mod sqlite;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Course;

pub use backup::{default_backup_path, export_backup, import_backup, Backup, BACKUP_VERSION};
pub use import::{filename_to_title_case, read_word_csv, CsvWord};
pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid user key: {0:?}")]
    InvalidUser(String),

    #[error("Course for {user} changed since it was loaded (revision {expected}, stored {found})")]
    Conflict { user: String, expected: u64, found: u64 },

    #[error("A course already exists for {0}")]
    AlreadyExists(String),

    #[error("Unsupported backup version {0}")]
    BackupVersion(u32),

    #[error("Store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A normalised user identifier: trimmed, lower-cased, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserKey(String);

impl UserKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let key = raw.trim().to_lowercase();
        if key.is_empty() {
            return Err(StoreError::InvalidUser(raw.to_string()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserKey {
    type Error = StoreError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<UserKey> for String {
    fn from(key: UserKey) -> Self {
        key.0
    }
}

/// Whole-course persistence keyed by user.
pub trait CourseStore: Send + Sync {
    fn load(&self, user: &UserKey) -> Result<Option<Course>>;

    /// Store `course` if the stored revision still equals `course.revision`
    /// (0 when nothing is stored). Returns the new revision.
    fn save(&self, user: &UserKey, course: &Course) -> Result<u64>;

    /// Returns `false` when there was nothing to delete.
    fn delete(&self, user: &UserKey) -> Result<bool>;
}

/// Compare-and-swap check shared by the backends.
pub(crate) fn next_revision(user: &UserKey, stored: Option<u64>, course: &Course) -> Result<u64> {
    let found = stored.unwrap_or(0);
    if found != course.revision {
        return Err(StoreError::Conflict {
            user: user.to_string(),
            expected: course.revision,
            found,
        });
    }
    Ok(found.saturating_add(1))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Open the configured backend under `data_dir`.
pub fn open_store(backend: StorageBackend, data_dir: &Path) -> Result<Box<dyn CourseStore>> {
    Ok(match backend {
        StorageBackend::Json => Box::new(JsonFileStore::new(data_dir.join("courses"))?),
        StorageBackend::Sqlite => {
            std::fs::create_dir_all(data_dir)?;
            Box::new(SqliteStore::new(data_dir.join("vocaboost.db"))?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_keys_are_normalised() {
        let key = UserKey::parse("  Ana@Example.COM ").unwrap();
        assert_eq!(key.as_str(), "ana@example.com");
        assert!(matches!(
            UserKey::parse("   "),
            Err(StoreError::InvalidUser(_))
        ));
    }

    #[test]
    fn user_key_deserialization_normalises() {
        let key: UserKey = serde_json::from_str("\"Bob@X.org\"").unwrap();
        assert_eq!(key.as_str(), "bob@x.org");
        assert!(serde_json::from_str::<UserKey>("\"\"").is_err());
    }

    #[test]
    fn backend_names() {
        let backend: StorageBackend = serde_json::from_str("\"sqlite\"").unwrap();
        assert_eq!(backend, StorageBackend::Sqlite);
        assert_eq!(StorageBackend::default().as_str(), "json");
    }
}
