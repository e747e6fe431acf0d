//! Course backups.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{CourseStore, Result, StoreError, UserKey};
use crate::models::Course;

pub const BACKUP_VERSION: u32 = 1;

/// Backup format containing one user's course.
#[derive(Debug, Serialize, Deserialize)]
pub struct Backup {
    pub version: u32,
    pub created_at: DateTime<Local>,
    pub course: Course,
}

/// Write the user's course to `path`. Returns the number of words exported,
/// or `None` when the user has no course.
pub fn export_backup(store: &dyn CourseStore, user: &UserKey, path: &Path) -> Result<Option<usize>> {
    let Some(course) = store.load(user)? else {
        return Ok(None);
    };

    let backup = Backup {
        version: BACKUP_VERSION,
        created_at: Local::now(),
        course,
    };
    let json = serde_json::to_string_pretty(&backup)?;
    fs::write(path, json)?;

    let words = backup.course.word_count();
    info!(%user, words, path = %path.display(), "Exported backup");
    Ok(Some(words))
}

/// Restore a backup as the user's course. An existing course is only
/// replaced when `force` is set. Returns the number of words imported.
pub fn import_backup(
    store: &dyn CourseStore,
    user: &UserKey,
    path: &Path,
    force: bool,
) -> Result<usize> {
    let json = fs::read_to_string(path)?;
    let backup: Backup = serde_json::from_str(&json)?;
    if backup.version > BACKUP_VERSION {
        return Err(StoreError::BackupVersion(backup.version));
    }

    let existing = store.load(user)?;
    if existing.is_some() && !force {
        return Err(StoreError::AlreadyExists(user.to_string()));
    }

    let mut course = backup.course;
    course.revision = existing.map(|c| c.revision).unwrap_or(0);
    store.save(user, &course)?;

    let words = course.word_count();
    info!(%user, words, path = %path.display(), "Imported backup");
    Ok(words)
}

/// Get default backup path.
pub fn default_backup_path() -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!("vocaboost_backup_{}.json", timestamp))
}
