//! One JSON file per user.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{next_revision, CourseStore, Result, StoreError, UserKey};
use crate::models::Course;

/// On-disk document. The file name is derived from the user key, so the
/// key is kept inside as well.
#[derive(Debug, Serialize, Deserialize)]
struct CourseFile {
    user: UserKey,
    course: Course,
}

/// Stores each user's course as `<dir>/<uuid-v5(user)>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Opened JSON course store");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Get default storage location.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vocaboost")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn course_path(&self, user: &UserKey) -> PathBuf {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, user.as_str().as_bytes());
        self.dir.join(format!("{}.json", id))
    }

    fn read(&self, path: &Path) -> Result<Option<CourseFile>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}

impl CourseStore for JsonFileStore {
    fn load(&self, user: &UserKey) -> Result<Option<Course>> {
        Ok(self.read(&self.course_path(user))?.map(|file| file.course))
    }

    fn save(&self, user: &UserKey, course: &Course) -> Result<u64> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let path = self.course_path(user);
        let stored = self.read(&path)?.map(|file| file.course.revision);
        let revision = next_revision(user, stored, course)?;

        let mut course = course.clone();
        course.revision = revision;
        let json = serde_json::to_string_pretty(&CourseFile {
            user: user.clone(),
            course,
        })?;

        // Write then rename so a crash never leaves a half-written course.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        debug!(%user, revision, path = %path.display(), "Saved course");
        Ok(revision)
    }

    fn delete(&self, user: &UserKey) -> Result<bool> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let path = self.course_path(user);
        if path.exists() {
            fs::remove_file(&path)?;
            info!(%user, "Deleted course");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Language;
    use chrono::Utc;

    fn course() -> Course {
        Course::new(Language::new("fr", "French"), Utc::now())
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        let user = UserKey::parse("ana@example.com").unwrap();

        assert!(store.load(&user).unwrap().is_none());
        let course = course();
        assert_eq!(store.save(&user, &course).unwrap(), 1);

        let loaded = store.load(&user).unwrap().unwrap();
        assert_eq!(loaded.id, course.id);
        assert_eq!(loaded.revision, 1);
    }

    #[test]
    fn file_name_is_stable_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        let a = UserKey::parse("ana@example.com").unwrap();
        let b = UserKey::parse("ANA@example.com ").unwrap();
        assert_eq!(store.course_path(&a), store.course_path(&b));
        assert_ne!(
            store.course_path(&a),
            store.course_path(&UserKey::parse("bob@example.com").unwrap())
        );
    }

    #[test]
    fn stale_save_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        let user = UserKey::parse("ana@example.com").unwrap();

        let mut first = course();
        first.revision = store.save(&user, &first).unwrap();
        let stale = first.clone();
        store.save(&user, &first).unwrap();

        assert!(matches!(
            store.save(&user, &stale),
            Err(StoreError::Conflict { expected: 1, found: 2, .. })
        ));
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        let user = UserKey::parse("ana@example.com").unwrap();
        store.save(&user, &course()).unwrap();

        assert!(store.delete(&user).unwrap());
        assert!(!store.delete(&user).unwrap());
        assert!(store.load(&user).unwrap().is_none());
    }
}
