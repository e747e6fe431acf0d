//! In-process store, used by tests and throwaway sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{next_revision, CourseStore, Result, StoreError, UserKey};
use crate::models::Course;

#[derive(Debug, Default)]
pub struct MemoryStore {
    courses: Mutex<HashMap<UserKey, Course>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CourseStore for MemoryStore {
    fn load(&self, user: &UserKey) -> Result<Option<Course>> {
        let courses = self.courses.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(courses.get(user).cloned())
    }

    fn save(&self, user: &UserKey, course: &Course) -> Result<u64> {
        let mut courses = self.courses.lock().map_err(|_| StoreError::Poisoned)?;
        let revision = next_revision(user, courses.get(user).map(|c| c.revision), course)?;
        let mut course = course.clone();
        course.revision = revision;
        courses.insert(user.clone(), course);
        Ok(revision)
    }

    fn delete(&self, user: &UserKey) -> Result<bool> {
        let mut courses = self.courses.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(courses.remove(user).is_some())
    }
}
