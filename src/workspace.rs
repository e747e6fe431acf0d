//! Per-user application state.
//!
//! A [`Workspace`] is opened for one user, holds their course together with
//! the store and scheduler, and is closed when the user leaves. Every
//! mutation is persisted immediately. When a save fails the change stays in
//! memory and the workspace remains dirty until a later save succeeds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::card::Grade;
use crate::content::{validate_exercises, ContentGenerator, GenerationError, GenerationRequest};
use crate::models::{Course, Example, Exercise, Language, StudySet, StudySetStats, Word, WordContent};
use crate::queue::build_practice_queue;
use crate::scheduler::{IntervalPreview, ScheduleError, Scheduler};
use crate::session::{GradeRecord, ReviewSession, SessionError, WordSession, WordStep};
use crate::storage::{CourseStore, StoreError, UserKey};

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("No course yet; create one first")]
    NoCourse,

    #[error("A course already exists for this user")]
    CourseExists,

    #[error("Study set not found: {0}")]
    StudySetNotFound(String),

    #[error("A study set named \"{0}\" already exists")]
    DuplicateStudySet(String),

    #[error("Word not found: {0}")]
    WordNotFound(String),

    #[error("Word \"{0}\" is not waiting for content")]
    NotPending(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Result of adding a word to a study set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddWord {
    /// A new word was created, waiting for content.
    Added { word_id: String },
    /// The set already holds this word; nothing changed.
    Duplicate { word_id: String },
}

impl AddWord {
    pub fn word_id(&self) -> &str {
        match self {
            Self::Added { word_id } | Self::Duplicate { word_id } => word_id,
        }
    }
}

/// How content generation for a pending word ended.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Ready { word_id: String, exercises: usize },
    /// The word was removed again. It is returned with its failed content.
    RolledBack { word: Word, error: GenerationError },
}

pub struct Workspace {
    user: UserKey,
    store: Arc<dyn CourseStore>,
    scheduler: Box<dyn Scheduler>,
    course: Option<Course>,
    dirty: bool,
    max_reviews: Option<usize>,
}

impl Workspace {
    /// Load the user's course. Words left pending by an interrupted
    /// generation are dropped.
    pub fn open(
        user: UserKey,
        store: Arc<dyn CourseStore>,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<Self> {
        let course = store.load(&user)?;
        let mut workspace = Self {
            user,
            store,
            scheduler,
            course,
            dirty: false,
            max_reviews: None,
        };

        let stale = workspace.drop_pending_words();
        if stale > 0 {
            warn!(user = %workspace.user, stale, "Removed words left pending by an interrupted generation");
            if let Err(e) = workspace.commit() {
                warn!(user = %workspace.user, error = %e, "Pending word cleanup not saved yet");
            }
        }

        info!(
            user = %workspace.user,
            scheduler = workspace.scheduler.name(),
            has_course = workspace.course.is_some(),
            "Opened workspace"
        );
        Ok(workspace)
    }

    /// Cap the number of words in a review session.
    pub fn with_max_reviews(mut self, max_reviews: Option<usize>) -> Self {
        self.max_reviews = max_reviews;
        self
    }

    /// Persist outstanding changes and end the workspace.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        info!(user = %self.user, "Closed workspace");
        Ok(())
    }

    pub fn user(&self) -> &UserKey {
        &self.user
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    pub fn course(&self) -> Option<&Course> {
        self.course.as_ref()
    }

    /// Unsaved changes exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Save the course if it has unsaved changes.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(course) = self.course.as_mut() else {
            self.dirty = false;
            return Ok(());
        };
        course.revision = self.store.save(&self.user, course)?;
        self.dirty = false;
        debug!(user = %self.user, revision = course.revision, "Flushed course");
        Ok(())
    }

    /// Discard in-memory changes and load the stored course again.
    pub fn reload(&mut self) -> Result<()> {
        self.course = self.store.load(&self.user)?;
        self.dirty = false;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.dirty = true;
        self.flush()
    }

    fn drop_pending_words(&mut self) -> usize {
        let Some(course) = self.course.as_mut() else {
            return 0;
        };
        let mut removed = 0;
        for set in &mut course.study_sets {
            let before = set.words.len();
            set.words.retain(|w| !w.is_pending());
            removed += before - set.words.len();
        }
        removed
    }

    fn course_ref(&self) -> Result<&Course> {
        self.course.as_ref().ok_or(WorkspaceError::NoCourse)
    }

    fn course_mut(&mut self) -> Result<&mut Course> {
        self.course.as_mut().ok_or(WorkspaceError::NoCourse)
    }

    fn set_id(&self, set_key: &str) -> Result<String> {
        Ok(self.study_set(set_key)?.id.clone())
    }

    fn set_mut(&mut self, set_id: &str) -> Result<&mut StudySet> {
        self.course_mut()?
            .study_set_mut(set_id)
            .ok_or_else(|| WorkspaceError::StudySetNotFound(set_id.to_string()))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Course and study sets
    // ══════════════════════════════════════════════════════════════════════

    pub fn create_course(&mut self, learning_language: Language, now: DateTime<Utc>) -> Result<&Course> {
        if self.course.is_some() {
            return Err(WorkspaceError::CourseExists);
        }
        if learning_language.code == Language::site().code {
            return Err(WorkspaceError::InvalidInput(format!(
                "{} is already the native language",
                learning_language.name
            )));
        }

        info!(user = %self.user, language = %learning_language.name, "Creating course");
        self.course = Some(Course::new(learning_language, now));
        self.commit()?;
        self.course_ref()
    }

    /// Look up a study set by id or name.
    pub fn study_set(&self, set_key: &str) -> Result<&StudySet> {
        self.course_ref()?
            .find_study_set(set_key)
            .ok_or_else(|| WorkspaceError::StudySetNotFound(set_key.to_string()))
    }

    pub fn add_study_set(&mut self, name: &str, now: DateTime<Utc>) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkspaceError::InvalidInput("study set name is empty".to_string()));
        }
        let course = self.course_mut()?;
        if course
            .study_sets
            .iter()
            .any(|s| s.name.to_lowercase() == name.to_lowercase())
        {
            return Err(WorkspaceError::DuplicateStudySet(name.to_string()));
        }

        let set = StudySet::new(name.to_string(), now);
        let id = set.id.clone();
        course.study_sets.push(set);
        info!(set = name, "Added study set");
        self.commit()?;
        Ok(id)
    }

    pub fn remove_study_set(&mut self, set_key: &str) -> Result<StudySet> {
        let set_id = self.set_id(set_key)?;
        let course = self.course_mut()?;
        let index = course
            .study_sets
            .iter()
            .position(|s| s.id == set_id)
            .ok_or_else(|| WorkspaceError::StudySetNotFound(set_key.to_string()))?;
        let removed = course.study_sets.remove(index);
        info!(set = %removed.name, words = removed.words.len(), "Removed study set");
        self.commit()?;
        Ok(removed)
    }

    pub fn set_stats(&self, set_key: &str, now: DateTime<Utc>) -> Result<StudySetStats> {
        Ok(self.study_set(set_key)?.get_stats(now))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Words and content
    // ══════════════════════════════════════════════════════════════════════

    /// Add a word waiting for content. Duplicates (same learning word,
    /// ignoring case) are reported instead of added.
    pub fn add_word(
        &mut self,
        set_key: &str,
        learning_word: &str,
        native_word: &str,
        examples: Vec<Example>,
        now: DateTime<Utc>,
    ) -> Result<AddWord> {
        let learning_word = learning_word.trim();
        let native_word = native_word.trim();
        if learning_word.is_empty() || native_word.is_empty() {
            return Err(WorkspaceError::InvalidInput(
                "word and translation must not be empty".to_string(),
            ));
        }

        let set_id = self.set_id(set_key)?;
        let set = self.set_mut(&set_id)?;
        if let Some(existing) = set.find_word(learning_word) {
            debug!(word = learning_word, "Word already in set");
            return Ok(AddWord::Duplicate {
                word_id: existing.id.clone(),
            });
        }

        let word = Word::new(learning_word.to_string(), native_word.to_string(), examples, now);
        let word_id = word.id.clone();
        set.words.push(word);
        info!(word = learning_word, set = %set_id, "Added word, awaiting content");
        self.commit()?;
        Ok(AddWord::Added { word_id })
    }

    /// Complete the second phase of adding a word: promote it with its
    /// exercises, or roll it back when generation failed or produced
    /// nothing usable.
    pub fn finish_generation(
        &mut self,
        set_id: &str,
        word_id: &str,
        generated: std::result::Result<Vec<Exercise>, GenerationError>,
    ) -> Result<GenerationOutcome> {
        let set = self.set_mut(set_id)?;
        let word = set
            .word_mut(word_id)
            .ok_or_else(|| WorkspaceError::WordNotFound(word_id.to_string()))?;
        if !word.is_pending() {
            return Err(WorkspaceError::NotPending(word.learning_word.clone()));
        }

        let generated = generated.and_then(|exercises| {
            let valid = validate_exercises(&word.learning_word, exercises);
            if valid.is_empty() {
                Err(GenerationError::NoExercises(word.learning_word.clone()))
            } else {
                Ok(valid)
            }
        });

        let outcome = match generated {
            Ok(exercises) => {
                let count = exercises.len();
                word.content = WordContent::Ready { exercises };
                info!(word = %word.learning_word, exercises = count, "Content ready");
                GenerationOutcome::Ready {
                    word_id: word_id.to_string(),
                    exercises: count,
                }
            }
            Err(error) => {
                word.content = WordContent::Failed {
                    reason: error.to_string(),
                };
                warn!(word = %word.learning_word, %error, "Content generation failed, removing word");
                let word = set
                    .remove_word(word_id)
                    .ok_or_else(|| WorkspaceError::WordNotFound(word_id.to_string()))?;
                GenerationOutcome::RolledBack { word, error }
            }
        };

        self.commit()?;
        Ok(outcome)
    }

    /// Run `generator` for a pending word and finish the generation.
    pub fn generate_content(
        &mut self,
        set_key: &str,
        word_id: &str,
        generator: &dyn ContentGenerator,
    ) -> Result<GenerationOutcome> {
        let course = self.course_ref()?;
        let set = self.study_set(set_key)?;
        let word = set
            .word(word_id)
            .ok_or_else(|| WorkspaceError::WordNotFound(word_id.to_string()))?;
        let request = GenerationRequest::for_word(course, set, word);
        let set_id = set.id.clone();

        debug!(word = %request.learning_word, generator = generator.name(), "Generating content");
        let generated = generator.generate(&request);
        self.finish_generation(&set_id, word_id, generated)
    }

    /// Add a word and generate its content in one go. Duplicates are
    /// returned without generating anything.
    pub fn add_and_generate(
        &mut self,
        set_key: &str,
        learning_word: &str,
        native_word: &str,
        examples: Vec<Example>,
        generator: &dyn ContentGenerator,
        now: DateTime<Utc>,
    ) -> Result<(AddWord, Option<GenerationOutcome>)> {
        let added = self.add_word(set_key, learning_word, native_word, examples, now)?;
        let outcome = match &added {
            AddWord::Added { word_id } => Some(self.generate_content(set_key, word_id, generator)?),
            AddWord::Duplicate { .. } => None,
        };
        Ok((added, outcome))
    }

    /// Remove a word by id or by its learning word.
    pub fn remove_word(&mut self, set_key: &str, word_key: &str) -> Result<Word> {
        let set_id = self.set_id(set_key)?;
        let set = self.set_mut(&set_id)?;
        let word_id = set
            .word(word_key)
            .or_else(|| set.find_word(word_key))
            .map(|w| w.id.clone())
            .ok_or_else(|| WorkspaceError::WordNotFound(word_key.to_string()))?;
        let word = set
            .remove_word(&word_id)
            .ok_or_else(|| WorkspaceError::WordNotFound(word_key.to_string()))?;
        info!(word = %word.learning_word, "Removed word");
        self.commit()?;
        Ok(word)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Practice
    // ══════════════════════════════════════════════════════════════════════

    /// Words due for review in a set, earliest first.
    pub fn practice_queue(&self, set_key: &str, now: DateTime<Utc>) -> Result<Vec<&Word>> {
        Ok(build_practice_queue(self.study_set(set_key)?, now))
    }

    pub fn preview(&self, set_key: &str, word_id: &str, now: DateTime<Utc>) -> Result<IntervalPreview> {
        let word = self
            .study_set(set_key)?
            .word(word_id)
            .ok_or_else(|| WorkspaceError::WordNotFound(word_id.to_string()))?;
        Ok(self.scheduler.preview(&word.srs, now)?)
    }

    /// Start reviewing the due words of a set. The session may already be
    /// complete when nothing is due.
    pub fn start_review(&self, set_key: &str, now: DateTime<Utc>, seed: u64) -> Result<ReviewSession> {
        let set = self.study_set(set_key)?;
        let mut session = ReviewSession::new(set.id.clone(), seed);
        session.start(set, now, self.max_reviews)?;
        Ok(session)
    }

    /// Grade the current word of a review session and save.
    pub fn grade_review(
        &mut self,
        session: &mut ReviewSession,
        grade: Grade,
        now: DateTime<Utc>,
    ) -> Result<GradeRecord> {
        let course = self.course.as_mut().ok_or(WorkspaceError::NoCourse)?;
        let set = course
            .study_set_mut(session.set_id())
            .ok_or_else(|| WorkspaceError::StudySetNotFound(session.set_id().to_string()))?;
        let record = session.grade(set, self.scheduler.as_ref(), grade, now)?;
        self.commit()?;
        Ok(record)
    }

    /// Start practising every exercise of one word, by id or learning word.
    pub fn start_word_practice(&self, set_key: &str, word_key: &str, seed: u64) -> Result<WordSession> {
        let set = self.study_set(set_key)?;
        let word = set
            .word(word_key)
            .or_else(|| set.find_word(word_key))
            .ok_or_else(|| WorkspaceError::WordNotFound(word_key.to_string()))?;
        let mut session = WordSession::new(set.id.clone(), word.id.clone(), seed);
        session.start(set)?;
        Ok(session)
    }

    /// Record one answer of a word session. The course is saved when the
    /// answer completes the session.
    pub fn record_word_practice(
        &mut self,
        session: &mut WordSession,
        correct: bool,
        now: DateTime<Utc>,
    ) -> Result<WordStep> {
        let course = self.course.as_mut().ok_or(WorkspaceError::NoCourse)?;
        let set = course
            .study_set_mut(session.set_id())
            .ok_or_else(|| WorkspaceError::StudySetNotFound(session.set_id().to_string()))?;
        let step = session.answer(set, self.scheduler.as_ref(), correct, now)?;
        if matches!(step, WordStep::Complete(_)) {
            self.commit()?;
        }
        Ok(step)
    }
}
