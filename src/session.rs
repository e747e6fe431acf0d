//! Review and practice sessions.
//!
//! A [`ReviewSession`] walks the practice queue of a study set, showing one
//! random exercise per due word and grading each word once. A [`WordSession`]
//! runs every exercise of a single word and grades the word once at the end
//! from the share of correct answers.
//!
//! Both move `Idle -> Active -> Complete`. A word's card state changes only
//! inside a grading call, and only after the scheduler has succeeded.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::SeedableRng;
use thiserror::Error;
use tracing::debug;

use crate::card::{CardState, Grade};
use crate::models::{Exercise, StudySet};
use crate::queue::build_limited_queue;
use crate::scheduler::{ScheduleError, Scheduler};

/// Share of correct answers a single-word session needs to count as a success.
pub const PASS_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Active,
    Complete,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session is {0:?}; expected it to be active")]
    NotActive(SessionPhase),

    #[error("Session has already been started")]
    AlreadyStarted,

    #[error("Word not found: {0}")]
    WordNotFound(String),

    #[error("Word {0} has no exercises yet")]
    NoExercises(String),

    #[error("Could not schedule word {word_id}: {source}")]
    Schedule {
        word_id: String,
        #[source]
        source: ScheduleError,
    },
}

/// One scheduler invocation and its result.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    pub word_id: String,
    pub grade: Grade,
    pub before: CardState,
    pub after: CardState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub graded: usize,
    pub successes: usize,
    pub skipped: usize,
}

/// Run the scheduler for one word and store the result on success.
fn apply_grade(
    set: &mut StudySet,
    word_id: &str,
    scheduler: &dyn Scheduler,
    grade: Grade,
    now: DateTime<Utc>,
    rng: &mut StdRng,
) -> Result<GradeRecord, SessionError> {
    let word = set
        .word_mut(word_id)
        .ok_or_else(|| SessionError::WordNotFound(word_id.to_string()))?;
    let after = scheduler
        .next_state(&word.srs, grade, now, rng)
        .map_err(|source| SessionError::Schedule {
            word_id: word_id.to_string(),
            source,
        })?;
    let before = std::mem::replace(&mut word.srs, after.clone());

    debug!(
        word = %word.learning_word,
        %grade,
        state = %after.state,
        stability = after.stability,
        scheduled_days = after.scheduled_days,
        "Graded word"
    );

    Ok(GradeRecord {
        word_id: word_id.to_string(),
        grade,
        before,
        after,
    })
}

// ══════════════════════════════════════════════════════════════════════════
// Study-set review
// ══════════════════════════════════════════════════════════════════════════

pub struct ReviewSession {
    set_id: String,
    phase: SessionPhase,
    queue: VecDeque<String>,
    current: Option<Exercise>,
    total: usize,
    records: Vec<GradeRecord>,
    skipped: usize,
    rng: StdRng,
}

impl ReviewSession {
    pub fn new(set_id: impl Into<String>, seed: u64) -> Self {
        Self {
            set_id: set_id.into(),
            phase: SessionPhase::Idle,
            queue: VecDeque::new(),
            current: None,
            total: 0,
            records: Vec::new(),
            skipped: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn set_id(&self) -> &str {
        &self.set_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Build the queue and show the first exercise. An empty queue completes
    /// the session immediately; that is "nothing due", not an error.
    pub fn start(
        &mut self,
        set: &StudySet,
        now: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<SessionPhase, SessionError> {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        self.queue = build_limited_queue(set, now, limit)
            .into_iter()
            .map(|w| w.id.clone())
            .collect();
        self.total = self.queue.len();
        self.phase = SessionPhase::Active;
        debug!(set = %set.name, due = self.total, "Starting review session");
        self.show_head(set);
        Ok(self.phase)
    }

    pub fn current_word_id(&self) -> Option<&str> {
        match self.phase {
            SessionPhase::Active => self.queue.front().map(String::as_str),
            _ => None,
        }
    }

    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.current.as_ref()
    }

    /// (1-based position of the current word, words in the session)
    pub fn progress(&self) -> (usize, usize) {
        let done = self.records.len() + self.skipped;
        (done + 1, self.total)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Random source for presenting the current exercise (choice order).
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Grade the word at the head of the queue and move on. If the head word
    /// was removed from the set it is skipped instead and `WordNotFound` is
    /// returned; the session has still advanced.
    pub fn grade(
        &mut self,
        set: &mut StudySet,
        scheduler: &dyn Scheduler,
        grade: Grade,
        now: DateTime<Utc>,
    ) -> Result<GradeRecord, SessionError> {
        if self.phase != SessionPhase::Active {
            return Err(SessionError::NotActive(self.phase));
        }
        let word_id = self
            .queue
            .front()
            .cloned()
            .ok_or(SessionError::NotActive(self.phase))?;

        if set.word(&word_id).is_none() {
            debug!(word_id = %word_id, "Current word was removed; skipping");
            self.queue.pop_front();
            self.skipped += 1;
            self.show_head(set);
            return Err(SessionError::WordNotFound(word_id));
        }

        let record = apply_grade(set, &word_id, scheduler, grade, now, &mut self.rng)?;
        self.records.push(record.clone());
        self.queue.pop_front();
        self.show_head(set);
        Ok(record)
    }

    /// Drop the current word without grading it.
    pub fn skip(&mut self, set: &StudySet) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Active {
            return Err(SessionError::NotActive(self.phase));
        }
        self.queue.pop_front();
        self.skipped += 1;
        self.show_head(set);
        Ok(())
    }

    pub fn records(&self) -> &[GradeRecord] {
        &self.records
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            graded: self.records.len(),
            successes: self.records.iter().filter(|r| r.grade.is_success()).count(),
            skipped: self.skipped,
        }
    }

    /// Return to idle so the session can be started again.
    pub fn reset(&mut self) {
        self.phase = SessionPhase::Idle;
        self.queue.clear();
        self.current = None;
        self.total = 0;
        self.records.clear();
        self.skipped = 0;
    }

    /// Pick an exercise for the head word. Words removed from the set or
    /// left without exercises since the queue was built are skipped.
    fn show_head(&mut self, set: &StudySet) {
        self.current = None;
        while let Some(word_id) = self.queue.front() {
            let picked = set
                .word(word_id)
                .and_then(|w| w.exercises().iter().choose(&mut self.rng))
                .cloned();
            match picked {
                Some(exercise) => {
                    self.current = Some(exercise);
                    return;
                }
                None => {
                    debug!(word_id = %word_id, "Skipping word that is no longer practicable");
                    self.queue.pop_front();
                    self.skipped += 1;
                }
            }
        }
        self.phase = SessionPhase::Complete;
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Single-word practice
// ══════════════════════════════════════════════════════════════════════════

/// Result of answering one exercise in a [`WordSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum WordStep {
    /// More exercises follow.
    Next,
    /// The last exercise was answered and the word was graded.
    Complete(GradeRecord),
}

/// Success when at least [`PASS_RATIO`] of the answers were correct.
pub fn aggregate_grade(results: &[bool]) -> Grade {
    if results.is_empty() {
        return Grade::Fail;
    }
    let correct = results.iter().filter(|&&r| r).count();
    Grade::from_correct(correct as f64 / results.len() as f64 >= PASS_RATIO)
}

pub struct WordSession {
    set_id: String,
    word_id: String,
    phase: SessionPhase,
    exercises: Vec<Exercise>,
    index: usize,
    results: Vec<bool>,
    record: Option<GradeRecord>,
    rng: StdRng,
}

impl WordSession {
    pub fn new(set_id: impl Into<String>, word_id: impl Into<String>, seed: u64) -> Self {
        Self {
            set_id: set_id.into(),
            word_id: word_id.into(),
            phase: SessionPhase::Idle,
            exercises: Vec::new(),
            index: 0,
            results: Vec::new(),
            record: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn set_id(&self) -> &str {
        &self.set_id
    }

    pub fn word_id(&self) -> &str {
        &self.word_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Queue every exercise of the word in random order.
    pub fn start(&mut self, set: &StudySet) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        let word = set
            .word(&self.word_id)
            .ok_or_else(|| SessionError::WordNotFound(self.word_id.clone()))?;
        if !word.is_practicable() {
            return Err(SessionError::NoExercises(self.word_id.clone()));
        }

        let mut exercises = word.exercises().to_vec();
        exercises.shuffle(&mut self.rng);
        debug!(word = %word.learning_word, exercises = exercises.len(), "Starting word practice");

        self.exercises = exercises;
        self.index = 0;
        self.results.clear();
        self.record = None;
        self.phase = SessionPhase::Active;
        Ok(())
    }

    pub fn current_exercise(&self) -> Option<&Exercise> {
        match self.phase {
            SessionPhase::Active => self.exercises.get(self.index),
            _ => None,
        }
    }

    /// (1-based exercise number, exercises in the session)
    pub fn progress(&self) -> (usize, usize) {
        ((self.index + 1).min(self.exercises.len()), self.exercises.len())
    }

    /// Answers so far, in the order the exercises were shown.
    pub fn results(&self) -> &[bool] {
        &self.results
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Record the answer to the current exercise. The last answer grades the
    /// word exactly once.
    pub fn answer(
        &mut self,
        set: &mut StudySet,
        scheduler: &dyn Scheduler,
        correct: bool,
        now: DateTime<Utc>,
    ) -> Result<WordStep, SessionError> {
        if self.phase != SessionPhase::Active {
            return Err(SessionError::NotActive(self.phase));
        }

        if self.index + 1 < self.exercises.len() {
            self.results.push(correct);
            self.index += 1;
            return Ok(WordStep::Next);
        }

        let mut results = self.results.clone();
        results.push(correct);
        let grade = aggregate_grade(&results);
        let record = apply_grade(set, &self.word_id, scheduler, grade, now, &mut self.rng)?;

        self.results = results;
        self.record = Some(record.clone());
        self.phase = SessionPhase::Complete;
        Ok(WordStep::Complete(record))
    }

    pub fn record(&self) -> Option<&GradeRecord> {
        self.record.as_ref()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            graded: usize::from(self.record.is_some()),
            successes: self.results.iter().filter(|&&r| r).count(),
            skipped: 0,
        }
    }

    pub fn reset(&mut self) {
        self.phase = SessionPhase::Idle;
        self.exercises.clear();
        self.index = 0;
        self.results.clear();
        self.record = None;
    }
}
