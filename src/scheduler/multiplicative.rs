//! Multiplicative stability model.
//!
//! Each success multiplies stability by a growth factor that shrinks as
//! difficulty rises; each failure halves it. No learning ladder: a new card
//! is seen again after one day, then graduates to review.

use chrono::{DateTime, Utc};
use rand::RngCore;

use super::fuzz::fuzz_interval;
use super::{IntervalPreview, ScheduleError, Scheduler};
use crate::card::{
    days_to_duration, CardState, Grade, LearningState, MAX_DIFFICULTY, MAX_STABILITY,
    MIN_DIFFICULTY, MIN_STABILITY,
};

const INITIAL_STABILITY: f64 = 1.0;
const GROWTH_PER_EASE_POINT: f64 = 0.15;
const LAPSE_FACTOR: f64 = 0.5;
const SUCCESS_DIFFICULTY_STEP: f64 = 0.2;
const FAIL_DIFFICULTY_STEP: f64 = 1.0;
const RETRY_DAYS: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct MultiplicativeScheduler {
    maximum_interval: u32,
    enable_fuzz: bool,
}

impl Default for MultiplicativeScheduler {
    fn default() -> Self {
        Self::new(super::DEFAULT_MAXIMUM_INTERVAL, true)
    }
}

impl MultiplicativeScheduler {
    pub fn new(maximum_interval: u32, enable_fuzz: bool) -> Self {
        Self {
            maximum_interval,
            enable_fuzz,
        }
    }

    /// 2.5 at the easiest difficulty, 1.15 at the hardest.
    pub fn growth_factor(difficulty: f64) -> f64 {
        1.0 + (MAX_DIFFICULTY + 1.0 - difficulty) * GROWTH_PER_EASE_POINT
    }

    fn interval(&self, stability: f64, elapsed_days: f64, rng: Option<&mut dyn RngCore>) -> f64 {
        let maximum = f64::from(self.maximum_interval.max(1));
        let interval = stability.round().clamp(1.0, maximum);
        match rng {
            Some(rng) if self.enable_fuzz => {
                fuzz_interval(interval, elapsed_days, self.maximum_interval, rng).clamp(1.0, maximum)
            }
            _ => interval,
        }
    }

    fn schedule(
        &self,
        card: &CardState,
        grade: Grade,
        now: DateTime<Utc>,
        rng: Option<&mut dyn RngCore>,
    ) -> Result<CardState, ScheduleError> {
        card.validate()?;

        let elapsed_days = card.days_since_review(now);
        let mut next = card.clone();
        next.elapsed_days = elapsed_days;
        next.last_review = Some(now);
        next.reps = card.reps.saturating_add(1);
        next.learning_steps = 0;

        match grade {
            Grade::Fail => {
                next.lapses = card.lapses.saturating_add(1);
                next.stability = (card.stability * LAPSE_FACTOR).max(MIN_STABILITY);
                next.difficulty = (card.difficulty + FAIL_DIFFICULTY_STEP).min(MAX_DIFFICULTY);
                next.state = match card.state {
                    LearningState::Review | LearningState::Relearning => LearningState::Relearning,
                    LearningState::New | LearningState::Learning => LearningState::Learning,
                };
                next.scheduled_days = RETRY_DAYS;
            }
            Grade::Success if card.state == LearningState::New => {
                next.stability = INITIAL_STABILITY;
                next.state = LearningState::Learning;
                next.scheduled_days = RETRY_DAYS;
            }
            Grade::Success => {
                next.stability = (card.stability * Self::growth_factor(card.difficulty))
                    .clamp(MIN_STABILITY, MAX_STABILITY);
                if card.state == LearningState::Review {
                    next.difficulty =
                        (card.difficulty - SUCCESS_DIFFICULTY_STEP).max(MIN_DIFFICULTY);
                }
                next.state = LearningState::Review;
                next.scheduled_days = self.interval(next.stability, elapsed_days, rng);
            }
        }

        next.validate()?;
        next.due = now + days_to_duration(next.scheduled_days);
        Ok(next)
    }
}

impl Scheduler for MultiplicativeScheduler {
    fn name(&self) -> &'static str {
        "multiplicative"
    }

    fn next_state(
        &self,
        card: &CardState,
        grade: Grade,
        now: DateTime<Utc>,
        rng: &mut dyn RngCore,
    ) -> Result<CardState, ScheduleError> {
        self.schedule(card, grade, now, Some(rng))
    }

    fn preview(&self, card: &CardState, now: DateTime<Utc>) -> Result<IntervalPreview, ScheduleError> {
        Ok(IntervalPreview {
            success: self.schedule(card, Grade::Success, now, None)?.scheduled_days,
            fail: self.schedule(card, Grade::Fail, now, None)?.scheduled_days,
        })
    }
}
