//! FSRS-6 scheduler.
//!
//! Core formulas:
//! - Retrievability: `R = (1 + FACTOR * t / S)^DECAY`,
//!   `DECAY = -w20`, `FACTOR = 0.9^(1/DECAY) - 1`
//! - Interval: `t = S / FACTOR * (R^(1/DECAY) - 1)`
//!
//! New cards walk the learning ladder before reaching review; lapsed review
//! cards walk the relearning ladder. Ladder steps are fractional days.

use chrono::{DateTime, Utc};
use rand::RngCore;

use super::fuzz::fuzz_interval;
use super::{IntervalPreview, ScheduleError, Scheduler, MAX_FAIL_INTERVAL_DAYS};
use crate::card::{
    days_to_duration, CardState, Grade, LearningState, MAX_DIFFICULTY, MAX_STABILITY,
    MIN_DIFFICULTY, MIN_STABILITY,
};

/// FSRS-6 default weights.
pub const DEFAULT_WEIGHTS: [f64; 21] = [
    0.212, 1.2931, 2.3065, 8.2956, 6.4133, 0.8334, 3.0194, 0.001, 1.8722, 0.1666, 0.796, 1.4835,
    0.0614, 0.2629, 1.6483, 0.6014, 1.8729, 0.5425, 0.0912, 0.0658, 0.1542,
];

/// Accepted range of each weight, inclusive.
pub const WEIGHT_RANGES: [(f64, f64); 21] = [
    (0.001, 100.0),
    (0.001, 100.0),
    (0.001, 100.0),
    (0.001, 100.0),
    (1.0, 10.0),
    (0.001, 4.0),
    (0.001, 4.0),
    (0.001, 0.75),
    (0.0, 4.5),
    (0.0, 0.8),
    (0.001, 3.5),
    (0.001, 5.0),
    (0.001, 0.25),
    (0.001, 0.9),
    (0.0, 4.0),
    (0.0, 1.0),
    (1.0, 6.0),
    (0.0, 2.0),
    (0.0, 2.0),
    (0.0, 0.8),
    (0.1, 0.8),
];

pub const DEFAULT_RETENTION: f64 = 0.9;
pub const DEFAULT_MAXIMUM_INTERVAL: u32 = 36500;
/// 10 minutes, then 1 day.
pub const DEFAULT_LEARNING_STEPS: [f64; 2] = [10.0 / 1440.0, 1.0];
pub const DEFAULT_RELEARNING_STEPS: [f64; 1] = [1.0];

/// Step used if a ladder was configured empty.
const FALLBACK_STEP_DAYS: f64 = 1.0;
/// Reviews closer together than this use the short-term stability formula.
const SAME_DAY: f64 = 1.0;
/// Rating used as the difficulty mean-reversion target (Easy).
const EASY_RATING: f64 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FsrsParameters {
    pub weights: [f64; 21],
    pub request_retention: f64,
    pub maximum_interval: u32,
    pub enable_fuzz: bool,
    pub learning_steps: Vec<f64>,
    pub relearning_steps: Vec<f64>,
}

impl Default for FsrsParameters {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            request_retention: DEFAULT_RETENTION,
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
            enable_fuzz: true,
            learning_steps: DEFAULT_LEARNING_STEPS.to_vec(),
            relearning_steps: DEFAULT_RELEARNING_STEPS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FsrsScheduler {
    params: FsrsParameters,
}

impl FsrsScheduler {
    pub fn new(params: FsrsParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FsrsParameters {
        &self.params
    }

    fn w(&self, i: usize) -> f64 {
        self.params.weights[i]
    }

    fn decay(&self) -> f64 {
        -self.w(20)
    }

    fn factor(&self) -> f64 {
        0.9f64.powf(1.0 / self.decay()) - 1.0
    }

    /// Probability of recall after `elapsed_days` at `stability`.
    pub fn retrievability(&self, elapsed_days: f64, stability: f64) -> f64 {
        (1.0 + self.factor() * elapsed_days.max(0.0) / stability).powf(self.decay())
    }

    pub fn initial_stability(&self, grade: Grade) -> f64 {
        self.w(grade.rating() as usize - 1).max(MIN_STABILITY)
    }

    /// Unclamped: the Easy value is used as a mean-reversion target below 1.
    fn raw_initial_difficulty(&self, rating: f64) -> f64 {
        self.w(4) - (self.w(5) * (rating - 1.0)).exp() + 1.0
    }

    pub fn initial_difficulty(&self, grade: Grade) -> f64 {
        clamp_difficulty(self.raw_initial_difficulty(grade.rating()))
    }

    /// Linear damping toward 10, then mean reversion toward the Easy default.
    pub fn next_difficulty(&self, difficulty: f64, grade: Grade) -> f64 {
        let delta = -self.w(6) * (grade.rating() - 3.0);
        let damped = difficulty + delta * (10.0 - difficulty) / 9.0;
        let reverted =
            self.w(7) * self.raw_initial_difficulty(EASY_RATING) + (1.0 - self.w(7)) * damped;
        clamp_difficulty(reverted)
    }

    /// Stability after a successful recall at retrievability `r`.
    pub fn next_recall_stability(&self, difficulty: f64, stability: f64, r: f64) -> f64 {
        stability
            * (1.0
                + self.w(8).exp()
                    * (11.0 - difficulty)
                    * stability.powf(-self.w(9))
                    * (((1.0 - r) * self.w(10)).exp() - 1.0))
    }

    /// Stability after a lapse at retrievability `r`.
    pub fn next_forget_stability(&self, difficulty: f64, stability: f64, r: f64) -> f64 {
        self.w(11)
            * difficulty.powf(-self.w(12))
            * ((stability + 1.0).powf(self.w(13)) - 1.0)
            * ((1.0 - r) * self.w(14)).exp()
    }

    /// Same-day review. A success never lowers stability.
    pub fn short_term_stability(&self, stability: f64, grade: Grade) -> f64 {
        let increase = stability.powf(-self.w(19))
            * (self.w(17) * (grade.rating() - 3.0 + self.w(18))).exp();
        let increase = if grade.is_success() {
            increase.max(1.0)
        } else {
            increase
        };
        stability * increase
    }

    /// Days until retrievability falls to the requested retention.
    pub fn next_interval(&self, stability: f64) -> f64 {
        stability / self.factor() * (self.params.request_retention.powf(1.0 / self.decay()) - 1.0)
    }

    fn review_interval(
        &self,
        stability: f64,
        elapsed_days: f64,
        rng: Option<&mut dyn RngCore>,
    ) -> f64 {
        let maximum = f64::from(self.params.maximum_interval.max(1));
        let interval = self.next_interval(stability).round().clamp(1.0, maximum);
        match rng {
            Some(rng) if self.params.enable_fuzz => {
                fuzz_interval(interval, elapsed_days, self.params.maximum_interval, rng)
                    .clamp(1.0, maximum)
            }
            _ => interval,
        }
    }

    fn memory_update(&self, card: &CardState, grade: Grade, elapsed_days: f64) -> (f64, f64) {
        if card.state == LearningState::New {
            return (self.initial_stability(grade), self.initial_difficulty(grade));
        }

        let stability = card.stability;
        let next = if elapsed_days < SAME_DAY {
            self.short_term_stability(stability, grade)
        } else {
            let r = self.retrievability(elapsed_days, stability);
            match grade {
                Grade::Success => self.next_recall_stability(card.difficulty, stability, r),
                Grade::Fail => self.next_forget_stability(card.difficulty, stability, r),
            }
        };
        // A lapse always costs at least the short-term penalty.
        let next = match grade {
            Grade::Fail => next.min(stability / (self.w(17) * self.w(18)).exp()),
            Grade::Success => next,
        };

        (
            next.clamp(MIN_STABILITY, MAX_STABILITY),
            self.next_difficulty(card.difficulty, grade),
        )
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
        let (stability, difficulty) = self.memory_update(card, grade, elapsed_days);

        let mut next = card.clone();
        next.stability = stability;
        next.difficulty = difficulty;
        next.elapsed_days = elapsed_days;
        next.last_review = Some(now);
        next.reps = card.reps.saturating_add(1);

        match grade {
            Grade::Fail => {
                next.lapses = card.lapses.saturating_add(1);
                let (state, ladder) = match card.state {
                    LearningState::Review | LearningState::Relearning => {
                        (LearningState::Relearning, &self.params.relearning_steps)
                    }
                    LearningState::New | LearningState::Learning => {
                        (LearningState::Learning, &self.params.learning_steps)
                    }
                };
                next.state = state;
                next.learning_steps = 0;
                next.scheduled_days = ladder
                    .first()
                    .copied()
                    .unwrap_or(FALLBACK_STEP_DAYS)
                    .min(MAX_FAIL_INTERVAL_DAYS);
            }
            Grade::Success => {
                let (ladder, step) = match card.state {
                    LearningState::Review => (None, 0),
                    LearningState::New => (Some(&self.params.learning_steps), 0),
                    LearningState::Learning => (
                        Some(&self.params.learning_steps),
                        card.learning_steps.saturating_add(1),
                    ),
                    LearningState::Relearning => (
                        Some(&self.params.relearning_steps),
                        card.learning_steps.saturating_add(1),
                    ),
                };
                match ladder.and_then(|steps| steps.get(step as usize)) {
                    Some(&days) => {
                        next.state = match card.state {
                            LearningState::New => LearningState::Learning,
                            other => other,
                        };
                        next.learning_steps = step;
                        next.scheduled_days = days;
                    }
                    None => {
                        next.state = LearningState::Review;
                        next.learning_steps = 0;
                        next.scheduled_days = self.review_interval(stability, elapsed_days, rng);
                    }
                }
            }
        }

        next.validate()?;
        next.due = now + days_to_duration(next.scheduled_days);
        Ok(next)
    }
}

impl Scheduler for FsrsScheduler {
    fn name(&self) -> &'static str {
        "fsrs"
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

fn clamp_difficulty(d: f64) -> f64 {
    d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}
