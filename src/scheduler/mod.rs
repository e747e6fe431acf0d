//! Spaced repetition schedulers.
//!
//! Two strategies share the [`Scheduler`] trait:
//! - [`FsrsScheduler`]: FSRS-6 memory model (stability, difficulty,
//!   retrievability) with learning and relearning step ladders. The default.
//! - [`MultiplicativeScheduler`]: the older model that multiplies stability by
//!   a difficulty-dependent growth factor.
//!
//! A scheduler is a pure transform of a [`CardState`]. The only
//! non-determinism is interval fuzz, which draws from the random source the
//! caller passes in.

mod fsrs;
mod fuzz;
mod multiplicative;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::card::{CardState, Grade};

pub use fsrs::{
    FsrsParameters, FsrsScheduler, DEFAULT_LEARNING_STEPS, DEFAULT_MAXIMUM_INTERVAL,
    DEFAULT_RELEARNING_STEPS, DEFAULT_RETENTION, DEFAULT_WEIGHTS, WEIGHT_RANGES,
};
pub use fuzz::{fuzz_interval, fuzz_range};
pub use multiplicative::MultiplicativeScheduler;

/// Upper bound on the interval after a failed review.
pub const MAX_FAIL_INTERVAL_DAYS: f64 = 2.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Unknown grade '{0}', expected success or fail")]
    InvalidGrade(String),

    #[error("Card field {field} is not a finite number: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("Card stability must be positive, got {0}")]
    NonPositiveStability(f64),

    #[error("Card difficulty {0} is outside 1..=10")]
    DifficultyOutOfRange(f64),

    #[error("Card field {field} is negative: {value}")]
    NegativeDays { field: &'static str, value: f64 },

    #[error("Card has more lapses ({lapses}) than reviews ({reps})")]
    LapsesExceedReps { reps: u32, lapses: u32 },

    #[error("Card is marked new but has {0} recorded reviews")]
    ReviewedNewCard(u32),
}

/// Intervals, in days, that each grade would produce right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalPreview {
    pub success: f64,
    pub fail: f64,
}

impl IntervalPreview {
    pub fn for_grade(&self, grade: Grade) -> f64 {
        match grade {
            Grade::Success => self.success,
            Grade::Fail => self.fail,
        }
    }
}

pub trait Scheduler: Send + Sync {
    /// Short identifier used in logs and config.
    fn name(&self) -> &'static str;

    /// Grade `card` at `now` and return its next state.
    ///
    /// `rng` only feeds interval fuzz; with fuzz disabled the result is fully
    /// determined by the other arguments. Malformed input is rejected before
    /// any computation.
    fn next_state(
        &self,
        card: &CardState,
        grade: Grade,
        now: DateTime<Utc>,
        rng: &mut dyn RngCore,
    ) -> Result<CardState, ScheduleError>;

    /// Unfuzzed intervals for both grades.
    fn preview(&self, card: &CardState, now: DateTime<Utc>) -> Result<IntervalPreview, ScheduleError>;
}

/// Which scheduling model to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Fsrs,
    Multiplicative,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fsrs => "fsrs",
            Self::Multiplicative => "multiplicative",
        }
    }
}

/// Format an interval in days for display.
pub fn format_interval(days: f64) -> String {
    let minutes = (days * 1440.0).round() as i64;
    if minutes < 1 {
        "now".to_string()
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 1440 {
        format!("{}h", minutes / 60)
    } else {
        let days = (days.round() as i64).max(1);
        if days < 7 {
            format!("{}d", days)
        } else if days < 30 {
            format!("{}w", days / 7)
        } else if days < 365 {
            format!("{}mo", days / 30)
        } else {
            format!("{}y", days / 365)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0.0), "now");
        assert_eq!(format_interval(10.0 / 1440.0), "10m");
        assert_eq!(format_interval(0.25), "6h");
        assert_eq!(format_interval(1.0), "1d");
        assert_eq!(format_interval(5.0), "5d");
        assert_eq!(format_interval(14.0), "2w");
        assert_eq!(format_interval(90.0), "3mo");
        assert_eq!(format_interval(730.0), "2y");
    }

    #[test]
    fn algorithm_names() {
        assert_eq!(Algorithm::default(), Algorithm::Fsrs);
        assert_eq!(Algorithm::Multiplicative.as_str(), "multiplicative");
    }
}
