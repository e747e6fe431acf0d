//! Per-word scheduling state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::ScheduleError;

/// Lowest stability a card can carry, in days.
pub const MIN_STABILITY: f64 = 0.01;
/// Highest stability a card can carry, in days.
pub const MAX_STABILITY: f64 = 36500.0;
pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Difficulty given to a card before its first grading.
const FRESH_DIFFICULTY: f64 = 5.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Outcome of one review. Multi-level ratings are collapsed to these two
/// before they reach the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    Fail,
    Success,
}

impl Grade {
    pub fn from_correct(correct: bool) -> Self {
        if correct {
            Self::Success
        } else {
            Self::Fail
        }
    }

    pub fn from_key(c: char) -> Option<Self> {
        match c {
            'y' | 'Y' | '1' => Some(Self::Success),
            'n' | 'N' | '0' => Some(Self::Fail),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Fail => "Fail",
            Self::Success => "Success",
        }
    }

    /// FSRS rating value: Again (1) for a failure, Good (3) for a success.
    pub fn rating(&self) -> f64 {
        match self {
            Self::Fail => 1.0,
            Self::Success => 3.0,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Grade {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" | "pass" | "good" | "correct" | "y" | "yes" => Ok(Self::Success),
            "fail" | "again" | "incorrect" | "n" | "no" => Ok(Self::Fail),
            other => Err(ScheduleError::InvalidGrade(other.to_string())),
        }
    }
}

/// Where a card sits in the learning lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearningState {
    New,
    Learning,
    Review,
    Relearning,
}

impl LearningState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Relearning => "relearning",
        }
    }

    /// Learning and relearning both walk a short-interval step ladder.
    pub fn is_stepping(&self) -> bool {
        matches!(self, Self::Learning | Self::Relearning)
    }
}

impl fmt::Display for LearningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scheduling record embedded in every word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardState {
    pub due: DateTime<Utc>,
    pub stability: f64,
    pub difficulty: f64,
    pub elapsed_days: f64,
    pub scheduled_days: f64,
    pub learning_steps: u32,
    pub reps: u32,
    pub lapses: u32,
    pub state: LearningState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_review: Option<DateTime<Utc>>,
}

impl CardState {
    /// A never-reviewed card, due immediately.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            due: now,
            stability: MIN_STABILITY,
            difficulty: FRESH_DIFFICULTY,
            elapsed_days: 0.0,
            scheduled_days: 0.0,
            learning_steps: 0,
            reps: 0,
            lapses: 0,
            state: LearningState::New,
            last_review: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.state == LearningState::New
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.due
    }

    /// Days since the previous grading, never negative.
    pub fn days_since_review(&self, now: DateTime<Utc>) -> f64 {
        match self.last_review {
            Some(last) if now > last => (now - last).num_milliseconds() as f64 / MILLIS_PER_DAY,
            _ => 0.0,
        }
    }

    /// Reject records that no scheduler may consume.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for (field, value) in [
            ("stability", self.stability),
            ("difficulty", self.difficulty),
            ("elapsed_days", self.elapsed_days),
            ("scheduled_days", self.scheduled_days),
        ] {
            if !value.is_finite() {
                return Err(ScheduleError::NonFinite { field, value });
            }
        }
        if self.stability <= 0.0 {
            return Err(ScheduleError::NonPositiveStability(self.stability));
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(ScheduleError::DifficultyOutOfRange(self.difficulty));
        }
        if self.elapsed_days < 0.0 {
            return Err(ScheduleError::NegativeDays {
                field: "elapsed_days",
                value: self.elapsed_days,
            });
        }
        if self.scheduled_days < 0.0 {
            return Err(ScheduleError::NegativeDays {
                field: "scheduled_days",
                value: self.scheduled_days,
            });
        }
        if self.lapses > self.reps {
            return Err(ScheduleError::LapsesExceedReps {
                reps: self.reps,
                lapses: self.lapses,
            });
        }
        if self.state == LearningState::New && self.reps > 0 {
            return Err(ScheduleError::ReviewedNewCard(self.reps));
        }
        Ok(())
    }
}

/// Convert a fractional day count into a chrono duration.
pub fn days_to_duration(days: f64) -> Duration {
    Duration::milliseconds((days * MILLIS_PER_DAY).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap()
    }

    #[test]
    fn fresh_card_is_valid_and_due() {
        let card = CardState::new(at(1));
        assert!(card.validate().is_ok());
        assert!(card.is_new());
        assert!(card.is_due(at(1)));
        assert!(card.stability > 0.0);
    }

    #[test]
    fn elapsed_days_never_negative() {
        let mut card = CardState::new(at(1));
        card.last_review = Some(at(5));
        assert_eq!(card.days_since_review(at(3)), 0.0);
        assert!((card.days_since_review(at(7)) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_state() {
        let mut card = CardState::new(at(1));
        card.stability = 0.0;
        assert!(matches!(
            card.validate(),
            Err(ScheduleError::NonPositiveStability(_))
        ));

        let mut card = CardState::new(at(1));
        card.difficulty = 11.0;
        assert!(matches!(
            card.validate(),
            Err(ScheduleError::DifficultyOutOfRange(_))
        ));

        let mut card = CardState::new(at(1));
        card.state = LearningState::Review;
        card.reps = 1;
        card.lapses = 2;
        assert!(matches!(
            card.validate(),
            Err(ScheduleError::LapsesExceedReps { .. })
        ));

        let mut card = CardState::new(at(1));
        card.stability = f64::NAN;
        assert!(matches!(card.validate(), Err(ScheduleError::NonFinite { .. })));
    }

    #[test]
    fn missing_field_fails_to_deserialize() {
        let json = r#"{"due":"2025-03-01T09:00:00Z","stability":2.0,"difficulty":5.0,
            "elapsed_days":0.0,"scheduled_days":0.0,"learning_steps":0,"reps":0,"state":"New"}"#;
        let err = serde_json::from_str::<CardState>(json).unwrap_err();
        assert!(err.to_string().contains("lapses"));
    }

    #[test]
    fn grade_parsing() {
        assert_eq!("Success".parse::<Grade>().unwrap(), Grade::Success);
        assert_eq!(" fail ".parse::<Grade>().unwrap(), Grade::Fail);
        assert!(matches!(
            "hard".parse::<Grade>(),
            Err(ScheduleError::InvalidGrade(_))
        ));
        assert_eq!(Grade::from_key('y'), Some(Grade::Success));
        assert_eq!(Grade::from_key('x'), None);
    }
}
