//! Vocaboost - vocabulary spaced repetition
//!
//! Words are grouped into study sets inside a per-user course. Each word
//! carries a [`CardState`] that a [`Scheduler`] advances after every review,
//! and generated [`Exercise`]s that sessions draw from.
//!
//! ```text
//! Workspace ── CourseStore (json | sqlite | memory)
//!    │
//!    ├── practice queue ── ReviewSession / WordSession ── Scheduler
//!    └── ContentGenerator (pending → ready | rolled back)
//! ```

pub mod card;
pub mod cli;
pub mod config;
pub mod content;
pub mod models;
pub mod queue;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod workspace;

pub use card::{CardState, Grade, LearningState};
pub use config::Config;
pub use content::{ContentGenerator, GenerationError, GenerationRequest, OfflineGenerator};
pub use models::{Course, Example, Exercise, ExerciseKind, Language, StudySet, Word, WordContent};
pub use queue::{build_limited_queue, build_practice_queue};
pub use scheduler::{
    format_interval, Algorithm, FsrsParameters, FsrsScheduler, IntervalPreview,
    MultiplicativeScheduler, ScheduleError, Scheduler,
};
pub use session::{
    GradeRecord, ReviewSession, SessionError, SessionPhase, SessionSummary, WordSession, WordStep,
};
pub use storage::{CourseStore, JsonFileStore, MemoryStore, SqliteStore, StoreError, UserKey};
pub use workspace::{AddWord, GenerationOutcome, Workspace, WorkspaceError};
