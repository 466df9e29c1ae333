//! # Kioku Core
//!
//! Spaced-repetition review engine with a "Drill then Commit" session policy:
//!
//! - **Memory Model**: Pure function from (state, rating, misses, target retention, now)
//!   to the next stability, difficulty, stage and interval
//! - **Retrievability**: Exponential forgetting curve, R = 0.9^(t/S)
//! - **Miss Penalty**: Every wrong answer in a sitting folds into one commit,
//!   `intensity = min(log2(misses + 1), 3)` shrinks stability and raises difficulty
//! - **Review Queue**: Missed items go to the back and come round again
//! - **Session Controller**: One durable state update per item per sitting,
//!   written only after the first correct answer
//! - **Storage**: SQLite-backed repository with an attempt log (feature `sqlite`)
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::{TimeZone, Utc};
//! use kioku_core::prelude::*;
//!
//! let repo = Arc::new(InMemoryRepository::new());
//! repo.insert_state(LearningState::new("learner", "ku-water", Facet::Meaning));
//!
//! let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
//! let clock = Arc::new(ManualClock::new(start));
//! let mut controller = SessionController::new(repo.clone(), repo.clone(), clock);
//!
//! controller.start_session("learner", None)?;
//! controller.submit_answer(Rating::Again)?; // requeued, nothing committed
//! controller.submit_answer(Rating::Pass)?; // one commit, penalised by the miss
//! assert!(controller.is_finished());
//!
//! let state = repo.get_state("learner", "ku-water", &Facet::Meaning).unwrap();
//! assert!(state.next_review.is_some());
//! # Ok::<(), kioku_core::SessionError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): SQLite storage with a bundled libsqlite3
//! - `encryption`: SQLCipher storage keyed by `KIOKU_ENCRYPTION_KEY`
//! - `sqlite`: storage against a system SQLite

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod clock;
pub mod memory;
pub mod scheduler;
pub mod session;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use clock::{Clock, ManualClock, SystemClock};

pub use memory::{
    render, Facet, KnowledgeUnitDetails, LearningState, ParseError, Question, Rating, Stage,
};

pub use scheduler::{
    clamp_retention, elapsed_days, retrievability, MemoryModel, ModelParameters, PreviewResults,
    RetrievabilityEstimator, ReviewResult, BURN_THRESHOLD_DAYS, DEFAULT_RETENTION, MAX_DIFFICULTY,
    MAX_RETENTION, MAX_STABILITY, MIN_DIFFICULTY, MIN_RETENTION, MIN_STABILITY,
};

pub use session::{
    AttemptOutcome, AttemptRecord, CommitRecord, Configuration, InMemoryRepository, RepositoryError,
    RepositoryResult, ReviewQueue, ReviewRepository, ReviewSession, SessionController, SessionError,
    SessionItem, SessionProgress, SessionStatus, StaticConfiguration,
};

#[cfg(feature = "sqlite")]
pub use storage::{ReviewStats, SqliteRepository, StorageError};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Clock, Configuration, Facet, InMemoryRepository, LearningState, ManualClock, MemoryModel,
        Rating, RepositoryError, ReviewRepository, SessionController, SessionError, Stage,
        StaticConfiguration, SystemClock,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::{SqliteRepository, StorageError};
}
