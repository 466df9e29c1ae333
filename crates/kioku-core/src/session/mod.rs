//! Review Session Module
//!
//! Implements "Drill then Commit" review sittings:
//! - A miss only requeues the item, long-term state is untouched
//! - The first correct answer commits exactly one schedule update,
//!   penalised by every miss on that item in the sitting
//! - Repository seam for due items, commits and the attempt log

mod controller;
mod in_memory;
mod queue;
mod repository;

pub use controller::{CommitRecord, SessionController};
pub use in_memory::InMemoryRepository;
pub use queue::ReviewQueue;
pub use repository::{
    AttemptOutcome, AttemptRecord, Configuration, RepositoryError, RepositoryResult, ReviewRepository,
    StaticConfiguration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::memory::{Facet, LearningState};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Session error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Operation not allowed in the current session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),
    /// Persistence failed; nothing in memory was advanced
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Session result type
pub type Result<T> = std::result::Result<T, SessionError>;

// ============================================================================
// SESSION ITEM
// ============================================================================

/// A learning state wrapped for the duration of one sitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItem {
    pub id: String,
    pub ku_id: String,
    pub facet: Facet,
    /// Snapshot as of session start
    pub state: LearningState,
    /// Misses on this item in this sitting
    pub wrong_count: u32,
    /// Position in the initial session order
    pub ordinal: usize,
}

impl SessionItem {
    pub fn new(state: LearningState, ordinal: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ku_id: state.ku_id.clone(),
            facet: state.facet.clone(),
            state,
            wrong_count: 0,
            ordinal,
        }
    }
}

// ============================================================================
// REVIEW SESSION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Finished,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress counters of a sitting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub total_items: usize,
    /// Items answered correctly and committed
    pub committed: usize,
    /// Misses across all items
    pub incorrect_attempts: usize,
    /// Items committed without a single miss
    pub first_try_correct: usize,
}

impl SessionProgress {
    pub fn remaining(&self) -> usize {
        self.total_items.saturating_sub(self.committed)
    }

    /// Share of committed items that needed no retry
    pub fn accuracy(&self) -> f64 {
        if self.committed == 0 {
            0.0
        } else {
            self.first_try_correct as f64 / self.committed as f64
        }
    }
}

/// One review sitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSession {
    pub id: String,
    pub user_id: String,
    pub status: SessionStatus,
    /// Session item ids in initial order
    pub item_ids: Vec<String>,
    pub progress: SessionProgress,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
