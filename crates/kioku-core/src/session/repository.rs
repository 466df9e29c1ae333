//! Persistence seam
//!
//! The session controller reads due items and writes commits, attempts and
//! session lifecycle through [`ReviewRepository`]. Implementations own the
//! long-lived learning state rows; the controller never assumes a particular
//! database client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SessionItem;
use crate::memory::{Facet, LearningState, Rating};
use crate::scheduler::DEFAULT_RETENTION;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Repository error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Failure inside the backing store
    #[error("Backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RepositoryError {
    /// Wrap any backend error
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RepositoryError::Backend(Box::new(error))
    }
}

/// Repository result type
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

// ============================================================================
// RECORDS
// ============================================================================

/// Outcome of a single attempt within a sitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Incorrect,
    Correct,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Incorrect => "incorrect",
            AttemptOutcome::Correct => "correct",
        }
    }
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempt on a session item, written on every answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub session_id: String,
    pub ku_id: String,
    pub facet: Facet,
    pub outcome: AttemptOutcome,
    pub rating: Rating,
    /// 1-based attempt number on this item in this sitting
    pub attempt_number: u32,
    /// Position of the item in the initial session order
    pub ordinal: usize,
    pub answered_at: DateTime<Utc>,
}

// ============================================================================
// TRAITS
// ============================================================================

/// Storage collaborator of the session controller
pub trait ReviewRepository: Send + Sync {
    /// Items due for the user; ordering is the implementation's choice
    fn fetch_due_items(&self, user_id: &str, now: DateTime<Utc>) -> RepositoryResult<Vec<LearningState>>;

    /// Commit sink: persist the state computed for a correct answer
    fn update_user_state(
        &self,
        user_id: &str,
        ku_id: &str,
        facet: &Facet,
        new_state: &LearningState,
        rating: Rating,
    ) -> RepositoryResult<()>;

    /// Attempt/audit log sink, called on both misses and successes
    fn update_review_session_item(&self, attempt: &AttemptRecord) -> RepositoryResult<()>;

    /// Create the session record, returning its id
    fn create_review_session(&self, user_id: &str, items: &[LearningState]) -> RepositoryResult<String>;

    /// Create one row per session item
    fn create_review_session_items(&self, session_id: &str, items: &[SessionItem]) -> RepositoryResult<()>;

    /// Mark a session finished
    fn finish_review_session(&self, session_id: &str) -> RepositoryResult<()>;
}

/// Per-user scheduling settings
pub trait Configuration: Send + Sync {
    /// Desired probability of recall at review time, in (0, 1)
    fn target_retention(&self, _user_id: &str) -> f64 {
        DEFAULT_RETENTION
    }
}

/// Same retention for every user
#[derive(Debug, Clone, Copy)]
pub struct StaticConfiguration {
    pub target_retention: f64,
}

impl Default for StaticConfiguration {
    fn default() -> Self {
        Self {
            target_retention: DEFAULT_RETENTION,
        }
    }
}

impl Configuration for StaticConfiguration {
    fn target_retention(&self, _user_id: &str) -> f64 {
        self.target_retention
    }
}
