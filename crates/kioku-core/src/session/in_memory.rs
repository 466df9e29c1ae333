//! In-memory repository
//!
//! Keeps learning states, sessions and the attempt log in process memory.
//! Useful for embedding the engine without a database and for tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    AttemptRecord, Configuration, RepositoryError, RepositoryResult, ReviewRepository, SessionItem, SessionStatus,
};
use crate::memory::{Facet, LearningState, Rating};
use crate::scheduler::DEFAULT_RETENTION;

type StateKey = (String, String, Facet);

#[derive(Debug, Clone)]
struct SessionRow {
    user_id: String,
    status: SessionStatus,
    items: Vec<SessionItem>,
}

#[derive(Debug, Default)]
struct Inner {
    states: HashMap<StateKey, LearningState>,
    sessions: HashMap<String, SessionRow>,
    attempts: Vec<AttemptRecord>,
    commits: Vec<(LearningState, Rating)>,
    retention: HashMap<String, f64>,
}

/// Thread-safe in-memory implementation of the repository traits
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    inner: Mutex<Inner>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic in another holder cannot leave Inner half-written
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn key(user_id: &str, ku_id: &str, facet: &Facet) -> StateKey {
        (user_id.to_string(), ku_id.to_string(), facet.clone())
    }

    /// Insert or replace a learning state
    pub fn insert_state(&self, state: LearningState) {
        let key = Self::key(&state.user_id, &state.ku_id, &state.facet);
        self.lock().states.insert(key, state);
    }

    pub fn get_state(&self, user_id: &str, ku_id: &str, facet: &Facet) -> Option<LearningState> {
        self.lock().states.get(&Self::key(user_id, ku_id, facet)).cloned()
    }

    pub fn set_target_retention(&self, user_id: &str, target_retention: f64) {
        self.lock().retention.insert(user_id.to_string(), target_retention);
    }

    /// Every committed state, in commit order
    pub fn commits(&self) -> Vec<(LearningState, Rating)> {
        self.lock().commits.clone()
    }

    /// Every logged attempt, in order
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.lock().attempts.clone()
    }

    pub fn is_session_finished(&self, session_id: &str) -> bool {
        self.lock()
            .sessions
            .get(session_id)
            .map(|s| s.status == SessionStatus::Finished)
            .unwrap_or(false)
    }

    /// Items registered for a session
    pub fn session_items(&self, session_id: &str) -> Vec<SessionItem> {
        self.lock()
            .sessions
            .get(session_id)
            .map(|s| s.items.clone())
            .unwrap_or_default()
    }
}

impl ReviewRepository for InMemoryRepository {
    fn fetch_due_items(&self, user_id: &str, now: DateTime<Utc>) -> RepositoryResult<Vec<LearningState>> {
        let mut due: Vec<LearningState> = self
            .lock()
            .states
            .values()
            .filter(|s| s.user_id == user_id && s.is_due_at(now))
            .cloned()
            .collect();
        // Never-scheduled first, then most overdue
        due.sort_by(|a, b| {
            a.next_review
                .cmp(&b.next_review)
                .then_with(|| a.ku_id.cmp(&b.ku_id))
                .then_with(|| a.facet.as_str().cmp(b.facet.as_str()))
        });
        Ok(due)
    }

    fn update_user_state(
        &self,
        user_id: &str,
        ku_id: &str,
        facet: &Facet,
        new_state: &LearningState,
        rating: Rating,
    ) -> RepositoryResult<()> {
        let mut inner = self.lock();
        inner
            .states
            .insert(Self::key(user_id, ku_id, facet), new_state.clone());
        inner.commits.push((new_state.clone(), rating));
        Ok(())
    }

    fn update_review_session_item(&self, attempt: &AttemptRecord) -> RepositoryResult<()> {
        let mut inner = self.lock();
        if !inner.sessions.contains_key(&attempt.session_id) {
            return Err(RepositoryError::NotFound(format!("session {}", attempt.session_id)));
        }
        inner.attempts.push(attempt.clone());
        Ok(())
    }

    fn create_review_session(&self, user_id: &str, _items: &[LearningState]) -> RepositoryResult<String> {
        let id = Uuid::new_v4().to_string();
        self.lock().sessions.insert(
            id.clone(),
            SessionRow {
                user_id: user_id.to_string(),
                status: SessionStatus::Active,
                items: Vec::new(),
            },
        );
        Ok(id)
    }

    fn create_review_session_items(&self, session_id: &str, items: &[SessionItem]) -> RepositoryResult<()> {
        let mut inner = self.lock();
        let row = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("session {}", session_id)))?;
        row.items.extend_from_slice(items);
        Ok(())
    }

    fn finish_review_session(&self, session_id: &str) -> RepositoryResult<()> {
        let mut inner = self.lock();
        let row = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("session {}", session_id)))?;
        row.status = SessionStatus::Finished;
        tracing::debug!(session_id, user_id = %row.user_id, "Session marked finished");
        Ok(())
    }
}

impl Configuration for InMemoryRepository {
    fn target_retention(&self, user_id: &str) -> f64 {
        self.lock()
            .retention
            .get(user_id)
            .copied()
            .unwrap_or(DEFAULT_RETENTION)
    }
}
