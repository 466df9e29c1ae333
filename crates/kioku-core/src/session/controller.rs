//! Session Controller
//!
//! Drives one review sitting over a [`ReviewQueue`]:
//!
//! 1. **Drill**: a miss increments the item's `wrong_count`, logs the attempt
//!    and sends the item to the back of the queue. The memory model is not
//!    consulted and no learning state is written.
//! 2. **Commit**: the first correct answer runs the memory model once with the
//!    accumulated `wrong_count`, persists the result, logs the attempt and
//!    removes the item.
//!
//! Every repository call happens before the in-memory queue changes, so a
//! persistence failure leaves the sitting exactly where it was. A failed
//! commit is kept as pending and must be finished with
//! [`SessionController::retry_commit`], which re-sends the state already
//! computed instead of running the model a second time.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    AttemptOutcome, AttemptRecord, Configuration, Result, ReviewQueue, ReviewRepository, ReviewSession, SessionError,
    SessionItem, SessionProgress, SessionStatus,
};
use crate::clock::Clock;
use crate::memory::{render, Facet, KnowledgeUnitDetails, LearningState, Question, Rating};
use crate::scheduler::{clamp_retention, MemoryModel, ReviewResult};

/// A schedule update written for a correct answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub item_id: String,
    pub ku_id: String,
    pub facet: Facet,
    /// Misses that penalised this commit
    pub wrong_count: u32,
    pub result: ReviewResult,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitStep {
    UserState,
    Attempt,
    Finish,
    Done,
}

#[derive(Debug, Clone)]
struct PendingCommit {
    record: CommitRecord,
    attempt: AttemptRecord,
    step: CommitStep,
}

/// Orchestrates queue, memory model and repository for one learner
pub struct SessionController {
    repository: Arc<dyn ReviewRepository>,
    configuration: Arc<dyn Configuration>,
    clock: Arc<dyn Clock>,
    model: MemoryModel,
    session: Option<ReviewSession>,
    queue: ReviewQueue,
    target_retention: f64,
    pending: Option<PendingCommit>,
    last_commit: Option<CommitRecord>,
}

impl SessionController {
    pub fn new(
        repository: Arc<dyn ReviewRepository>,
        configuration: Arc<dyn Configuration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_model(repository, configuration, clock, MemoryModel::default())
    }

    /// Create with a custom memory model
    pub fn with_model(
        repository: Arc<dyn ReviewRepository>,
        configuration: Arc<dyn Configuration>,
        clock: Arc<dyn Clock>,
        model: MemoryModel,
    ) -> Self {
        Self {
            repository,
            configuration,
            clock,
            model,
            session: None,
            queue: ReviewQueue::default(),
            target_retention: crate::scheduler::DEFAULT_RETENTION,
            pending: None,
            last_commit: None,
        }
    }

    /// Fetch the user's due items and start a sitting over them
    pub fn start_session(&mut self, user_id: &str, limit: Option<usize>) -> Result<&ReviewSession> {
        let mut due = self.repository.fetch_due_items(user_id, self.clock.now())?;
        if let Some(limit) = limit {
            due.truncate(limit);
        }
        self.init_session(user_id, due)
    }

    /// Start a sitting over `items`, in the given order
    ///
    /// Burned items, items of other users and repeated (ku, facet) pairs are
    /// skipped.
    pub fn init_session(&mut self, user_id: &str, items: Vec<LearningState>) -> Result<&ReviewSession> {
        if self.is_active() {
            return Err(SessionError::InvalidSessionState(
                "a session is already active".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut states = Vec::with_capacity(items.len());
        for state in items {
            if state.user_id != user_id {
                tracing::warn!(ku_id = %state.ku_id, owner = %state.user_id, "Skipping item owned by another user");
                continue;
            }
            if state.stage.is_terminal() {
                tracing::warn!(ku_id = %state.ku_id, facet = %state.facet, "Skipping burned item");
                continue;
            }
            if !seen.insert((state.ku_id.clone(), state.facet.clone())) {
                tracing::warn!(ku_id = %state.ku_id, facet = %state.facet, "Skipping duplicate item");
                continue;
            }
            states.push(state);
        }

        if states.is_empty() {
            return Err(SessionError::InvalidSessionState(
                "no reviewable items".to_string(),
            ));
        }

        let target_retention = clamp_retention(self.configuration.target_retention(user_id));
        let items: Vec<SessionItem> = states
            .iter()
            .cloned()
            .enumerate()
            .map(|(ordinal, state)| SessionItem::new(state, ordinal))
            .collect();

        let session_id = self.repository.create_review_session(user_id, &states)?;
        self.repository.create_review_session_items(&session_id, &items)?;

        tracing::info!(
            session_id = %session_id,
            user_id = %user_id,
            items = items.len(),
            target_retention,
            "Review session started"
        );

        let session = ReviewSession {
            id: session_id,
            user_id: user_id.to_string(),
            status: SessionStatus::Active,
            item_ids: items.iter().map(|i| i.id.clone()).collect(),
            progress: SessionProgress {
                total_items: items.len(),
                ..Default::default()
            },
            started_at: self.clock.now(),
            finished_at: None,
        };

        self.queue = ReviewQueue::new(items);
        self.target_retention = target_retention;
        self.pending = None;
        self.last_commit = None;
        Ok(self.session.insert(session))
    }

    /// Answer the current item
    ///
    /// Returns `true` when the answer committed a schedule update and `false`
    /// when the item was sent back for another try.
    pub fn submit_answer(&mut self, rating: Rating) -> Result<bool> {
        if self.pending.is_some() {
            return Err(SessionError::InvalidSessionState(
                "a commit is pending; call retry_commit first".to_string(),
            ));
        }
        let session_id = match &self.session {
            Some(s) if s.status == SessionStatus::Active => s.id.clone(),
            Some(_) => {
                return Err(SessionError::InvalidSessionState(
                    "session is finished".to_string(),
                ));
            }
            None => {
                return Err(SessionError::InvalidSessionState(
                    "no session started".to_string(),
                ));
            }
        };
        let item = self
            .queue
            .current()
            .ok_or_else(|| SessionError::InvalidSessionState("review queue is empty".to_string()))?;

        let now = self.clock.now();
        match rating {
            Rating::Again => {
                let attempt = AttemptRecord {
                    session_id,
                    ku_id: item.ku_id.clone(),
                    facet: item.facet.clone(),
                    outcome: AttemptOutcome::Incorrect,
                    rating,
                    attempt_number: item.wrong_count + 1,
                    ordinal: item.ordinal,
                    answered_at: now,
                };
                self.repository.update_review_session_item(&attempt)?;

                if let Some(item) = self.queue.current_mut() {
                    item.wrong_count += 1;
                }
                self.queue.requeue();
                if let Some(session) = self.session.as_mut() {
                    session.progress.incorrect_attempts += 1;
                }

                tracing::debug!(
                    ku_id = %attempt.ku_id,
                    facet = %attempt.facet,
                    wrong_count = attempt.attempt_number,
                    "Miss requeued"
                );
                Ok(false)
            }
            Rating::Pass => {
                let result = self
                    .model
                    .compute_next(&item.state, Rating::Pass, item.wrong_count, self.target_retention, now);
                let attempt = AttemptRecord {
                    session_id,
                    ku_id: item.ku_id.clone(),
                    facet: item.facet.clone(),
                    outcome: AttemptOutcome::Correct,
                    rating,
                    attempt_number: item.wrong_count + 1,
                    ordinal: item.ordinal,
                    answered_at: now,
                };
                let record = CommitRecord {
                    item_id: item.id.clone(),
                    ku_id: item.ku_id.clone(),
                    facet: item.facet.clone(),
                    wrong_count: item.wrong_count,
                    result,
                    committed_at: now,
                };
                self.pending = Some(PendingCommit {
                    record,
                    attempt,
                    step: CommitStep::UserState,
                });
                self.drive_pending()
            }
        }
    }

    /// Finish a commit whose persistence failed
    ///
    /// Re-sends the state computed by the original answer; the memory model
    /// is not run again.
    pub fn retry_commit(&mut self) -> Result<bool> {
        if self.pending.is_none() {
            return Err(SessionError::InvalidSessionState(
                "no pending commit".to_string(),
            ));
        }
        tracing::info!("Retrying pending commit");
        self.drive_pending()
    }

    fn drive_pending(&mut self) -> Result<bool> {
        loop {
            let Some(pending) = self.pending.as_ref() else {
                return Ok(true);
            };

            let step = pending.step;
            let next = match step {
                CommitStep::UserState => {
                    let state = &pending.record.result.state;
                    self.repository.update_user_state(
                        &state.user_id,
                        &pending.record.ku_id,
                        &pending.record.facet,
                        state,
                        Rating::Pass,
                    )?;
                    CommitStep::Attempt
                }
                CommitStep::Attempt => {
                    self.repository.update_review_session_item(&pending.attempt)?;

                    self.queue.remove();
                    let first_try = pending.record.wrong_count == 0;
                    if let Some(session) = self.session.as_mut() {
                        session.progress.committed += 1;
                        if first_try {
                            session.progress.first_try_correct += 1;
                        }
                    }
                    if self.queue.is_empty() {
                        CommitStep::Finish
                    } else {
                        CommitStep::Done
                    }
                }
                CommitStep::Finish => {
                    if let Some(session) = self.session.as_mut() {
                        self.repository.finish_review_session(&session.id)?;
                        session.status = SessionStatus::Finished;
                        session.finished_at = Some(self.clock.now());
                        tracing::info!(
                            session_id = %session.id,
                            committed = session.progress.committed,
                            misses = session.progress.incorrect_attempts,
                            "Review session finished"
                        );
                    }
                    CommitStep::Done
                }
                CommitStep::Done => {
                    if let Some(done) = self.pending.take() {
                        tracing::debug!(
                            ku_id = %done.record.ku_id,
                            facet = %done.record.facet,
                            wrong_count = done.record.wrong_count,
                            stage = %done.record.result.state.stage,
                            "Commit persisted"
                        );
                        self.last_commit = Some(done.record);
                    }
                    return Ok(true);
                }
            };

            if let Some(pending) = self.pending.as_mut() {
                pending.step = next;
            }
        }
    }

    /// Item to answer next, or None once the sitting is over
    pub fn get_next_item(&self) -> Option<&SessionItem> {
        if self.is_finished() {
            return None;
        }
        self.queue.current()
    }

    /// Render the current item's question from its content
    pub fn current_question(&self, details: &KnowledgeUnitDetails) -> Option<Question> {
        self.get_next_item().map(|item| render(&item.state, details))
    }

    /// Drop the sitting without persisting anything further
    ///
    /// Commits already written stay written.
    pub fn abandon(&mut self) -> Option<ReviewSession> {
        if self.pending.take().is_some() {
            tracing::warn!("Abandoning session with an unfinished commit");
        }
        self.queue = ReviewQueue::default();
        let session = self.session.take();
        if let Some(s) = &session {
            tracing::info!(session_id = %s.id, remaining = s.progress.remaining(), "Review session abandoned");
        }
        session
    }

    pub fn session(&self) -> Option<&ReviewSession> {
        self.session.as_ref()
    }

    pub fn progress(&self) -> Option<SessionProgress> {
        self.session.as_ref().map(|s| s.progress)
    }

    pub fn queue(&self) -> &ReviewQueue {
        &self.queue
    }

    pub fn last_commit(&self) -> Option<&CommitRecord> {
        self.last_commit.as_ref()
    }

    pub fn has_pending_commit(&self) -> bool {
        self.pending.is_some()
    }

    pub fn target_retention(&self) -> f64 {
        self.target_retention
    }

    pub fn is_active(&self) -> bool {
        matches!(&self.session, Some(s) if s.status == SessionStatus::Active)
    }

    pub fn is_finished(&self) -> bool {
        matches!(&self.session, Some(s) if s.status == SessionStatus::Finished)
    }
}

// ============================================================================
// TESTS
// ============================================================================
