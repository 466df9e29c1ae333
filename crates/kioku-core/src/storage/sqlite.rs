//! SQLite Storage Implementation
//!
//! Durable backing store for learning states, knowledge units, review
//! sessions and the attempt log. Implements the session repository seam.

use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::memory::{Facet, KnowledgeUnitDetails, LearningState, Rating, Stage};
use crate::scheduler::{clamp_retention, RetrievabilityEstimator, DEFAULT_RETENTION};
use crate::session::{
    AttemptOutcome, AttemptRecord, Configuration, RepositoryError, RepositoryResult, ReviewRepository,
    SessionItem, SessionStatus,
};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for RepositoryError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(what) => RepositoryError::NotFound(what),
            other => RepositoryError::backend(other),
        }
    }
}

/// Per-user overview of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_items: usize,
    pub new_items: usize,
    pub learning_items: usize,
    pub review_items: usize,
    pub relearning_items: usize,
    pub burned_items: usize,
    pub due_now: usize,
    pub average_stability: f64,
    /// Mean estimated recall probability over reviewed, non-burned items
    pub average_retrievability: f64,
    pub finished_sessions: usize,
    pub total_attempts: usize,
    pub correct_attempts: usize,
}

// ============================================================================
// STORAGE
// ============================================================================

/// SQLite-backed review repository
///
/// Uses separate reader/writer connections so every method takes `&self`
/// and the repository can be shared as `Arc<SqliteRepository>`.
/// Stored timestamps come from the repository's [`Clock`], the wall clock
/// unless replaced with [`Self::with_clock`].
pub struct SqliteRepository {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    estimator: RetrievabilityEstimator,
    clock: Arc<dyn Clock>,
}

impl SqliteRepository {
    /// Apply PRAGMAs and optional encryption to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        #[cfg(feature = "encryption")]
        {
            if let Ok(key) = std::env::var("KIOKU_ENCRYPTION_KEY") {
                if !key.is_empty() {
                    conn.pragma_update(None, "key", &key)?;
                }
            }
        }

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -16000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(())
    }

    /// Default database location under the platform data directory
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "kioku", "core").ok_or_else(|| {
            StorageError::Init("Could not determine project directories".to_string())
        })?;
        Ok(proj_dirs.data_dir().join("kioku.db"))
    }

    /// Open (and migrate) the store at `db_path`, or at [`Self::default_path`]
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => Self::default_path()?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
                }
            }
        }

        let writer_conn = Connection::open(&path)?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600));
        }

        Self::configure_connection(&writer_conn)?;
        let applied = super::migrations::apply_migrations(&writer_conn)?;
        if applied > 0 {
            tracing::info!(path = %path.display(), applied, "Database migrated");
        }

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            estimator: RetrievabilityEstimator,
            clock: Arc::new(SystemClock),
        })
    }

    /// Stamp rows with `clock` instead of the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))
    }

    fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))
    }

    /// Fixed-width UTC timestamps so text comparison matches time order
    fn format_timestamp(time: DateTime<Utc>) -> String {
        time.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Self::conversion_error(format!("Invalid {} timestamp '{}': {}", field_name, value, e)))
    }

    fn parse_optional_timestamp(value: Option<String>, field_name: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
        value.map(|s| Self::parse_timestamp(&s, field_name)).transpose()
    }

    fn conversion_error(message: String) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
        )
    }

    /// Convert a row to LearningState
    fn row_to_state(row: &rusqlite::Row) -> rusqlite::Result<LearningState> {
        let facet: String = row.get("facet")?;
        let stage: String = row.get("stage")?;
        let next_review: Option<String> = row.get("next_review")?;
        let last_review: Option<String> = row.get("last_review")?;

        Ok(LearningState {
            user_id: row.get("user_id")?,
            ku_id: row.get("ku_id")?,
            facet: facet.parse().map_err(|e| Self::conversion_error(format!("{}", e)))?,
            stage: stage.parse().map_err(|e| Self::conversion_error(format!("{}", e)))?,
            stability: row.get("stability")?,
            difficulty: row.get("difficulty")?,
            reps: row.get("reps")?,
            lapses: row.get("lapses")?,
            next_review: Self::parse_optional_timestamp(next_review, "next_review")?,
            last_review: Self::parse_optional_timestamp(last_review, "last_review")?,
        })
    }

    fn row_to_attempt(row: &rusqlite::Row) -> rusqlite::Result<AttemptRecord> {
        let facet: String = row.get("facet")?;
        let outcome: String = row.get("outcome")?;
        let rating: String = row.get("rating")?;
        let answered_at: String = row.get("answered_at")?;
        let ordinal: i64 = row.get("ordinal")?;
        let ordinal = usize::try_from(ordinal)
            .map_err(|_| Self::conversion_error(format!("Invalid ordinal {}", ordinal)))?;

        let outcome = match outcome.as_str() {
            "correct" => AttemptOutcome::Correct,
            "incorrect" => AttemptOutcome::Incorrect,
            other => return Err(Self::conversion_error(format!("Invalid outcome '{}'", other))),
        };

        Ok(AttemptRecord {
            session_id: row.get("session_id")?,
            ku_id: row.get("ku_id")?,
            facet: facet.parse().map_err(|e| Self::conversion_error(format!("{}", e)))?,
            outcome,
            rating: rating.parse().map_err(|e| Self::conversion_error(format!("{}", e)))?,
            attempt_number: row.get("attempt_number")?,
            ordinal,
            answered_at: Self::parse_timestamp(&answered_at, "answered_at")?,
        })
    }

    fn write_state(
        conn: &Connection,
        state: &LearningState,
        rating: Option<Rating>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO learning_states (
                user_id, ku_id, facet, stage, stability, difficulty, reps, lapses,
                next_review, last_review, last_rating, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(user_id, ku_id, facet) DO UPDATE SET
                stage = excluded.stage,
                stability = excluded.stability,
                difficulty = excluded.difficulty,
                reps = excluded.reps,
                lapses = excluded.lapses,
                next_review = excluded.next_review,
                last_review = excluded.last_review,
                last_rating = COALESCE(excluded.last_rating, learning_states.last_rating),
                updated_at = excluded.updated_at",
            params![
                state.user_id,
                state.ku_id,
                state.facet.as_str(),
                state.stage.as_str(),
                state.stability,
                state.difficulty,
                state.reps,
                state.lapses,
                state.next_review.map(Self::format_timestamp),
                state.last_review.map(Self::format_timestamp),
                rating.map(|r| r.as_str()),
                Self::format_timestamp(updated_at),
            ],
        )?;
        Ok(())
    }

    // ========================================================================
    // LEARNING STATES
    // ========================================================================

    /// Insert or replace a learning state
    pub fn upsert_state(&self, state: &LearningState) -> Result<()> {
        let writer = self.writer()?;
        Self::write_state(&writer, state, None, self.clock.now())
    }

    pub fn get_state(&self, user_id: &str, ku_id: &str, facet: &Facet) -> Result<Option<LearningState>> {
        let reader = self.reader()?;
        let state = reader
            .query_row(
                "SELECT * FROM learning_states WHERE user_id = ?1 AND ku_id = ?2 AND facet = ?3",
                params![user_id, ku_id, facet.as_str()],
                Self::row_to_state,
            )
            .optional()?;
        Ok(state)
    }

    /// Every state of a user, burned included
    pub fn list_states(&self, user_id: &str) -> Result<Vec<LearningState>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT * FROM learning_states WHERE user_id = ?1 ORDER BY ku_id, facet",
        )?;
        let states = stmt
            .query_map(params![user_id], Self::row_to_state)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(states)
    }

    /// Due, non-burned states; never-scheduled first, then most overdue
    pub fn due_states(&self, user_id: &str, now: DateTime<Utc>, limit: Option<usize>) -> Result<Vec<LearningState>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT * FROM learning_states
             WHERE user_id = ?1
               AND stage != 'burned'
               AND (next_review IS NULL OR next_review <= ?2)
             ORDER BY next_review IS NOT NULL, next_review ASC, ku_id, facet
             LIMIT ?3",
        )?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let states = stmt
            .query_map(params![user_id, Self::format_timestamp(now), limit], Self::row_to_state)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(states)
    }

    // ========================================================================
    // KNOWLEDGE UNITS
    // ========================================================================

    pub fn upsert_knowledge_unit(&self, unit: &KnowledgeUnitDetails) -> Result<()> {
        let meanings = serde_json::to_string(&unit.meanings).unwrap_or_else(|_| "[]".to_string());
        let readings = serde_json::to_string(&unit.readings).unwrap_or_else(|_| "[]".to_string());
        let now = Self::format_timestamp(self.clock.now());

        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO knowledge_units (id, subject, meanings, readings, cloze, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(id) DO UPDATE SET
                subject = excluded.subject,
                meanings = excluded.meanings,
                readings = excluded.readings,
                cloze = excluded.cloze,
                updated_at = excluded.updated_at",
            params![unit.ku_id, unit.subject, meanings, readings, unit.cloze, now],
        )?;
        Ok(())
    }

    pub fn get_knowledge_unit(&self, ku_id: &str) -> Result<Option<KnowledgeUnitDetails>> {
        let reader = self.reader()?;
        let unit = reader
            .query_row(
                "SELECT id, subject, meanings, readings, cloze FROM knowledge_units WHERE id = ?1",
                params![ku_id],
                |row| {
                    let meanings: String = row.get("meanings")?;
                    let readings: String = row.get("readings")?;
                    Ok(KnowledgeUnitDetails {
                        ku_id: row.get("id")?,
                        subject: row.get("subject")?,
                        meanings: serde_json::from_str(&meanings).unwrap_or_default(),
                        readings: serde_json::from_str(&readings).unwrap_or_default(),
                        cloze: row.get("cloze")?,
                    })
                },
            )
            .optional()?;
        Ok(unit)
    }

    // ========================================================================
    // SETTINGS
    // ========================================================================

    /// Store a user's target retention, clamped to the supported range
    pub fn set_target_retention(&self, user_id: &str, target_retention: f64) -> Result<f64> {
        let clamped = clamp_retention(target_retention);
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO user_settings (user_id, target_retention, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                target_retention = excluded.target_retention,
                updated_at = excluded.updated_at",
            params![user_id, clamped, Self::format_timestamp(self.clock.now())],
        )?;
        Ok(clamped)
    }

    pub fn get_target_retention(&self, user_id: &str) -> Result<Option<f64>> {
        let reader = self.reader()?;
        let value = reader
            .query_row(
                "SELECT target_retention FROM user_settings WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    // ========================================================================
    // SESSIONS
    // ========================================================================

    pub fn session_status(&self, session_id: &str) -> Result<Option<SessionStatus>> {
        let reader = self.reader()?;
        let status: Option<String> = reader
            .query_row(
                "SELECT status FROM review_sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.map(|s| match s.as_str() {
            "finished" => SessionStatus::Finished,
            _ => SessionStatus::Active,
        }))
    }

    /// Attempt log of a session in answer order
    pub fn get_attempts(&self, session_id: &str) -> Result<Vec<AttemptRecord>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT * FROM review_attempts WHERE session_id = ?1 ORDER BY id",
        )?;
        let attempts = stmt
            .query_map(params![session_id], Self::row_to_attempt)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attempts)
    }

    pub fn get_stats(&self, user_id: &str, now: DateTime<Utc>) -> Result<ReviewStats> {
        let states = self.list_states(user_id)?;
        let mut stats = ReviewStats {
            total_items: states.len(),
            ..ReviewStats::default()
        };

        let mut stability_sum = 0.0;
        let mut recall_sum = 0.0;
        let mut recall_count = 0usize;
        for state in &states {
            match state.stage {
                Stage::New => stats.new_items += 1,
                Stage::Learning => stats.learning_items += 1,
                Stage::Review => stats.review_items += 1,
                Stage::Relearning => stats.relearning_items += 1,
                Stage::Burned => stats.burned_items += 1,
            }
            if state.is_due_at(now) {
                stats.due_now += 1;
            }
            stability_sum += state.stability;
            if state.last_review.is_some() && !state.stage.is_terminal() {
                recall_sum += self.estimator.estimate(state, now);
                recall_count += 1;
            }
        }
        if !states.is_empty() {
            stats.average_stability = stability_sum / states.len() as f64;
        }
        if recall_count > 0 {
            stats.average_retrievability = recall_sum / recall_count as f64;
        }

        let reader = self.reader()?;
        let finished: i64 = reader.query_row(
            "SELECT COUNT(*) FROM review_sessions WHERE user_id = ?1 AND status = 'finished'",
            params![user_id],
            |row| row.get(0),
        )?;
        let (attempts, correct): (i64, i64) = reader.query_row(
            "SELECT COUNT(*), COALESCE(SUM(a.outcome = 'correct'), 0)
             FROM review_attempts a JOIN review_sessions s ON s.id = a.session_id
             WHERE s.user_id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        stats.finished_sessions = finished as usize;
        stats.total_attempts = attempts as usize;
        stats.correct_attempts = correct as usize;

        Ok(stats)
    }

    fn record_attempt(&self, attempt: &AttemptRecord) -> Result<()> {
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        let answered_at = Self::format_timestamp(attempt.answered_at);

        let updated = tx.execute(
            "UPDATE review_session_items
             SET outcome = ?3, rating = ?4, attempts = ?5, answered_at = ?6
             WHERE session_id = ?1 AND ordinal = ?2",
            params![
                attempt.session_id,
                attempt.ordinal as i64,
                attempt.outcome.as_str(),
                attempt.rating.as_str(),
                attempt.attempt_number,
                answered_at,
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!(
                "session item {}#{}",
                attempt.session_id, attempt.ordinal
            )));
        }

        tx.execute(
            "INSERT INTO review_attempts (
                session_id, ordinal, ku_id, facet, outcome, rating, attempt_number, answered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                attempt.session_id,
                attempt.ordinal as i64,
                attempt.ku_id,
                attempt.facet.as_str(),
                attempt.outcome.as_str(),
                attempt.rating.as_str(),
                attempt.attempt_number,
                answered_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn insert_session(&self, user_id: &str, total_items: usize) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO review_sessions (id, user_id, status, total_items, started_at)
             VALUES (?1, ?2, 'active', ?3, ?4)",
            params![id, user_id, total_items as i64, Self::format_timestamp(self.clock.now())],
        )?;
        Ok(id)
    }

    fn insert_session_items(&self, session_id: &str, items: &[SessionItem]) -> Result<()> {
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO review_session_items (session_id, ordinal, item_id, ku_id, facet)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for item in items {
                stmt.execute(params![
                    session_id,
                    item.ordinal as i64,
                    item.id,
                    item.ku_id,
                    item.facet.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn mark_finished(&self, session_id: &str) -> Result<()> {
        let writer = self.writer()?;
        let updated = writer.execute(
            "UPDATE review_sessions SET status = 'finished', finished_at = ?2 WHERE id = ?1",
            params![session_id, Self::format_timestamp(self.clock.now())],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("session {}", session_id)));
        }
        Ok(())
    }
}

impl ReviewRepository for SqliteRepository {
    fn fetch_due_items(&self, user_id: &str, now: DateTime<Utc>) -> RepositoryResult<Vec<LearningState>> {
        Ok(self.due_states(user_id, now, None)?)
    }

    fn update_user_state(
        &self,
        user_id: &str,
        ku_id: &str,
        facet: &Facet,
        new_state: &LearningState,
        rating: Rating,
    ) -> RepositoryResult<()> {
        if !new_state.same_item(ku_id, facet) || new_state.user_id != user_id {
            return Err(RepositoryError::NotFound(format!(
                "state {}/{}/{} does not match key",
                user_id, ku_id, facet
            )));
        }
        let writer = self.writer()?;
        Self::write_state(&writer, new_state, Some(rating), self.clock.now())?;
        Ok(())
    }

    fn update_review_session_item(&self, attempt: &AttemptRecord) -> RepositoryResult<()> {
        Ok(self.record_attempt(attempt)?)
    }

    fn create_review_session(&self, user_id: &str, items: &[LearningState]) -> RepositoryResult<String> {
        Ok(self.insert_session(user_id, items.len())?)
    }

    fn create_review_session_items(&self, session_id: &str, items: &[SessionItem]) -> RepositoryResult<()> {
        Ok(self.insert_session_items(session_id, items)?)
    }

    fn finish_review_session(&self, session_id: &str) -> RepositoryResult<()> {
        Ok(self.mark_finished(session_id)?)
    }
}

impl Configuration for SqliteRepository {
    fn target_retention(&self, user_id: &str) -> f64 {
        match self.get_target_retention(user_id) {
            Ok(Some(value)) => value,
            Ok(None) => DEFAULT_RETENTION,
            Err(e) => {
                tracing::warn!("Failed to read target retention for {}: {}", user_id, e);
                DEFAULT_RETENTION
            }
        }
    }
}
