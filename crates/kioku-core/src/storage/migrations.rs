//! Database Migrations
//!
//! Schema migration definitions for the review store.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: learning states, knowledge units, review sessions",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Attempt log and per-user settings",
        up: MIGRATION_V2_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

-- One row per (user, knowledge unit, facet)
CREATE TABLE IF NOT EXISTS learning_states (
    user_id TEXT NOT NULL,
    ku_id TEXT NOT NULL,
    facet TEXT NOT NULL,
    stage TEXT NOT NULL DEFAULT 'new',
    stability REAL NOT NULL DEFAULT 1.0,
    difficulty REAL NOT NULL DEFAULT 5.0,
    reps INTEGER NOT NULL DEFAULT 0,
    lapses INTEGER NOT NULL DEFAULT 0,
    next_review TEXT,
    last_review TEXT,
    last_rating TEXT,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, ku_id, facet)
);

CREATE INDEX IF NOT EXISTS idx_states_due ON learning_states(user_id, stage, next_review);

CREATE TABLE IF NOT EXISTS knowledge_units (
    id TEXT PRIMARY KEY,
    subject TEXT NOT NULL,
    meanings TEXT NOT NULL DEFAULT '[]',
    readings TEXT NOT NULL DEFAULT '[]',
    cloze TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS review_sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    total_items INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_sessions_user ON review_sessions(user_id, status);

-- Latest attempt per session item
CREATE TABLE IF NOT EXISTS review_session_items (
    session_id TEXT NOT NULL REFERENCES review_sessions(id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    item_id TEXT NOT NULL,
    ku_id TEXT NOT NULL,
    facet TEXT NOT NULL,
    outcome TEXT,
    rating TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    answered_at TEXT,
    PRIMARY KEY (session_id, ordinal)
);

INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: Attempt log and settings
const MIGRATION_V2_UP: &str = r#"
-- Every answer, misses included
CREATE TABLE IF NOT EXISTS review_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES review_sessions(id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    ku_id TEXT NOT NULL,
    facet TEXT NOT NULL,
    outcome TEXT NOT NULL,
    rating TEXT NOT NULL,
    attempt_number INTEGER NOT NULL,
    answered_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_attempts_session ON review_attempts(session_id, id);

CREATE TABLE IF NOT EXISTS user_settings (
    user_id TEXT PRIMARY KEY,
    target_retention REAL NOT NULL DEFAULT 0.9,
    updated_at TEXT NOT NULL
);

INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (2, datetime('now'));
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
