//! Storage Module
//!
//! SQLite-based storage layer with:
//! - Learning state rows keyed by (user, knowledge unit, facet)
//! - Review sessions with a per-session attempt log
//! - Knowledge unit content and per-user settings
//! - Versioned schema migrations

mod migrations;
mod sqlite;

pub use migrations::MIGRATIONS;
pub use sqlite::{Result, ReviewStats, SqliteRepository, StorageError};
