//! End-to-end test support for Kioku
//!
//! - `harness`: isolated SQLite databases with a controllable clock
//! - `mocks`: test data factory for learning states and knowledge units

pub mod harness;
pub mod mocks;

pub use harness::TestDatabaseManager;
pub use mocks::TestDataFactory;
