//! Journey Tests
//!
//! Complete review workflows against a real SQLite repository:
//! - A sitting from first prompt to finished session
//! - Misses folding into a single penalised commit
//! - Due ordering, burned items and target retention
//! - Durability across reopen

mod miss_penalty;
mod persistence;
mod review_session;
mod scheduling;
