//! Memory module - Core types and data structures
//!
//! Implements the learner-facing data model with:
//! - Learning states keyed by (user, knowledge unit, facet)
//! - Stage lifecycle and answer ratings
//! - Pure question rendering from a state and its content

mod question;
mod state;

pub use question::{render, KnowledgeUnitDetails, Question};
pub use state::{Facet, LearningState, Rating, Stage};

/// Errors raised when parsing model values from text
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Rating outside the accepted vocabulary
    #[error("Invalid rating: {0}")]
    InvalidRating(String),
    /// Unknown stage name
    #[error("Invalid stage: {0}")]
    InvalidStage(String),
    /// Empty facet name
    #[error("Invalid facet: {0:?}")]
    InvalidFacet(String),
}
