//! Learning State - The scheduling record of one facet of one knowledge unit
//!
//! Each state tracks:
//! - Lifecycle stage (new → learning → review → burned)
//! - Memory stability and intrinsic difficulty
//! - Committed review and lapse counters
//! - Review timestamps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParseError;

// ============================================================================
// STAGE
// ============================================================================

/// Coarse lifecycle phase of a learning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Never reviewed
    #[default]
    New,
    /// Failed on first contact, still being acquired
    Learning,
    /// Graduated, scheduled on the forgetting curve
    Review,
    /// Lapsed after graduating
    Relearning,
    /// Stable beyond the burn threshold; terminal
    Burned,
}

impl Stage {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::New => "new",
            Stage::Learning => "learning",
            Stage::Review => "review",
            Stage::Relearning => "relearning",
            Stage::Burned => "burned",
        }
    }

    /// Burned items are never scheduled again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Burned)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(Stage::New),
            "learning" => Ok(Stage::Learning),
            "review" => Ok(Stage::Review),
            "relearning" => Ok(Stage::Relearning),
            "burned" => Ok(Stage::Burned),
            _ => Err(ParseError::InvalidStage(s.to_string())),
        }
    }
}

// ============================================================================
// FACET
// ============================================================================

/// An independently scheduled aspect of a knowledge unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    /// What the unit means
    Meaning,
    /// How the unit is read or pronounced
    Reading,
    /// The unit used in context with a blank
    Cloze,
    /// Any other facet tracked by the content layer
    Other(String),
}

impl Facet {
    /// Facet for a name, built-in names matched case-insensitively
    ///
    /// Custom names keep their case so they read back exactly as stored.
    pub fn other(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.to_lowercase().as_str() {
            "meaning" => Facet::Meaning,
            "reading" => Facet::Reading,
            "cloze" => Facet::Cloze,
            _ => Facet::Other(name),
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        match self {
            Facet::Meaning => "meaning",
            Facet::Reading => "reading",
            Facet::Cloze => "cloze",
            Facet::Other(name) => name.as_str(),
        }
    }
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Facet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            return Err(ParseError::InvalidFacet(s.to_string()));
        }
        Ok(Facet::other(name))
    }
}

// ============================================================================
// RATING
// ============================================================================

/// Outcome of a single answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Failed to recall
    Again,
    /// Recalled correctly
    Pass,
}

impl Rating {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Pass => "pass",
        }
    }

    /// Map a numeric button (1 = again, 2..=4 = pass) to a rating
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Rating::Again),
            2..=4 => Some(Rating::Pass),
            _ => None,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Rating::Pass)
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Rating {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(value) = trimmed.parse::<i32>() {
            return Rating::from_i32(value).ok_or_else(|| ParseError::InvalidRating(s.to_string()));
        }
        match trimmed.to_lowercase().as_str() {
            "again" | "fail" | "wrong" => Ok(Rating::Again),
            "pass" | "good" | "correct" => Ok(Rating::Pass),
            _ => Err(ParseError::InvalidRating(s.to_string())),
        }
    }
}

// ============================================================================
// LEARNING STATE
// ============================================================================

/// Scheduling record for one (user, knowledge unit, facet) tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningState {
    /// Owner of the record
    pub user_id: String,
    /// Knowledge unit this record schedules
    pub ku_id: String,
    /// Which aspect of the unit is scheduled
    pub facet: Facet,
    /// Lifecycle stage
    pub stage: Stage,
    /// Days until recall probability decays to 0.9
    pub stability: f64,
    /// Intrinsic hardness (1.0 = easy, 10.0 = hard)
    pub difficulty: f64,
    /// Committed reviews since the last lapse
    pub reps: u32,
    /// Committed lapses
    pub lapses: u32,
    /// Next scheduled review (None = due now, or never for burned items)
    pub next_review: Option<DateTime<Utc>>,
    /// Last committed review
    pub last_review: Option<DateTime<Utc>>,
}

impl LearningState {
    /// Create a fresh, never-reviewed state
    pub fn new(user_id: impl Into<String>, ku_id: impl Into<String>, facet: Facet) -> Self {
        Self {
            user_id: user_id.into(),
            ku_id: ku_id.into(),
            facet,
            stage: Stage::New,
            stability: crate::scheduler::INITIAL_STABILITY,
            difficulty: crate::scheduler::INITIAL_DIFFICULTY,
            reps: 0,
            lapses: 0,
            next_review: None,
            last_review: None,
        }
    }

    /// Check if this state is due at the given time
    pub fn is_due_at(&self, time: DateTime<Utc>) -> bool {
        if self.stage.is_terminal() {
            return false;
        }
        self.next_review.map(|t| t <= time).unwrap_or(true)
    }

    /// Same (ku, facet) identity, ignoring the owner
    pub fn same_item(&self, ku_id: &str, facet: &Facet) -> bool {
        self.ku_id == ku_id && &self.facet == facet
    }
}

// ============================================================================
// TESTS
// ============================================================================
