//! Test Data Factory
//!
//! Builds learning states and knowledge units for test scenarios:
//! - States at any stage with explicit stability/difficulty
//! - A small vocabulary deck with meanings and readings
//! - Pre-built scenarios for scheduling tests

use chrono::{DateTime, Duration, Utc};
use kioku_core::{Facet, KnowledgeUnitDetails, LearningState, SqliteRepository, Stage};
use uuid::Uuid;

/// Factory for creating test data
pub struct TestDataFactory;

/// Items seeded for a scheduling scenario
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub user_id: String,
    /// Items expected in the next session, in due order
    pub due: Vec<String>,
    /// Items that must stay out of the next session
    pub excluded: Vec<String>,
}

const VOCABULARY: &[(&str, &str, &str)] = &[
    ("水", "water", "みず"),
    ("火", "fire", "ひ"),
    ("山", "mountain", "やま"),
    ("川", "river", "かわ"),
    ("木", "tree", "き"),
    ("空", "sky", "そら"),
];

impl TestDataFactory {
    /// A review-stage state last seen `elapsed_days` ago and due at `now`
    pub fn reviewed_state(
        user_id: &str,
        ku_id: &str,
        stability: f64,
        difficulty: f64,
        elapsed_days: i64,
        now: DateTime<Utc>,
    ) -> LearningState {
        let mut state = LearningState::new(user_id, ku_id, Facet::Meaning);
        state.stage = Stage::Review;
        state.stability = stability;
        state.difficulty = difficulty;
        state.reps = 3;
        state.last_review = Some(now - Duration::days(elapsed_days));
        state.next_review = Some(now);
        state
    }

    pub fn burned_state(user_id: &str, ku_id: &str, now: DateTime<Utc>) -> LearningState {
        let mut state = Self::reviewed_state(user_id, ku_id, 400.0, 2.0, 500, now);
        state.stage = Stage::Burned;
        state.next_review = None;
        state
    }

    /// Knowledge units from a fixed vocabulary, with unique ids
    pub fn vocabulary(count: usize) -> Vec<KnowledgeUnitDetails> {
        VOCABULARY
            .iter()
            .cycle()
            .take(count)
            .map(|(subject, meaning, reading)| KnowledgeUnitDetails {
                ku_id: format!("ku-{}", Uuid::new_v4()),
                subject: subject.to_string(),
                meanings: vec![meaning.to_string()],
                readings: vec![reading.to_string()],
                cloze: None,
            })
            .collect()
    }

    /// Store a deck of new items; returns the units
    pub fn seed_deck(repo: &SqliteRepository, user_id: &str, count: usize) -> Vec<KnowledgeUnitDetails> {
        let units = Self::vocabulary(count);
        for unit in &units {
            repo.upsert_knowledge_unit(unit).expect("Failed to seed unit");
            repo.upsert_state(&LearningState::new(user_id, unit.ku_id.as_str(), Facet::Meaning))
                .expect("Failed to seed state");
        }
        units
    }

    /// Overdue, new, future and burned items for one learner
    pub fn create_scheduling_scenario(repo: &SqliteRepository, now: DateTime<Utc>) -> TestScenario {
        let user_id = "scheduler".to_string();

        let new_item = LearningState::new(user_id.as_str(), "new", Facet::Meaning);
        let mut very_overdue = Self::reviewed_state(&user_id, "very-overdue", 3.0, 5.0, 10, now);
        very_overdue.next_review = Some(now - Duration::days(7));
        let mut overdue = Self::reviewed_state(&user_id, "overdue", 3.0, 5.0, 4, now);
        overdue.next_review = Some(now - Duration::days(1));
        let mut future = Self::reviewed_state(&user_id, "future", 30.0, 5.0, 1, now);
        future.next_review = Some(now + Duration::days(29));
        let burned = Self::burned_state(&user_id, "burned", now);

        for state in [&new_item, &very_overdue, &overdue, &future, &burned] {
            repo.upsert_state(state).expect("Failed to seed state");
        }

        TestScenario {
            user_id,
            due: vec!["new".into(), "very-overdue".into(), "overdue".into()],
            excluded: vec!["future".into(), "burned".into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_ids_are_unique() {
        let units = TestDataFactory::vocabulary(10);
        let mut ids: Vec<_> = units.iter().map(|u| u.ku_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
        assert_eq!(units[6].subject, units[0].subject);
    }
}
