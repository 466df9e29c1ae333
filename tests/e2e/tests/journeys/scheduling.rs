//! Due ordering, burned items and target retention

use chrono::Duration;
use kioku_core::{Facet, Rating, Stage};
use kioku_e2e_tests::{TestDataFactory, TestDatabaseManager};

#[test]
fn test_session_order_follows_due_order() {
    let db = TestDatabaseManager::new_temp();
    let scenario = TestDataFactory::create_scheduling_scenario(&db.repo, db.now());

    let mut controller = db.controller();
    controller.start_session(&scenario.user_id, None).unwrap();
    let order: Vec<String> = controller.queue().iter().map(|i| i.ku_id.clone()).collect();
    assert_eq!(order, scenario.due);
    for excluded in &scenario.excluded {
        assert!(!controller.queue().contains(excluded, &Facet::Meaning));
    }

    let ordinals: Vec<usize> = controller.queue().iter().map(|i| i.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 2]);
}

#[test]
fn test_session_limit() {
    let db = TestDatabaseManager::new_temp();
    let scenario = TestDataFactory::create_scheduling_scenario(&db.repo, db.now());

    let mut controller = db.controller();
    let session = controller.start_session(&scenario.user_id, Some(2)).unwrap();
    assert_eq!(session.progress.total_items, 2);
}

#[test]
fn test_mature_item_burns_and_never_returns() {
    let db = TestDatabaseManager::new_temp();
    let now = db.now();
    db.seed_states(&[TestDataFactory::reviewed_state("u", "old-friend", 300.0, 1.0, 300, now)]);

    let mut controller = db.controller();
    controller.start_session("u", None).unwrap();
    controller.submit_answer(Rating::Pass).unwrap();

    let commit = controller.last_commit().unwrap();
    assert_eq!(commit.result.state.stage, Stage::Burned);
    assert!(commit.result.next_review.is_none());

    let stored = db.state("u", "old-friend", &Facet::Meaning);
    assert_eq!(stored.stage, Stage::Burned);
    assert!(stored.stability > 365.0);

    db.advance(Duration::days(3650));
    assert_eq!(db.due_count("u"), 0);
    let mut controller = db.controller();
    assert!(controller.start_session("u", None).is_err());
}

#[test]
fn test_higher_target_retention_shortens_interval() {
    let db = TestDatabaseManager::new_temp();
    let now = db.now();
    db.seed_states(&[
        TestDataFactory::reviewed_state("relaxed", "ku", 8.0, 5.0, 8, now),
        TestDataFactory::reviewed_state("strict", "ku", 8.0, 5.0, 8, now),
    ]);
    db.repo.set_target_retention("strict", 0.95).unwrap();

    let mut intervals = Vec::new();
    for user in ["relaxed", "strict"] {
        let mut controller = db.controller();
        controller.start_session(user, None).unwrap();
        controller.submit_answer(Rating::Pass).unwrap();
        let commit = controller.last_commit().unwrap();
        intervals.push((commit.result.state.stability, commit.result.interval));
    }

    let (relaxed, strict) = (intervals[0], intervals[1]);
    // Same memory, different schedule
    assert!((relaxed.0 - strict.0).abs() < 1e-9);
    assert!(strict.1 < relaxed.1);
}

#[test]
fn test_preview_writes_nothing() {
    let db = TestDatabaseManager::new_temp();
    let now = db.now();
    let state = TestDataFactory::reviewed_state("u", "ku", 20.0, 5.0, 20, now);
    db.seed_states(std::slice::from_ref(&state));

    let preview = kioku_core::MemoryModel::new().preview(&state, 0, 0.9, now);
    assert_eq!(preview.again.state.stage, Stage::Relearning);
    assert_eq!(preview.again.state.lapses, 1);
    assert!(preview.again.state.stability < state.stability);
    assert!(preview.pass.state.stability >= state.stability);

    assert_eq!(db.state("u", "ku", &Facet::Meaning), state);
}
