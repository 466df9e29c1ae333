//! Durability across reopen and abandoned sittings

use kioku_core::{Configuration, Facet, Rating, SessionStatus, Stage};
use kioku_e2e_tests::{TestDataFactory, TestDatabaseManager};

#[test]
fn test_committed_state_survives_reopen() {
    let mut db = TestDatabaseManager::new_temp();
    let units = TestDataFactory::seed_deck(&db.repo, "u", 3);
    db.repo.set_target_retention("u", 0.85).unwrap();

    let mut controller = db.controller();
    controller.start_session("u", None).unwrap();
    while controller.get_next_item().is_some() {
        controller.submit_answer(Rating::Pass).unwrap();
    }
    drop(controller);

    db.reopen();
    assert!((db.repo.target_retention("u") - 0.85).abs() < 1e-12);
    for unit in &units {
        let state = db.state("u", &unit.ku_id, &Facet::Meaning);
        assert_eq!(state.stage, Stage::Review);
        assert_eq!(state.reps, 1);
        assert!(state.next_review.is_some());
        assert_eq!(db.repo.get_knowledge_unit(&unit.ku_id).unwrap().as_ref(), Some(unit));
    }
}

#[test]
fn test_abandoned_session_keeps_earlier_commits() {
    let db = TestDatabaseManager::new_temp();
    TestDataFactory::seed_deck(&db.repo, "u", 2);

    let mut controller = db.controller();
    let session_id = controller.start_session("u", None).unwrap().id.clone();
    let first = controller.get_next_item().unwrap().ku_id.clone();
    controller.submit_answer(Rating::Pass).unwrap();
    controller.submit_answer(Rating::Again).unwrap();

    let abandoned = controller.abandon().unwrap();
    assert_eq!(abandoned.progress.committed, 1);
    assert!(controller.session().is_none());

    assert_eq!(db.state("u", &first, &Facet::Meaning).reps, 1);
    assert_eq!(db.due_count("u"), 1);
    assert_eq!(db.repo.session_status(&session_id).unwrap(), Some(SessionStatus::Active));
    assert_eq!(db.repo.get_attempts(&session_id).unwrap().len(), 2);

    // A fresh sitting picks up what was left
    controller.start_session("u", None).unwrap();
    assert_eq!(controller.queue().len(), 1);
}
