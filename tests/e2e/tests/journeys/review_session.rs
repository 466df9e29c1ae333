//! Full review sitting
//!
//! Learner types answers to rendered prompts; misses go round again and the
//! first correct answer commits.

use chrono::Duration;
use kioku_core::{AttemptOutcome, Facet, Rating, SessionController, SessionStatus, Stage};
use kioku_e2e_tests::TestDatabaseManager;

const USER: &str = "learner";

/// Type `answer` for the current prompt; returns whether it committed
fn type_answer(db: &TestDatabaseManager, controller: &mut SessionController, answer: &str) -> bool {
    let ku_id = controller.get_next_item().expect("item to answer").ku_id.clone();
    let details = db.repo.get_knowledge_unit(&ku_id).unwrap().expect("seeded unit");
    let question = controller.current_question(&details).expect("question");
    let rating = if question.accepts(answer) { Rating::Pass } else { Rating::Again };
    controller.submit_answer(rating).unwrap()
}

#[test]
fn test_two_item_sitting_end_to_end() {
    let db = TestDatabaseManager::new_temp();
    db.seed_unit(USER, "ku-a", "水", &["water"]);
    db.seed_unit(USER, "ku-b", "火", &["fire"]);

    let mut controller = db.controller();
    let session_id = controller.start_session(USER, None).unwrap().id.clone();
    assert_eq!(controller.queue().len(), 2);

    let prompt = {
        let details = db.repo.get_knowledge_unit("ku-a").unwrap().unwrap();
        controller.current_question(&details).unwrap().prompt
    };
    assert_eq!(prompt, "What does 水 mean?");

    // Miss A, then B correct, then A correct
    assert!(!type_answer(&db, &mut controller, "fire"));
    assert_eq!(controller.get_next_item().unwrap().ku_id, "ku-b");
    assert!(type_answer(&db, &mut controller, "Fire"));
    assert_eq!(controller.get_next_item().unwrap().ku_id, "ku-a");
    assert!(type_answer(&db, &mut controller, " water "));

    assert!(controller.is_finished());
    assert!(controller.get_next_item().is_none());
    let progress = controller.progress().unwrap();
    assert_eq!(progress.committed, 2);
    assert_eq!(progress.incorrect_attempts, 1);
    assert_eq!(progress.first_try_correct, 1);

    // A: one miss folded into the first commit
    let a = db.state(USER, "ku-a", &Facet::Meaning);
    assert_eq!(a.stage, Stage::Review);
    assert_eq!(a.reps, 1);
    assert!((a.stability - (-0.3f64).exp()).abs() < 1e-9);
    assert!((a.difficulty - 5.2).abs() < 1e-9);
    assert_eq!(a.next_review, Some(TestDatabaseManager::epoch() + Duration::minutes(1067)));

    // B: clean first pass
    let b = db.state(USER, "ku-b", &Facet::Meaning);
    assert!((b.stability - 1.0).abs() < 1e-9);
    assert!((b.difficulty - 4.9).abs() < 1e-9);
    assert_eq!(b.next_review, Some(TestDatabaseManager::epoch() + Duration::days(1)));

    // Attempt log keeps every answer in order
    let attempts = db.repo.get_attempts(&session_id).unwrap();
    let log: Vec<(&str, AttemptOutcome, u32)> = attempts
        .iter()
        .map(|a| (a.ku_id.as_str(), a.outcome, a.attempt_number))
        .collect();
    assert_eq!(
        log,
        vec![
            ("ku-a", AttemptOutcome::Incorrect, 1),
            ("ku-b", AttemptOutcome::Correct, 1),
            ("ku-a", AttemptOutcome::Correct, 2),
        ]
    );
    assert_eq!(db.repo.session_status(&session_id).unwrap(), Some(SessionStatus::Finished));

    let stats = db.repo.get_stats(USER, db.now()).unwrap();
    assert_eq!(stats.finished_sessions, 1);
    assert_eq!(stats.total_attempts, 3);
    assert_eq!(stats.correct_attempts, 2);
    assert_eq!(stats.review_items, 2);
}

#[test]
fn test_items_come_back_when_due() {
    let db = TestDatabaseManager::new_temp();
    db.seed_unit(USER, "ku-a", "水", &["water"]);
    db.seed_unit(USER, "ku-b", "火", &["fire"]);

    let mut controller = db.controller();
    controller.start_session(USER, None).unwrap();
    type_answer(&db, &mut controller, "wrong");
    type_answer(&db, &mut controller, "fire");
    type_answer(&db, &mut controller, "water");
    assert_eq!(db.due_count(USER), 0);

    // The missed item is due first
    db.advance(Duration::hours(18));
    assert_eq!(db.due_count(USER), 1);

    db.advance(Duration::hours(6));
    assert_eq!(db.due_count(USER), 2);

    // A second sitting picks them up in due order
    let mut controller = db.controller();
    controller.start_session(USER, None).unwrap();
    let order: Vec<String> = controller.queue().iter().map(|i| i.ku_id.clone()).collect();
    assert_eq!(order, vec!["ku-a", "ku-b"]);
}

#[test]
fn test_starting_with_nothing_due_is_rejected() {
    let db = TestDatabaseManager::new_temp();
    let mut controller = db.controller();
    assert!(controller.start_session(USER, None).is_err());
    assert!(controller.session().is_none());
}

#[test]
fn test_commit_record_serializes() {
    let db = TestDatabaseManager::new_temp();
    db.seed_unit(USER, "ku-a", "水", &["water"]);

    let mut controller = db.controller();
    controller.start_session(USER, None).unwrap();
    controller.submit_answer(Rating::Pass).unwrap();

    let commit = controller.last_commit().unwrap();
    let json = serde_json::to_value(commit).unwrap();
    assert_eq!(json["kuId"], "ku-a");
    assert_eq!(json["wrongCount"], 0);
    assert_eq!(json["result"]["interval"], 86_400);
}
