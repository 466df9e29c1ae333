//! Misses in a sitting
//!
//! Wrong answers never touch the stored state; the eventual correct answer
//! commits once, penalised by how many misses came before it.

use kioku_core::{Facet, Rating, Stage};
use kioku_e2e_tests::{TestDataFactory, TestDatabaseManager};

const USER: &str = "learner";

#[test]
fn test_three_misses_schedule_sooner_than_clean_pass() {
    let db = TestDatabaseManager::new_temp();
    let now = db.now();
    db.seed_states(&[
        TestDataFactory::reviewed_state(USER, "missed", 10.0, 5.0, 10, now),
        TestDataFactory::reviewed_state(USER, "clean", 10.0, 5.0, 10, now),
    ]);

    let mut controller = db.controller();
    controller.start_session(USER, None).unwrap();
    assert_eq!(controller.get_next_item().unwrap().ku_id, "clean");
    assert!(controller.submit_answer(Rating::Pass).unwrap());

    for _ in 0..3 {
        assert_eq!(controller.get_next_item().unwrap().ku_id, "missed");
        assert!(!controller.submit_answer(Rating::Again).unwrap());
    }
    assert!(controller.submit_answer(Rating::Pass).unwrap());
    assert!(controller.is_finished());

    let missed = db.state(USER, "missed", &Facet::Meaning);
    let clean = db.state(USER, "clean", &Facet::Meaning);

    // intensity = log2(4) = 2, S' = 10 * e^(-0.6)
    assert!((missed.stability - 5.488).abs() < 1e-3);
    assert!((missed.difficulty - 5.4).abs() < 1e-9);
    assert!(clean.stability > 10.0);
    assert!((clean.difficulty - 4.9).abs() < 1e-9);
    assert!(missed.next_review.unwrap() < clean.next_review.unwrap());

    // A recovered item is still a success, not a lapse
    assert_eq!(missed.stage, Stage::Review);
    assert_eq!(missed.lapses, 0);
    assert_eq!(missed.reps, 4);
}

#[test]
fn test_misses_leave_stored_state_untouched() {
    let db = TestDatabaseManager::new_temp();
    let now = db.now();
    db.seed_states(&[TestDataFactory::reviewed_state(USER, "ku", 6.0, 4.0, 6, now)]);
    let before = db.state(USER, "ku", &Facet::Meaning);

    let mut controller = db.controller();
    controller.start_session(USER, None).unwrap();
    controller.submit_answer(Rating::Again).unwrap();
    controller.submit_answer(Rating::Again).unwrap();

    assert_eq!(db.state(USER, "ku", &Facet::Meaning), before);
    assert_eq!(controller.get_next_item().unwrap().wrong_count, 2);

    controller.submit_answer(Rating::Pass).unwrap();
    let after = db.state(USER, "ku", &Facet::Meaning);
    assert!(after.stability < before.stability);
    assert!(after.difficulty > before.difficulty);
}

#[test]
fn test_penalty_is_monotonic_in_misses() {
    let db = TestDatabaseManager::new_temp();
    let now = db.now();
    let states: Vec<_> = (0..5)
        .map(|misses| TestDataFactory::reviewed_state(USER, &format!("m{}", misses), 12.0, 5.0, 12, now))
        .collect();
    db.seed_states(&states);

    let mut controller = db.controller();
    controller.start_session(USER, None).unwrap();
    while let Some(item) = controller.get_next_item() {
        let target: u32 = item.ku_id[1..].parse().unwrap();
        let rating = if item.wrong_count < target { Rating::Again } else { Rating::Pass };
        controller.submit_answer(rating).unwrap();
    }

    let stabilities: Vec<f64> = (0..5)
        .map(|m| db.state(USER, &format!("m{}", m), &Facet::Meaning).stability)
        .collect();
    for pair in stabilities.windows(2) {
        assert!(pair[1] <= pair[0], "more misses must not raise stability: {:?}", stabilities);
    }
}
