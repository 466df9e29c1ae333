//! Mathematical Tests
//!
//! Laws of the memory model checked over wide input grids, including
//! degenerate values a corrupted row could carry.

use chrono::{Duration, TimeZone, Utc};
use kioku_core::{
    retrievability, Facet, LearningState, MemoryModel, Rating, Stage, MAX_DIFFICULTY, MAX_STABILITY,
    MIN_DIFFICULTY, MIN_STABILITY,
};

const STABILITIES: &[f64] = &[0.1, 0.5, 1.0, 3.0, 10.0, 45.0, 200.0, 1000.0, 30000.0];
const DIFFICULTIES: &[f64] = &[1.0, 2.5, 5.0, 7.5, 10.0];
const ELAPSED: &[i64] = &[0, 1, 5, 30, 400];
const MISSES: &[u32] = &[0, 1, 2, 3, 7, 50, 1000];

fn state(stability: f64, difficulty: f64, elapsed: i64) -> LearningState {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let mut s = LearningState::new("u", "ku", Facet::Meaning);
    s.stage = Stage::Review;
    s.stability = stability;
    s.difficulty = difficulty;
    s.reps = 2;
    s.last_review = Some(now - Duration::days(elapsed));
    s.next_review = Some(now);
    s
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

#[test]
fn test_results_stay_in_bounds() {
    let model = MemoryModel::new();
    for &s in STABILITIES {
        for &d in DIFFICULTIES {
            for &e in ELAPSED {
                for &wc in MISSES {
                    for rating in [Rating::Again, Rating::Pass] {
                        let next = model.compute_next(&state(s, d, e), rating, wc, 0.9, now()).state;
                        assert!(next.stability >= MIN_STABILITY && next.stability <= MAX_STABILITY);
                        assert!(next.difficulty >= MIN_DIFFICULTY && next.difficulty <= MAX_DIFFICULTY);
                        assert!(next.stability.is_finite() && next.difficulty.is_finite());
                    }
                }
            }
        }
    }
}

#[test]
fn test_clean_pass_never_lowers_stability() {
    let model = MemoryModel::new();
    for &s in STABILITIES {
        for &d in DIFFICULTIES {
            for &e in ELAPSED {
                let next = model.compute_next(&state(s, d, e), Rating::Pass, 0, 0.9, now()).state;
                assert!(next.stability >= s, "S={} D={} t={} -> {}", s, d, e, next.stability);
            }

            let mut unreviewed = state(s, d, 0);
            unreviewed.last_review = None;
            let next = model.compute_next(&unreviewed, Rating::Pass, 0, 0.9, now()).state;
            assert!(next.stability >= s, "unreviewed S={} D={} -> {}", s, d, next.stability);

            let mut fresh = LearningState::new("u", "ku", Facet::Meaning);
            fresh.stability = s;
            fresh.difficulty = d;
            let next = model.compute_next(&fresh, Rating::Pass, 0, 0.9, now()).state;
            assert!(next.stability >= s, "new S={} D={} -> {}", s, d, next.stability);
        }
    }
}

#[test]
fn test_penalty_monotonic_and_capped() {
    let model = MemoryModel::new();
    for &s in STABILITIES {
        for &d in DIFFICULTIES {
            let mut previous = f64::INFINITY;
            for &wc in MISSES.iter().skip(1) {
                let next = model.compute_next(&state(s, d, 3), Rating::Pass, wc, 0.9, now()).state;
                assert!(next.stability <= previous + 1e-12);
                previous = next.stability;
            }
            // Intensity saturates at 3: seven misses and a thousand are the same
            let seven = model.compute_next(&state(s, d, 3), Rating::Pass, 7, 0.9, now()).state;
            let many = model.compute_next(&state(s, d, 3), Rating::Pass, 1000, 0.9, now()).state;
            assert!((seven.stability - many.stability).abs() < 1e-12);
            assert!((seven.difficulty - many.difficulty).abs() < 1e-12);
        }
    }
}

#[test]
fn test_retrievability_curve() {
    for &s in STABILITIES {
        assert_eq!(retrievability(s, 0.0), 1.0);
        // R(S) = 0.9 by construction
        assert!((retrievability(s, s) - 0.9).abs() < 1e-9);
        let mut previous = 1.0;
        for t in [0.5, 1.0, 10.0, 100.0, 10000.0] {
            let r = retrievability(s, t);
            assert!(r >= 0.0 && r <= previous);
            previous = r;
        }
    }
}

#[test]
fn test_degenerate_inputs_are_clamped() {
    let model = MemoryModel::new();
    for (s, d) in [(f64::NAN, 5.0), (-3.0, f64::NAN), (f64::INFINITY, 50.0), (0.0, -7.0)] {
        for rating in [Rating::Again, Rating::Pass] {
            let result = model.compute_next(&state(s, d, 2), rating, 2, f64::NAN, now());
            assert!(result.state.stability.is_finite());
            assert!(result.state.difficulty >= MIN_DIFFICULTY && result.state.difficulty <= MAX_DIFFICULTY);
            if let Some(next_review) = result.next_review {
                assert!(next_review > now());
            }
        }
    }
}
