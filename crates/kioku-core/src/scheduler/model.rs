//! Memory Model
//!
//! Maps a prior learning state, a rating and the number of misses in the
//! current sitting to the next learning state and review time.
//!
//! ## Stage transitions
//! - `New` + again → `Learning`, `New` + pass → `Review`
//! - `Review | Learning | Relearning` + again → `Relearning` (lapses + 1, reps reset)
//! - `Learning | Relearning` + pass → `Review` (reps + 1)
//! - `Review` + pass → `Review`, or `Burned` once stability passes the burn threshold
//! - `Burned` is terminal

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::algorithm::{
    growth_stability, lapse_stability, miss_intensity, penalized_stability, retention_interval_factor,
    retrievability, sanitize_difficulty, sanitize_stability, BURN_THRESHOLD_DAYS, DECAY_RATE,
    DIFFICULTY_EASE_STEP, DIFFICULTY_PENALTY_SLOPE, INITIAL_DIFFICULTY, INTENSITY_CAP, LAPSE_DIFFICULTY_STEP,
    LAPSE_WEIGHTS, MAX_DIFFICULTY, MAX_INTERVAL_DAYS, MAX_STABILITY, MIN_DIFFICULTY, MIN_STABILITY,
};
use crate::memory::{LearningState, Rating, Stage};

// ============================================================================
// PARAMETERS
// ============================================================================

/// Tunable constants of the memory model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelParameters {
    pub min_stability: f64,
    pub max_stability: f64,
    pub min_difficulty: f64,
    pub max_difficulty: f64,
    pub initial_difficulty: f64,
    /// Stability granted by a first-contact pass
    pub initial_stability_pass: f64,
    /// Stability granted by a first-contact failure
    pub initial_stability_again: f64,
    pub intensity_cap: f64,
    pub decay_rate: f64,
    pub difficulty_penalty_slope: f64,
    pub difficulty_ease_step: f64,
    pub lapse_difficulty_step: f64,
    /// Stability multiplier of a clean pass on the easiest item
    pub growth_rate: f64,
    /// Extra growth for recalling at low retrievability
    pub spacing_bonus: f64,
    pub lapse_weights: [f64; 4],
    pub burn_threshold: f64,
    pub max_interval_days: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            min_stability: MIN_STABILITY,
            max_stability: MAX_STABILITY,
            min_difficulty: MIN_DIFFICULTY,
            max_difficulty: MAX_DIFFICULTY,
            initial_difficulty: INITIAL_DIFFICULTY,
            initial_stability_pass: 1.0,
            initial_stability_again: 0.4,
            intensity_cap: INTENSITY_CAP,
            decay_rate: DECAY_RATE,
            difficulty_penalty_slope: DIFFICULTY_PENALTY_SLOPE,
            difficulty_ease_step: DIFFICULTY_EASE_STEP,
            lapse_difficulty_step: LAPSE_DIFFICULTY_STEP,
            growth_rate: 1.5,
            spacing_bonus: 1.0,
            lapse_weights: LAPSE_WEIGHTS,
            burn_threshold: BURN_THRESHOLD_DAYS,
            max_interval_days: MAX_INTERVAL_DAYS,
        }
    }
}

// ============================================================================
// RETRIEVABILITY ESTIMATOR
// ============================================================================

/// Estimates recall probability of a state at a point in time
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievabilityEstimator;

impl RetrievabilityEstimator {
    /// Recall probability now; 0 if the state was never reviewed
    pub fn estimate(&self, state: &LearningState, now: DateTime<Utc>) -> f64 {
        match state.last_review {
            None => 0.0,
            Some(last) => retrievability(state.stability, elapsed_days(last, now)),
        }
    }
}

/// Fractional days between two instants
pub fn elapsed_days(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 86_400.0
}

// ============================================================================
// RESULTS
// ============================================================================

/// Outcome of one committed review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    /// State to persist
    pub state: LearningState,
    /// Time until the next review (zero for burned items)
    #[serde(with = "duration_seconds")]
    pub interval: Duration,
    /// Absolute next review time (None for burned items)
    pub next_review: Option<DateTime<Utc>>,
}

/// What each rating would produce, without committing anything
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResults {
    pub again: ReviewResult,
    pub pass: ReviewResult,
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::seconds(i64::deserialize(d)?))
    }
}

// ============================================================================
// MEMORY MODEL
// ============================================================================

/// Miss-penalised spaced repetition model
#[derive(Debug, Clone, Default)]
pub struct MemoryModel {
    params: ModelParameters,
    estimator: RetrievabilityEstimator,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom parameters
    pub fn with_parameters(params: ModelParameters) -> Self {
        Self {
            params,
            estimator: RetrievabilityEstimator,
        }
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.params
    }

    pub fn estimator(&self) -> &RetrievabilityEstimator {
        &self.estimator
    }

    /// Compute the next state after a committed answer
    ///
    /// Never fails: corrupted inputs are clamped so one bad row cannot abort
    /// a session.
    pub fn compute_next(
        &self,
        state: &LearningState,
        rating: Rating,
        wrong_count: u32,
        target_retention: f64,
        now: DateTime<Utc>,
    ) -> ReviewResult {
        let p = &self.params;

        if state.stage.is_terminal() {
            return ReviewResult {
                state: state.clone(),
                interval: Duration::zero(),
                next_review: None,
            };
        }

        let prior_stability = sanitize_stability(state.stability, p.min_stability);
        let prior_difficulty =
            sanitize_difficulty(state.difficulty, p.initial_difficulty, p.min_difficulty, p.max_difficulty);
        if prior_stability != state.stability || prior_difficulty != state.difficulty {
            tracing::warn!(
                ku_id = %state.ku_id,
                facet = %state.facet,
                stability = state.stability,
                difficulty = state.difficulty,
                "Clamped out-of-range memory state"
            );
        }

        let intensity = miss_intensity(wrong_count, p.intensity_cap);
        let cold = state.stage == Stage::New || state.last_review.is_none();
        let r = self.estimator.estimate(state, now);

        let mut next = state.clone();
        let (stability, difficulty) = match (rating, cold) {
            (Rating::Pass, true) => {
                if wrong_count == 0 {
                    // First success starts at the initial stability without growth
                    (
                        p.initial_stability_pass.max(prior_stability),
                        prior_difficulty - p.difficulty_ease_step,
                    )
                } else {
                    (
                        penalized_stability(prior_stability, intensity, p.decay_rate),
                        prior_difficulty + p.difficulty_penalty_slope * intensity,
                    )
                }
            }
            (Rating::Pass, false) => {
                if wrong_count == 0 {
                    let difficulty = prior_difficulty - p.difficulty_ease_step;
                    let grown = growth_stability(
                        prior_stability,
                        difficulty.clamp(p.min_difficulty, p.max_difficulty),
                        r,
                        p.growth_rate,
                        p.spacing_bonus,
                        p.max_difficulty,
                    );
                    // Success never shrinks stability
                    (grown.max(prior_stability), difficulty)
                } else {
                    (
                        penalized_stability(prior_stability, intensity, p.decay_rate),
                        prior_difficulty + p.difficulty_penalty_slope * intensity,
                    )
                }
            }
            (Rating::Again, true) => (
                p.initial_stability_again.min(prior_stability),
                prior_difficulty + p.lapse_difficulty_step,
            ),
            (Rating::Again, false) => (
                lapse_stability(prior_stability, prior_difficulty, r, &p.lapse_weights),
                prior_difficulty + p.lapse_difficulty_step,
            ),
        };

        next.stability = sanitize_stability(stability, p.min_stability).min(p.max_stability);
        next.difficulty = sanitize_difficulty(difficulty, p.initial_difficulty, p.min_difficulty, p.max_difficulty);

        match rating {
            Rating::Pass => {
                next.reps = state.reps.saturating_add(1);
                next.stage = if state.stage == Stage::Review && next.stability > p.burn_threshold {
                    Stage::Burned
                } else {
                    Stage::Review
                };
            }
            Rating::Again => {
                next.reps = 0;
                if state.stage == Stage::New {
                    next.stage = Stage::Learning;
                } else {
                    next.stage = Stage::Relearning;
                    next.lapses = state.lapses.saturating_add(1);
                }
            }
        }

        next.last_review = Some(now);
        let (interval, next_review) = if next.stage.is_terminal() {
            (Duration::zero(), None)
        } else {
            let interval = self.interval_for(next.stability, target_retention);
            (interval, Some(now + interval))
        };
        next.next_review = next_review;

        tracing::debug!(
            ku_id = %next.ku_id,
            facet = %next.facet,
            rating = %rating,
            wrong_count,
            from = %state.stage,
            to = %next.stage,
            stability = next.stability,
            difficulty = next.difficulty,
            "Computed next memory state"
        );

        ReviewResult {
            state: next,
            interval,
            next_review,
        }
    }

    /// Preview both ratings for a state
    pub fn preview(
        &self,
        state: &LearningState,
        wrong_count: u32,
        target_retention: f64,
        now: DateTime<Utc>,
    ) -> PreviewResults {
        PreviewResults {
            again: self.compute_next(state, Rating::Again, wrong_count, target_retention, now),
            pass: self.compute_next(state, Rating::Pass, wrong_count, target_retention, now),
        }
    }

    /// Interval for a stability at a target retention
    ///
    /// Whole days from one day up; whole minutes below that, never zero.
    pub fn interval_for(&self, stability: f64, target_retention: f64) -> Duration {
        let days = (stability * retention_interval_factor(target_retention))
            .clamp(0.0, self.params.max_interval_days);
        if days >= 1.0 {
            Duration::days(days.round() as i64)
        } else {
            Duration::minutes(((days * 1440.0).round() as i64).max(1))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
