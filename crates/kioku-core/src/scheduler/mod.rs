//! Scheduler Module
//!
//! Miss-penalised forgetting-curve scheduler.
//!
//! A pass with no misses in the sitting grows stability; every miss that
//! preceded the pass decays the stability that would otherwise be granted,
//! with a logarithmic intensity so repeated misses punish less and less.
//!
//! ## Core Formulas:
//! - Retrievability: R = exp(ln(0.9) · t / S)
//! - Miss intensity: I = min(log2(misses + 1), 3)
//! - Penalised pass: S' = S · e^(-0.3 · I), D' = D + 0.2 · I
//! - Interval: t = S' · ln(target) / ln(0.9)

mod algorithm;
mod model;

pub use algorithm::{
    clamp_retention,
    ease,
    growth_stability,
    lapse_stability,
    miss_intensity,
    penalized_stability,
    retention_interval_factor,
    // Core functions
    retrievability,
    BURN_THRESHOLD_DAYS,
    DECAY_RATE,
    DEFAULT_RETENTION,
    DIFFICULTY_EASE_STEP,
    DIFFICULTY_PENALTY_SLOPE,
    INITIAL_DIFFICULTY,
    INITIAL_STABILITY,
    // Constants
    INTENSITY_CAP,
    LAPSE_DIFFICULTY_STEP,
    LAPSE_WEIGHTS,
    MAX_DIFFICULTY,
    MAX_INTERVAL_DAYS,
    MAX_RETENTION,
    MAX_STABILITY,
    MIN_DIFFICULTY,
    MIN_RETENTION,
    MIN_STABILITY,
    REFERENCE_RETENTION,
};

pub use model::{
    elapsed_days, MemoryModel, ModelParameters, PreviewResults, RetrievabilityEstimator, ReviewResult,
};
