//! Forgetting-curve formulas
//!
//! Pure numeric building blocks of the memory model. Every function here is
//! total: out-of-range inputs are clamped instead of propagated.

// ============================================================================
// CONSTANTS
// ============================================================================

/// Recall probability at which stability is measured
pub const REFERENCE_RETENTION: f64 = 0.9;

/// Default per-user target retention
pub const DEFAULT_RETENTION: f64 = 0.9;

/// Accepted range for target retention
pub const MIN_RETENTION: f64 = 0.5;
pub const MAX_RETENTION: f64 = 0.99;

/// Stability floor in days (≈ 2.4 hours)
pub const MIN_STABILITY: f64 = 0.1;
/// Stability ceiling in days (100 years)
pub const MAX_STABILITY: f64 = 36500.0;

pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Difficulty assigned on first contact
pub const INITIAL_DIFFICULTY: f64 = 5.0;
/// Nominal stability of a never-reviewed state
pub const INITIAL_STABILITY: f64 = 1.0;

/// Upper bound of the logarithmic miss intensity
pub const INTENSITY_CAP: f64 = 3.0;
/// Stability decay per unit of miss intensity
pub const DECAY_RATE: f64 = 0.3;
/// Difficulty added per unit of miss intensity
pub const DIFFICULTY_PENALTY_SLOPE: f64 = 0.2;
/// Difficulty removed by a clean pass
pub const DIFFICULTY_EASE_STEP: f64 = 0.1;
/// Difficulty added by a committed lapse
pub const LAPSE_DIFFICULTY_STEP: f64 = 0.5;

/// Stability above which a review pass burns the item
pub const BURN_THRESHOLD_DAYS: f64 = 365.0;

/// Longest interval ever scheduled
pub const MAX_INTERVAL_DAYS: f64 = 36500.0;

/// FSRS post-lapse stability weights (w11..w14 of FSRS-4.5)
pub const LAPSE_WEIGHTS: [f64; 4] = [1.9395, 0.11, 0.29605, 2.2698];

// ============================================================================
// CORE FUNCTIONS
// ============================================================================

/// Probability of recall after `elapsed_days` for a memory of `stability`
///
/// R = exp(ln(0.9) · t / S), so R(S) = 0.9 by definition of stability.
pub fn retrievability(stability: f64, elapsed_days: f64) -> f64 {
    if !elapsed_days.is_finite() || elapsed_days <= 0.0 {
        return 1.0;
    }
    let stability = sanitize_stability(stability, MIN_STABILITY);
    (REFERENCE_RETENTION.ln() * elapsed_days / stability)
        .exp()
        .clamp(0.0, 1.0)
}

/// Logarithmic miss penalty: log2(misses + 1), capped
///
/// The second, third... miss adds less than the first.
pub fn miss_intensity(wrong_count: u32, cap: f64) -> f64 {
    (f64::from(wrong_count) + 1.0).log2().min(cap.max(0.0))
}

/// Ease multiplier in (0, 1]: 1.0 at minimum difficulty, 0.1 at maximum
pub fn ease(difficulty: f64, max_difficulty: f64) -> f64 {
    ((max_difficulty - difficulty + 1.0) / max_difficulty).clamp(0.0, 1.0)
}

/// Stability after a clean pass
///
/// Grows faster for easy items and for items recalled at lower retrievability.
pub fn growth_stability(
    stability: f64,
    difficulty: f64,
    retrievability: f64,
    growth_rate: f64,
    spacing_bonus: f64,
    max_difficulty: f64,
) -> f64 {
    let r = retrievability.clamp(0.0, 1.0);
    stability * (1.0 + growth_rate * ease(difficulty, max_difficulty) * (1.0 + spacing_bonus * (1.0 - r)))
}

/// Stability after a pass that needed `intensity` worth of misses
pub fn penalized_stability(stability: f64, intensity: f64, decay_rate: f64) -> f64 {
    stability * (-decay_rate * intensity).exp()
}

/// Post-lapse stability (FSRS forget formula)
///
/// S' = w0 · D^-w1 · ((S + 1)^w2 - 1) · e^(w3 · (1 - R)), never above S.
pub fn lapse_stability(stability: f64, difficulty: f64, retrievability: f64, w: &[f64; 4]) -> f64 {
    let r = retrievability.clamp(0.0, 1.0);
    let forgotten = w[0]
        * difficulty.powf(-w[1])
        * ((stability + 1.0).powf(w[2]) - 1.0)
        * (w[3] * (1.0 - r)).exp();
    forgotten.min(stability)
}

/// Interval multiplier that turns stability into days at the target retention
///
/// Solving R = exp(ln(0.9) · t / S) for t gives t = S · ln(R) / ln(0.9).
pub fn retention_interval_factor(target_retention: f64) -> f64 {
    clamp_retention(target_retention).ln() / REFERENCE_RETENTION.ln()
}

/// Clamp a configured retention into the accepted range
pub fn clamp_retention(target_retention: f64) -> f64 {
    if target_retention.is_finite() {
        target_retention.clamp(MIN_RETENTION, MAX_RETENTION)
    } else {
        DEFAULT_RETENTION
    }
}

/// Replace NaN / non-positive stability with the floor
pub fn sanitize_stability(stability: f64, floor: f64) -> f64 {
    if stability.is_finite() && stability > 0.0 {
        stability.max(floor)
    } else {
        floor
    }
}

/// Replace NaN difficulty and clamp into range
pub fn sanitize_difficulty(difficulty: f64, fallback: f64, min: f64, max: f64) -> f64 {
    if difficulty.is_finite() {
        difficulty.clamp(min, max)
    } else {
        fallback.clamp(min, max)
    }
}

// ============================================================================
// TESTS
// ============================================================================
