//! The fixed stage plan: how long the clip plays at each stage and what a
//! correct guess there is worth.

pub const STAGE_COUNT: usize = 7;

/// Index of the final stage.  A miss here ends the round.
pub const LAST_STAGE: usize = STAGE_COUNT - 1;

/// Playback budget per stage, in seconds.  Strictly increasing.
pub const STAGE_BUDGETS: [f64; STAGE_COUNT] = [0.1, 0.5, 1.0, 2.0, 4.0, 8.0, 15.0];

/// Points for a correct guess per stage.  Non-increasing.
pub const STAGE_POINTS: [u32; STAGE_COUNT] = [10, 8, 6, 4, 3, 2, 1];

/// Budget for `stage`, clamped to the last stage.
pub fn budget(stage: usize) -> f64 {
    STAGE_BUDGETS[stage.min(LAST_STAGE)]
}

/// Points for `stage`, clamped to the last stage.
pub fn points(stage: usize) -> u32 {
    STAGE_POINTS[stage.min(LAST_STAGE)]
}
