//! Level derivation from cumulative experience.
//!
//! Finishing level `L` costs `L * 100` exp, so the cumulative threshold to
//! reach level `L + 1` is `100 + 200 + ... + L * 100`:
//!
//! ```text
//! level 1: 0..100    level 2: 100..300    level 3: 300..600    ...
//! ```
//!
//! Levels are capped at [`MAX_LEVEL`]. Everything here is pure and uses
//! saturating arithmetic so no input can panic.

use liferpg_types::LevelProgress;

/// Highest attainable level.
pub const MAX_LEVEL: u32 = 100;

/// Exp cost multiplier: finishing level `L` costs `L * EXP_PER_LEVEL_STEP`.
pub const EXP_PER_LEVEL_STEP: i64 = 100;

/// Exp needed to go from the start of `level` to the start of the next.
pub fn level_span(level: u32) -> i64 {
    i64::from(level.clamp(1, MAX_LEVEL)).saturating_mul(EXP_PER_LEVEL_STEP)
}

/// Cumulative exp at which `level` begins.
///
/// `threshold_for_level(1) == 0`, `threshold_for_level(2) == 100`,
/// `threshold_for_level(3) == 300`.
pub fn threshold_for_level(level: u32) -> i64 {
    let level = i64::from(level.clamp(1, MAX_LEVEL));
    let finished = level.saturating_sub(1);
    // Triangular number of finished levels; one of the two factors is even.
    finished
        .saturating_mul(level)
        .checked_div(2)
        .unwrap_or(0)
        .saturating_mul(EXP_PER_LEVEL_STEP)
}

/// The level a user with `exp` cumulative experience has reached.
///
/// Returns the smallest level whose cumulative threshold exceeds `exp`,
/// capped at [`MAX_LEVEL`]. Negative input is treated as zero.
pub fn level_for_experience(exp: i64) -> u32 {
    let exp = exp.max(0);
    let mut required: i64 = 0;
    let mut level: u32 = 1;

    while level <= MAX_LEVEL {
        required = required.saturating_add(level_span(level));
        if exp < required {
            return level;
        }
        level = level.saturating_add(1);
    }

    MAX_LEVEL
}

/// Position of `exp` within its level, for progress bars.
///
/// At [`MAX_LEVEL`] exp keeps accumulating past the final threshold; the
/// percentage is clamped to 100.
pub fn level_progress(exp: i64) -> LevelProgress {
    let exp = exp.max(0);
    let level = level_for_experience(exp);
    let level_floor_exp = threshold_for_level(level);
    let level_span_exp = level_span(level);
    let exp_into_level = exp.saturating_sub(level_floor_exp).max(0);

    let percent = exp_into_level
        .saturating_mul(100)
        .checked_div(level_span_exp)
        .unwrap_or(0)
        .clamp(0, 100);

    LevelProgress {
        level,
        level_floor_exp,
        level_span_exp,
        exp_into_level,
        percent: u8::try_from(percent).unwrap_or(100),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_exp_is_level_one() {
        assert_eq!(level_for_experience(0), 1);
    }

    #[test]
    fn boundaries_match_cumulative_thresholds() {
        assert_eq!(level_for_experience(99), 1);
        assert_eq!(level_for_experience(100), 2);
        assert_eq!(level_for_experience(299), 2);
        assert_eq!(level_for_experience(300), 3);
        assert_eq!(level_for_experience(599), 3);
        assert_eq!(level_for_experience(600), 4);
    }

    #[test]
    fn level_is_monotonic_in_exp() {
        let mut previous = level_for_experience(0);
        for exp in (0..600_000).step_by(37) {
            let level = level_for_experience(exp);
            assert!(level >= previous, "level dropped at exp {exp}");
            previous = level;
        }
    }

    #[test]
    fn level_is_capped_at_one_hundred() {
        // Level 100 begins at 100 * (99 * 100 / 2) exp.
        let cap_start = threshold_for_level(MAX_LEVEL);
        assert_eq!(cap_start, 495_000);
        assert_eq!(level_for_experience(cap_start.saturating_sub(1)), 99);
        assert_eq!(level_for_experience(cap_start), 100);
        assert_eq!(level_for_experience(10_000_000), 100);
        assert_eq!(level_for_experience(i64::MAX), 100);
    }

    #[test]
    fn negative_exp_is_level_one() {
        assert_eq!(level_for_experience(-5), 1);
    }

    #[test]
    fn thresholds_agree_with_level_function() {
        for level in 1..=MAX_LEVEL {
            let start = threshold_for_level(level);
            assert_eq!(level_for_experience(start), level);
            if level > 1 {
                assert_eq!(level_for_experience(start.saturating_sub(1)), level.saturating_sub(1));
            }
        }
    }

    #[test]
    fn progress_within_level_three() {
        let progress = level_progress(450);
        assert_eq!(progress.level, 3);
        assert_eq!(progress.level_floor_exp, 300);
        assert_eq!(progress.level_span_exp, 300);
        assert_eq!(progress.exp_into_level, 150);
        assert_eq!(progress.percent, 50);
    }

    #[test]
    fn progress_at_level_start_is_zero() {
        let progress = level_progress(100);
        assert_eq!(progress.level, 2);
        assert_eq!(progress.exp_into_level, 0);
        assert_eq!(progress.percent, 0);
    }

    #[test]
    fn progress_past_cap_is_clamped() {
        let progress = level_progress(5_000_000);
        assert_eq!(progress.level, MAX_LEVEL);
        assert_eq!(progress.percent, 100);
    }
}
