//! Star rating for a finished level

/// Stars earned for a run.
///
/// 0 when the target was missed. 3 for doubling the target or finishing
/// with at least half the moves left. 2 for reaching 150% of the target.
/// Otherwise 1.
pub fn calculate_stars(score: u64, target_score: u64, moves_used: u32, total_moves: u32) -> u8 {
    if score < target_score {
        return 0;
    }

    let score = score as f64;
    let target = target_score as f64;

    if score >= target * 2.0 {
        return 3;
    }
    if f64::from(moves_used) <= f64::from(total_moves) * 0.5 {
        return 3;
    }
    if score >= target * 1.5 {
        return 2;
    }
    1
}

/// One row of the reference table: (score, target, moves used, total moves, stars)
pub type StarCase = (u64, u64, u32, u32, u8);

/// Reference cases from the star rating design notes
pub const REFERENCE_CASES: &[StarCase] = &[
    (9000, 10000, 10, 20, 0),
    (10000, 10000, 20, 20, 1),
    (15000, 10000, 20, 20, 2),
    (20000, 10000, 20, 20, 3),
    (13000, 10000, 8, 20, 3),
    (16000, 10000, 9, 20, 3),
    (18000, 10000, 11, 20, 2),
    (21000, 10000, 15, 20, 3),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_cases() {
        for &(score, target, used, total, expected) in REFERENCE_CASES {
            assert_eq!(
                calculate_stars(score, target, used, total),
                expected,
                "score={score} target={target} moves={used}/{total}"
            );
        }
    }

    #[test]
    fn test_exactly_half_moves_is_three() {
        assert_eq!(calculate_stars(10000, 10000, 10, 20), 3);
        assert_eq!(calculate_stars(10000, 10000, 11, 20), 1);
    }

    #[test]
    fn test_missed_target_ignores_moves() {
        assert_eq!(calculate_stars(0, 1, 0, 20), 0);
    }

    #[test]
    fn test_zero_target() {
        assert_eq!(calculate_stars(0, 0, 20, 20), 3);
    }
}
