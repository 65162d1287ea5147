//! Pure pick grading.
//!
//! No I/O happens here: a pick and the official results of its race event go
//! in, the counts, classification and payout come out.

use crate::models::{Classification, Direction, GameMode, OfficialResult, Pick, Selection};
use crate::settlement::payout::{payout_amount, tiered_multiplier};

/// Result of grading one pick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grade {
    pub correct_count: u32,
    pub total_picks: u32,
    pub result: Classification,
    pub payout: i64,
}

fn same_driver(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Whether a selection hit. Unknown drivers and missing positions never hit,
/// and a position equal to the line never hits in either direction.
pub fn selection_is_correct(selection: &Selection, results: &[OfficialResult]) -> bool {
    let Some(official) = results
        .iter()
        .find(|r| same_driver(&r.driver_name, &selection.driver))
    else {
        return false;
    };

    let Some(position) = official.position_for(selection.session_type) else {
        return false;
    };

    let position = position as f64;
    match selection.direction {
        Direction::Better => position < selection.line,
        Direction::Worse => position > selection.line,
    }
}

/// Classification and payout for a mode given the hit counts
pub fn classify(
    mode: GameMode,
    wager_amount: i64,
    multiplier: f64,
    correct_count: u32,
    total_picks: u32,
) -> (Classification, i64) {
    if total_picks == 0 {
        return (Classification::Lost, 0);
    }

    let (multiplier, result) = match mode {
        GameMode::AllOrNothing => {
            if correct_count != total_picks {
                return (Classification::Lost, 0);
            }
            (multiplier, Classification::Won)
        }
        GameMode::Tiered => {
            let m = tiered_multiplier(total_picks, correct_count);
            let result = if correct_count == total_picks {
                Classification::Won
            } else {
                Classification::Partial
            };
            (m, result)
        }
    };

    match payout_amount(wager_amount, multiplier) {
        0 => (Classification::Lost, 0),
        payout => (result, payout),
    }
}

/// Grade a pick against the official results of its race event
pub fn grade_pick(pick: &Pick, results: &[OfficialResult]) -> Grade {
    let total_picks = pick.selections.len() as u32;
    let correct_count = pick
        .selections
        .iter()
        .filter(|s| selection_is_correct(s, results))
        .count() as u32;

    let (result, payout) = classify(
        pick.mode,
        pick.wager_amount,
        pick.multiplier,
        correct_count,
        total_picks,
    );

    Grade {
        correct_count,
        total_picks,
        result,
        payout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionType;
    use chrono::Utc;

    fn official(driver: &str, qualy: Option<i64>, race: Option<i64>) -> OfficialResult {
        OfficialResult {
            gp_name: "Monaco".to_string(),
            driver_name: driver.to_string(),
            qualy_position: qualy,
            race_position: race,
        }
    }

    fn race_selection(driver: &str, line: f64, direction: Direction) -> Selection {
        Selection {
            driver: driver.to_string(),
            session_type: SessionType::Race,
            line,
            direction,
        }
    }

    fn pick(mode: GameMode, wager: i64, multiplier: f64, selections: Vec<Selection>) -> Pick {
        Pick {
            id: "pick-1".to_string(),
            user_id: "user-1".to_string(),
            gp_name: "Monaco".to_string(),
            session_type: SessionType::Race,
            selections,
            wager_amount: wager,
            multiplier,
            mode,
            created_at: Utc::now(),
        }
    }

    fn grid() -> Vec<OfficialResult> {
        vec![
            official("Verstappen", Some(1), Some(1)),
            official("Norris", Some(2), Some(3)),
            official("Leclerc", Some(3), Some(5)),
            official("Sainz", Some(4), Some(2)),
            official("Hamilton", Some(7), Some(9)),
            official("Alonso", Some(10), None),
        ]
    }

    #[test]
    fn test_line_is_a_strict_threshold() {
        let results = grid();
        assert!(!selection_is_correct(
            &race_selection("Leclerc", 5.0, Direction::Better),
            &results
        ));
        assert!(!selection_is_correct(
            &race_selection("Leclerc", 5.0, Direction::Worse),
            &results
        ));
        assert!(selection_is_correct(
            &race_selection("Leclerc", 5.5, Direction::Better),
            &results
        ));
        assert!(selection_is_correct(
            &race_selection("Leclerc", 4.5, Direction::Worse),
            &results
        ));
    }

    #[test]
    fn test_session_type_selects_position() {
        let results = grid();
        let qualy = Selection {
            driver: "Sainz".to_string(),
            session_type: SessionType::Qualifying,
            line: 3.5,
            direction: Direction::Worse,
        };
        assert!(selection_is_correct(&qualy, &results));
        assert!(!selection_is_correct(
            &race_selection("Sainz", 3.5, Direction::Worse),
            &results
        ));
    }

    #[test]
    fn test_unresolvable_selections_never_hit() {
        let results = grid();
        // No race position recorded
        assert!(!selection_is_correct(
            &race_selection("Alonso", 20.0, Direction::Better),
            &results
        ));
        // Unknown driver
        assert!(!selection_is_correct(
            &race_selection("Senna", 20.0, Direction::Better),
            &results
        ));
        // No results at all
        assert!(!selection_is_correct(
            &race_selection("Norris", 10.0, Direction::Better),
            &[]
        ));
    }

    #[test]
    fn test_driver_match_ignores_case_and_whitespace() {
        let results = grid();
        assert!(selection_is_correct(
            &race_selection("  verstappen ", 1.5, Direction::Better),
            &results
        ));
    }

    #[test]
    fn test_all_or_nothing_all_correct_wins() {
        let p = pick(
            GameMode::AllOrNothing,
            10_000,
            6.0,
            vec![
                race_selection("Verstappen", 2.5, Direction::Better),
                race_selection("Hamilton", 6.5, Direction::Worse),
                race_selection("Sainz", 3.5, Direction::Better),
            ],
        );
        let grade = grade_pick(&p, &grid());
        assert_eq!(grade.correct_count, 3);
        assert_eq!(grade.total_picks, 3);
        assert_eq!(grade.result, Classification::Won);
        assert_eq!(grade.payout, 60_000);
    }

    #[test]
    fn test_all_or_nothing_one_miss_loses() {
        let p = pick(
            GameMode::AllOrNothing,
            10_000,
            6.0,
            vec![
                race_selection("Verstappen", 2.5, Direction::Better),
                race_selection("Hamilton", 6.5, Direction::Worse),
                race_selection("Sainz", 1.5, Direction::Better),
            ],
        );
        let grade = grade_pick(&p, &grid());
        assert_eq!(grade.correct_count, 2);
        assert_eq!(grade.result, Classification::Lost);
        assert_eq!(grade.payout, 0);
    }

    #[test]
    fn test_unresolvable_selection_counts_toward_total() {
        let p = pick(
            GameMode::AllOrNothing,
            1_000,
            3.0,
            vec![
                race_selection("Verstappen", 2.5, Direction::Better),
                race_selection("Alonso", 20.0, Direction::Better),
            ],
        );
        let grade = grade_pick(&p, &grid());
        assert_eq!(grade.correct_count, 1);
        assert_eq!(grade.total_picks, 2);
        assert_eq!(grade.result, Classification::Lost);
    }

    #[test]
    fn test_tiered_partial_credit() {
        // 4 of 5 correct
        let p = pick(
            GameMode::Tiered,
            20_000,
            15.0,
            vec![
                race_selection("Verstappen", 2.5, Direction::Better),
                race_selection("Norris", 4.5, Direction::Better),
                race_selection("Leclerc", 4.5, Direction::Worse),
                race_selection("Sainz", 2.5, Direction::Better),
                race_selection("Hamilton", 9.5, Direction::Worse),
            ],
        );
        let grade = grade_pick(&p, &grid());
        assert_eq!(grade.correct_count, 4);
        assert_eq!(grade.total_picks, 5);
        assert_eq!(grade.result, Classification::Partial);
        assert_eq!(grade.payout, 100_000);
    }

    #[test]
    fn test_tiered_below_table_loses() {
        assert_eq!(
            classify(GameMode::Tiered, 20_000, 15.0, 2, 5),
            (Classification::Lost, 0)
        );
    }

    #[test]
    fn test_tiered_all_correct_wins_top_tier() {
        assert_eq!(
            classify(GameMode::Tiered, 1_000, 0.0, 3, 3),
            (Classification::Won, 5_000)
        );
    }

    #[test]
    fn test_tiered_ignores_pick_multiplier() {
        assert_eq!(
            classify(GameMode::Tiered, 1_000, 999.0, 3, 4),
            (Classification::Partial, 2_000)
        );
    }

    #[test]
    fn test_empty_pick_is_lost() {
        let p = pick(GameMode::AllOrNothing, 1_000, 3.0, vec![]);
        let grade = grade_pick(&p, &grid());
        assert_eq!(grade.total_picks, 0);
        assert_eq!(grade.result, Classification::Lost);
        assert_eq!(grade.payout, 0);
    }

    #[test]
    fn test_grade_invariants_hold_across_counts() {
        for total in 0..=9u32 {
            for correct in 0..=total {
                for mode in [GameMode::AllOrNothing, GameMode::Tiered] {
                    let (result, payout) = classify(mode, 5_000, 4.0, correct, total);
                    if result == Classification::Lost {
                        assert_eq!(payout, 0);
                    } else {
                        assert!(payout > 0);
                    }
                    if mode == GameMode::AllOrNothing {
                        assert_eq!(payout > 0, total > 0 && correct == total);
                    } else {
                        let expected = payout_amount(5_000, tiered_multiplier(total, correct));
                        assert_eq!(payout, expected);
                    }
                }
            }
        }
    }
}
