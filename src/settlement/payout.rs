//! Payout tables
//!
//! Tiered mode pays from a fixed table keyed by the number of selections and
//! the number of correct selections. Counts missing from the table pay nothing.

use crate::models::GameMode;

/// `(total selections, [(correct selections, multiplier)])`
const TIERED_PAYOUTS: &[(u32, &[(u32, f64)])] = &[
    (3, &[(3, 5.0), (2, 1.0)]),
    (4, &[(4, 8.0), (3, 2.0)]),
    (5, &[(5, 15.0), (4, 5.0), (3, 1.0)]),
    (6, &[(6, 30.0), (5, 10.0), (4, 2.0)]),
    (7, &[(7, 60.0), (6, 20.0), (5, 5.0)]),
    (8, &[(8, 100.0), (7, 40.0), (6, 10.0)]),
];

/// All-or-nothing multiplier ladder, keyed by number of selections
const ALL_OR_NOTHING_MULTIPLIERS: &[(u32, f64)] = &[
    (2, 3.0),
    (3, 6.0),
    (4, 10.0),
    (5, 20.0),
    (6, 35.0),
    (7, 60.0),
    (8, 100.0),
];

pub const MAX_SELECTIONS: u32 = 8;

/// Tiered multiplier for `correct` hits out of `total` selections (0.0 when unlisted)
pub fn tiered_multiplier(total: u32, correct: u32) -> f64 {
    TIERED_PAYOUTS
        .iter()
        .find(|(t, _)| *t == total)
        .and_then(|(_, tiers)| tiers.iter().find(|(c, _)| *c == correct))
        .map(|(_, m)| *m)
        .unwrap_or(0.0)
}

/// Multiplier paid by an all-or-nothing pick of `total` selections
pub fn all_or_nothing_multiplier(total: u32) -> Option<f64> {
    ALL_OR_NOTHING_MULTIPLIERS
        .iter()
        .find(|(t, _)| *t == total)
        .map(|(_, m)| *m)
}

/// Multiplier recorded on a new pick. Tiered picks record their top tier.
pub fn quoted_multiplier(mode: GameMode, total: u32) -> Option<f64> {
    match mode {
        GameMode::AllOrNothing => all_or_nothing_multiplier(total),
        GameMode::Tiered => Some(tiered_multiplier(total, total)).filter(|m| *m > 0.0),
    }
}

/// Selection counts accepted for a mode
pub fn selection_bounds(mode: GameMode) -> (u32, u32) {
    match mode {
        GameMode::AllOrNothing => (2, MAX_SELECTIONS),
        GameMode::Tiered => (3, MAX_SELECTIONS),
    }
}

/// Credits paid for `wager` at `multiplier`, rounded to the nearest credit
pub fn payout_amount(wager: i64, multiplier: f64) -> i64 {
    if wager <= 0 || !multiplier.is_finite() || multiplier <= 0.0 {
        return 0;
    }
    (wager as f64 * multiplier).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiered_table_entries() {
        assert_eq!(tiered_multiplier(3, 3), 5.0);
        assert_eq!(tiered_multiplier(3, 2), 1.0);
        assert_eq!(tiered_multiplier(5, 4), 5.0);
        assert_eq!(tiered_multiplier(6, 4), 2.0);
        assert_eq!(tiered_multiplier(8, 8), 100.0);
        assert_eq!(tiered_multiplier(8, 6), 10.0);
    }

    #[test]
    fn test_tiered_missing_entries_pay_nothing() {
        assert_eq!(tiered_multiplier(5, 2), 0.0);
        assert_eq!(tiered_multiplier(3, 0), 0.0);
        assert_eq!(tiered_multiplier(2, 2), 0.0);
        assert_eq!(tiered_multiplier(9, 9), 0.0);
        assert_eq!(tiered_multiplier(0, 0), 0.0);
    }

    #[test]
    fn test_quoted_multiplier() {
        assert_eq!(quoted_multiplier(GameMode::AllOrNothing, 3), Some(6.0));
        assert_eq!(quoted_multiplier(GameMode::AllOrNothing, 1), None);
        assert_eq!(quoted_multiplier(GameMode::Tiered, 5), Some(15.0));
        assert_eq!(quoted_multiplier(GameMode::Tiered, 2), None);
    }

    #[test]
    fn test_payout_amount() {
        assert_eq!(payout_amount(10_000, 6.0), 60_000);
        assert_eq!(payout_amount(20_000, 5.0), 100_000);
        assert_eq!(payout_amount(333, 1.5), 500);
        assert_eq!(payout_amount(100, 0.0), 0);
        assert_eq!(payout_amount(0, 5.0), 0);
        assert_eq!(payout_amount(100, f64::NAN), 0);
    }
}
