//! Pick submission
//!
//! Turns a user's request into an immutable `Pick`. The multiplier is always
//! derived server-side from the mode and selection count.

use crate::models::{GameMode, Pick, Selection, SessionType};
use crate::settlement::payout::{quoted_multiplier, selection_bounds};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

/// Largest single wager accepted, in credits
pub const MAX_WAGER: i64 = 10_000_000;

#[derive(Debug, Clone, Deserialize)]
pub struct NewPick {
    pub gp_name: String,
    pub session_type: SessionType,
    pub selections: Vec<Selection>,
    pub wager_amount: i64,
    pub mode: GameMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickValidationError {
    MissingGrandPrix,
    InvalidWager(i64),
    SelectionCount { mode: GameMode, count: usize, min: u32, max: u32 },
    BlankDriver,
    InvalidLine(String),
    DuplicateDriver(String),
}

impl std::fmt::Display for PickValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PickValidationError::MissingGrandPrix => write!(f, "gp_name is required"),
            PickValidationError::InvalidWager(w) => {
                write!(f, "Wager must be between 1 and {} credits, got {}", MAX_WAGER, w)
            }
            PickValidationError::SelectionCount {
                mode,
                count,
                min,
                max,
            } => write!(
                f,
                "{} picks need {}-{} selections, got {}",
                mode.label(),
                min,
                max,
                count
            ),
            PickValidationError::BlankDriver => write!(f, "Every selection needs a driver"),
            PickValidationError::InvalidLine(d) => write!(f, "Invalid line for {}", d),
            PickValidationError::DuplicateDriver(d) => {
                write!(f, "{} is selected more than once for the same session", d)
            }
        }
    }
}

impl std::error::Error for PickValidationError {}

impl NewPick {
    /// Validate and build the pick owned by `user_id`
    pub fn into_pick(self, user_id: &str) -> Result<Pick, PickValidationError> {
        let gp_name = self.gp_name.trim().to_string();
        if gp_name.is_empty() {
            return Err(PickValidationError::MissingGrandPrix);
        }
        if self.wager_amount <= 0 || self.wager_amount > MAX_WAGER {
            return Err(PickValidationError::InvalidWager(self.wager_amount));
        }

        let (min, max) = selection_bounds(self.mode);
        let count = self.selections.len();
        if count < min as usize || count > max as usize {
            return Err(PickValidationError::SelectionCount {
                mode: self.mode,
                count,
                min,
                max,
            });
        }

        let mut seen = HashSet::with_capacity(count);
        let mut selections = Vec::with_capacity(count);
        for mut s in self.selections {
            s.driver = s.driver.trim().to_string();
            if s.driver.is_empty() {
                return Err(PickValidationError::BlankDriver);
            }
            if !s.line.is_finite() || s.line <= 0.0 {
                return Err(PickValidationError::InvalidLine(s.driver));
            }
            if !seen.insert((s.driver.to_lowercase(), s.session_type)) {
                return Err(PickValidationError::DuplicateDriver(s.driver));
            }
            selections.push(s);
        }

        let multiplier = quoted_multiplier(self.mode, count as u32).ok_or(
            PickValidationError::SelectionCount {
                mode: self.mode,
                count,
                min,
                max,
            },
        )?;

        Ok(Pick {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            gp_name,
            session_type: self.session_type,
            selections,
            wager_amount: self.wager_amount,
            multiplier,
            mode: self.mode,
            created_at: Utc::now(),
        })
    }
}
