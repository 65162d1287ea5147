//! Domain models shared by the store, the settlement engine and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session a selection (or a whole pick) refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SessionType {
    #[serde(rename = "qualy", alias = "qualifying")]
    Qualifying,
    #[serde(rename = "race")]
    Race,
}

impl SessionType {
    pub fn as_str(&self) -> &str {
        match self {
            SessionType::Qualifying => "qualy",
            SessionType::Race => "race",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "qualy" | "qualifying" => Some(SessionType::Qualifying),
            "race" => Some(SessionType::Race),
            _ => None,
        }
    }
}

/// Which side of the line a selection backs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    /// Finishes ahead of the line (numerically lower position)
    #[serde(rename = "mejor", alias = "better")]
    Better,
    /// Finishes behind the line (numerically higher position)
    #[serde(rename = "peor", alias = "worse")]
    Worse,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    AllOrNothing,
    Tiered,
}

impl GameMode {
    pub fn as_str(&self) -> &str {
        match self {
            GameMode::AllOrNothing => "all_or_nothing",
            GameMode::Tiered => "tiered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all_or_nothing" => Some(GameMode::AllOrNothing),
            "tiered" => Some(GameMode::Tiered),
            _ => None,
        }
    }

    /// Human readable label used in notifications
    pub fn label(&self) -> &str {
        match self {
            GameMode::AllOrNothing => "All or nothing",
            GameMode::Tiered => "Tiered",
        }
    }
}

/// Outcome of a graded pick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Won,
    Partial,
    Lost,
}

impl Classification {
    pub fn as_str(&self) -> &str {
        match self {
            Classification::Won => "won",
            Classification::Partial => "partial",
            Classification::Lost => "lost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "won" => Some(Classification::Won),
            "partial" => Some(Classification::Partial),
            "lost" => Some(Classification::Lost),
            _ => None,
        }
    }
}

/// A single prediction inside a pick
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Selection {
    pub driver: String,
    pub session_type: SessionType,
    pub line: f64,
    pub direction: Direction,
}

/// A user's wager on a race event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    pub id: String,
    pub user_id: String,
    pub gp_name: String,
    pub session_type: SessionType,
    pub selections: Vec<Selection>,
    /// Stake in credits
    pub wager_amount: i64,
    pub multiplier: f64,
    pub mode: GameMode,
    pub created_at: DateTime<Utc>,
}

/// Official classification of one driver at one race event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfficialResult {
    pub gp_name: String,
    pub driver_name: String,
    pub qualy_position: Option<i64>,
    pub race_position: Option<i64>,
}

impl OfficialResult {
    pub fn position_for(&self, session: SessionType) -> Option<i64> {
        match session {
            SessionType::Qualifying => self.qualy_position,
            SessionType::Race => self.race_position,
        }
    }
}

/// Persisted settlement outcome of a pick. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickResult {
    pub id: String,
    pub pick_id: String,
    pub user_id: String,
    pub gp_name: String,
    pub session_type: SessionType,
    pub selections: Vec<Selection>,
    pub correct_count: u32,
    pub total_picks: u32,
    pub mode: GameMode,
    pub result: Classification,
    pub payout: i64,
    pub processed_at: DateTime<Utc>,
}

/// Per-pick line of a settlement run report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementSummary {
    pub pick_id: String,
    pub result: Classification,
    pub payout: i64,
}

/// Notification address of a user, mirrored from the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContact {
    pub email: String,
    pub display_name: Option<String>,
}
