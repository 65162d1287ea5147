//! Pick settlement
//!
//! `grading` and `payout` are pure; `engine` is the effectful shell that
//! reads picks, writes pick results and sends notifications.

pub mod engine;
pub mod grading;
pub mod payout;

pub use engine::{SettlementEngine, SettlementPreview, DEFAULT_EMAIL_CONCURRENCY};
pub use grading::{grade_pick, selection_is_correct, Grade};

use crate::models::{OfficialResult, Pick, PickResult, UserContact};
use crate::store::InsertOutcome;
use anyhow::Result;

/// Data access needed by the settlement engine
#[async_trait::async_trait]
pub trait SettlementStore: Send + Sync {
    async fn list_picks(&self) -> Result<Vec<Pick>>;
    async fn pick_result_exists(&self, pick_id: &str) -> Result<bool>;
    async fn official_results(&self, gp_name: &str) -> Result<Vec<OfficialResult>>;
    /// Must report `AlreadyExists` when a result for the same pick is present
    async fn insert_pick_result(&self, result: &PickResult) -> Result<InsertOutcome>;
    async fn user_contact(&self, user_id: &str) -> Result<Option<UserContact>>;
}
