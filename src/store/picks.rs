use super::{now_rfc3339, parse_ts, wallet, InsertOutcome, PicksDb};
use crate::models::{
    Classification, GameMode, OfficialResult, Pick, PickResult, SessionType, UserContact,
};
use crate::settlement::SettlementStore;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

const PICK_COLUMNS: &str = "id, user_id, gp_name, session_type, selections_json, wager_amount, \
                            multiplier, mode, created_at";

const RESULT_COLUMNS: &str = "id, pick_id, user_id, gp_name, session_type, selections_json, \
                              correct_count, total_picks, mode, result, payout, processed_at";

struct PickRow {
    id: String,
    user_id: String,
    gp_name: String,
    session_type: String,
    selections_json: String,
    wager_amount: i64,
    multiplier: f64,
    mode: String,
    created_at: String,
}

impl PickRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            gp_name: row.get(2)?,
            session_type: row.get(3)?,
            selections_json: row.get(4)?,
            wager_amount: row.get(5)?,
            multiplier: row.get(6)?,
            mode: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_pick(self) -> Result<Pick> {
        let selections = serde_json::from_str(&self.selections_json)
            .with_context(|| format!("Corrupt selections for pick {}", self.id))?;
        Ok(Pick {
            session_type: SessionType::from_str(&self.session_type)
                .ok_or_else(|| anyhow!("Unknown session type {}", self.session_type))?,
            mode: GameMode::from_str(&self.mode)
                .ok_or_else(|| anyhow!("Unknown game mode {}", self.mode))?,
            created_at: parse_ts(&self.created_at)?,
            selections,
            id: self.id,
            user_id: self.user_id,
            gp_name: self.gp_name,
            wager_amount: self.wager_amount,
            multiplier: self.multiplier,
        })
    }
}

struct ResultRow {
    id: String,
    pick_id: String,
    user_id: String,
    gp_name: String,
    session_type: String,
    selections_json: String,
    correct_count: u32,
    total_picks: u32,
    mode: String,
    result: String,
    payout: i64,
    processed_at: String,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            pick_id: row.get(1)?,
            user_id: row.get(2)?,
            gp_name: row.get(3)?,
            session_type: row.get(4)?,
            selections_json: row.get(5)?,
            correct_count: row.get(6)?,
            total_picks: row.get(7)?,
            mode: row.get(8)?,
            result: row.get(9)?,
            payout: row.get(10)?,
            processed_at: row.get(11)?,
        })
    }

    fn into_result(self) -> Result<PickResult> {
        Ok(PickResult {
            selections: serde_json::from_str(&self.selections_json)
                .with_context(|| format!("Corrupt selections for pick result {}", self.id))?,
            session_type: SessionType::from_str(&self.session_type)
                .ok_or_else(|| anyhow!("Unknown session type {}", self.session_type))?,
            mode: GameMode::from_str(&self.mode)
                .ok_or_else(|| anyhow!("Unknown game mode {}", self.mode))?,
            result: Classification::from_str(&self.result)
                .ok_or_else(|| anyhow!("Unknown classification {}", self.result))?,
            processed_at: parse_ts(&self.processed_at)?,
            id: self.id,
            pick_id: self.pick_id,
            user_id: self.user_id,
            gp_name: self.gp_name,
            correct_count: self.correct_count,
            total_picks: self.total_picks,
            payout: self.payout,
        })
    }
}

fn insert_pick_row(conn: &rusqlite::Connection, pick: &Pick, selections_json: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO picks
         (id, user_id, gp_name, session_type, selections_json, wager_amount, multiplier, mode,
          created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            pick.id,
            pick.user_id,
            pick.gp_name,
            pick.session_type.as_str(),
            selections_json,
            pick.wager_amount,
            pick.multiplier,
            pick.mode.as_str(),
            pick.created_at.to_rfc3339(),
        ],
    )
    .context("Failed to insert pick")?;
    Ok(())
}

impl PicksDb {
    /// Store a pick without touching the wallet
    pub fn insert_pick(&self, pick: &Pick) -> Result<()> {
        let selections_json = serde_json::to_string(&pick.selections)?;
        let conn = self.conn.lock();
        insert_pick_row(&conn, pick, &selections_json)
    }

    /// Store a pick and debit its wager from the user's wallet atomically.
    /// Returns the wallet balance after the debit.
    pub fn insert_pick_with_wager(&self, pick: &Pick) -> Result<i64> {
        let selections_json = serde_json::to_string(&pick.selections)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let balance = wallet::apply_entry(
            &tx,
            &pick.user_id,
            "wager",
            -pick.wager_amount,
            Some(&pick.id),
        )?;
        insert_pick_row(&tx, pick, &selections_json)?;

        tx.commit().context("Failed to commit pick submission")?;
        Ok(balance)
    }

    /// All picks, oldest first
    pub fn all_picks(&self) -> Result<Vec<Pick>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM picks ORDER BY created_at ASC, id ASC",
            PICK_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], PickRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(PickRow::into_pick).collect()
    }

    pub fn has_pick_result(&self, pick_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM pick_results WHERE pick_id = ?1 LIMIT 1",
                params![pick_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert or replace the official results of a race event
    pub fn upsert_official_results(
        &self,
        gp_name: &str,
        results: &[OfficialResult],
    ) -> Result<usize> {
        let now = now_rfc3339();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO official_results
                 (gp_name, driver_name, qualy_position, race_position, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(gp_name, driver_name) DO UPDATE SET
                    qualy_position = excluded.qualy_position,
                    race_position = excluded.race_position,
                    updated_at = excluded.updated_at",
            )?;
            for r in results {
                written += stmt.execute(params![
                    gp_name.trim(),
                    r.driver_name.trim(),
                    r.qualy_position,
                    r.race_position,
                    now,
                ])?;
            }
        }
        tx.commit().context("Failed to commit official results")?;
        debug!(gp_name, written, "Official results upserted");
        Ok(written)
    }

    pub fn results_for_gp(&self, gp_name: &str) -> Result<Vec<OfficialResult>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT gp_name, driver_name, qualy_position, race_position
             FROM official_results WHERE gp_name = ?1 ORDER BY driver_name",
        )?;
        let results = stmt
            .query_map(params![gp_name.trim()], |row| {
                Ok(OfficialResult {
                    gp_name: row.get(0)?,
                    driver_name: row.get(1)?,
                    qualy_position: row.get(2)?,
                    race_position: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    /// Insert a pick result. A result for the same pick is never overwritten.
    pub fn save_pick_result(&self, result: &PickResult) -> Result<InsertOutcome> {
        let selections_json = serde_json::to_string(&result.selections)?;
        let conn = self.conn.lock();
        let changes = conn
            .execute(
                "INSERT INTO pick_results
                 (id, pick_id, user_id, gp_name, session_type, selections_json, correct_count,
                  total_picks, mode, result, payout, processed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(pick_id) DO NOTHING",
                params![
                    result.id,
                    result.pick_id,
                    result.user_id,
                    result.gp_name,
                    result.session_type.as_str(),
                    selections_json,
                    result.correct_count,
                    result.total_picks,
                    result.mode.as_str(),
                    result.result.as_str(),
                    result.payout,
                    result.processed_at.to_rfc3339(),
                ],
            )
            .context("Failed to insert pick result")?;

        Ok(if changes == 0 {
            InsertOutcome::AlreadyExists
        } else {
            InsertOutcome::Inserted
        })
    }

    pub fn pick_result_for_pick(&self, pick_id: &str) -> Result<Option<PickResult>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM pick_results WHERE pick_id = ?1", RESULT_COLUMNS),
                params![pick_id],
                ResultRow::from_row,
            )
            .optional()?;
        row.map(ResultRow::into_result).transpose()
    }

    /// Most recent pick results of a user
    pub fn pick_results_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<PickResult>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM pick_results WHERE user_id = ?1
             ORDER BY processed_at DESC LIMIT ?2",
            RESULT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], ResultRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ResultRow::into_result).collect()
    }

    pub fn count_pick_results(&self) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM pick_results", [], |row| row.get(0))?)
    }

    /// Mirror a user's contact details from the identity provider
    pub fn upsert_user(
        &self,
        user_id: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, email, display_name, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                display_name = COALESCE(excluded.display_name, users.display_name)",
            params![user_id, email, display_name, now_rfc3339()],
        )
        .context("Failed to upsert user")?;
        Ok(())
    }

    pub fn contact_for_user(&self, user_id: &str) -> Result<Option<UserContact>> {
        let conn = self.conn.lock();
        let contact = conn
            .query_row(
                "SELECT email, display_name FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(UserContact {
                        email: row.get(0)?,
                        display_name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(contact.filter(|c| !c.email.trim().is_empty()))
    }
}

#[async_trait::async_trait]
impl SettlementStore for PicksDb {
    async fn list_picks(&self) -> Result<Vec<Pick>> {
        self.all_picks()
    }

    async fn pick_result_exists(&self, pick_id: &str) -> Result<bool> {
        self.has_pick_result(pick_id)
    }

    async fn official_results(&self, gp_name: &str) -> Result<Vec<OfficialResult>> {
        self.results_for_gp(gp_name)
    }

    async fn insert_pick_result(&self, result: &PickResult) -> Result<InsertOutcome> {
        self.save_pick_result(result)
    }

    async fn user_contact(&self, user_id: &str) -> Result<Option<UserContact>> {
        self.contact_for_user(user_id)
    }
}
