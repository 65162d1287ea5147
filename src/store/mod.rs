//! SQLite-backed storage for picks, official results, pick results,
//! user contacts, wallets, promo codes and payment orders.
//!
//! - WAL mode so API reads are not blocked by settlement writes
//! - `pick_results.pick_id` is UNIQUE: a second insert for the same pick is
//!   reported as already settled instead of creating a duplicate
//! - Wallet balance changes always write a ledger row in the same transaction

mod picks;
mod wallet;

pub use wallet::{LedgerEntry, LedgerError, PromoCode, WalletSnapshot};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::sync::Arc;
use tracing::{info, warn};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    display_name TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS picks (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    gp_name TEXT NOT NULL COLLATE NOCASE,
    session_type TEXT NOT NULL,
    selections_json TEXT NOT NULL,
    wager_amount INTEGER NOT NULL,
    multiplier REAL NOT NULL,
    mode TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_picks_user ON picks(user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_picks_created ON picks(created_at ASC);

-- Grand Prix and driver names match case-insensitively
CREATE TABLE IF NOT EXISTS official_results (
    gp_name TEXT NOT NULL COLLATE NOCASE,
    driver_name TEXT NOT NULL COLLATE NOCASE,
    qualy_position INTEGER,
    race_position INTEGER,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (gp_name, driver_name)
);

CREATE TABLE IF NOT EXISTS pick_results (
    id TEXT PRIMARY KEY,
    pick_id TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    gp_name TEXT NOT NULL,
    session_type TEXT NOT NULL,
    selections_json TEXT NOT NULL,
    correct_count INTEGER NOT NULL,
    total_picks INTEGER NOT NULL,
    mode TEXT NOT NULL,
    result TEXT NOT NULL,
    payout INTEGER NOT NULL,
    processed_at TEXT NOT NULL,
    CHECK (correct_count <= total_picks),
    CHECK (result != 'lost' OR payout = 0)
);

CREATE INDEX IF NOT EXISTS idx_pick_results_user ON pick_results(user_id, processed_at DESC);

CREATE TABLE IF NOT EXISTS wallets (
    user_id TEXT PRIMARY KEY,
    balance INTEGER NOT NULL CHECK (balance >= 0),
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS wallet_ledger (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    amount INTEGER NOT NULL,
    reference TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_wallet_ledger_user ON wallet_ledger(user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS promo_codes (
    code TEXT PRIMARY KEY,
    credit_amount INTEGER NOT NULL CHECK (credit_amount > 0),
    max_redemptions INTEGER NOT NULL,
    redemptions INTEGER NOT NULL DEFAULT 0,
    expires_at TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS promo_redemptions (
    code TEXT NOT NULL,
    user_id TEXT NOT NULL,
    redeemed_at TEXT NOT NULL,
    PRIMARY KEY (code, user_id)
);

CREATE TABLE IF NOT EXISTS payment_orders (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    credits INTEGER NOT NULL,
    status TEXT NOT NULL,
    provider_ref TEXT UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_payment_orders_user ON payment_orders(user_id, created_at DESC);
"#;

/// Result of an idempotent insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row for the same key already existed; nothing was written
    AlreadyExists,
}

/// Application database
#[derive(Clone)]
pub struct PicksDb {
    conn: Arc<Mutex<Connection>>,
}

impl PicksDb {
    /// Open (or create) the database and apply the schema
    pub fn new(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize database schema")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        let pending: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM picks p
                 WHERE NOT EXISTS (SELECT 1 FROM pick_results r WHERE r.pick_id = p.id)",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        info!(db_path, unsettled_picks = pending, "🗄️ Picks database ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp in database: {}", raw))?
        .with_timezone(&Utc))
}
