use super::{now_rfc3339, parse_ts, PicksDb};
use crate::payments::{OrderStatus, PaymentOrder, PaymentProvider};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Business-rule rejections from wallet, promo and order operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    InsufficientFunds { balance: i64, requested: i64 },
    PromoNotFound,
    PromoInactive,
    PromoExpired,
    PromoExhausted,
    PromoAlreadyRedeemed,
    PromoExists,
    OrderNotFound,
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::InsufficientFunds { balance, requested } => write!(
                f,
                "Insufficient balance: {} available, {} requested",
                balance, requested
            ),
            LedgerError::PromoNotFound => write!(f, "Promo code not found"),
            LedgerError::PromoInactive => write!(f, "Promo code is not active"),
            LedgerError::PromoExpired => write!(f, "Promo code has expired"),
            LedgerError::PromoExhausted => write!(f, "Promo code has no redemptions left"),
            LedgerError::PromoAlreadyRedeemed => write!(f, "Promo code already redeemed"),
            LedgerError::PromoExists => write!(f, "Promo code already exists"),
            LedgerError::OrderNotFound => write!(f, "Order not found"),
            LedgerError::InvalidTransition { from, to } => write!(
                f,
                "Order cannot move from {} to {}",
                from.as_str(),
                to.as_str()
            ),
        }
    }
}

impl std::error::Error for LedgerError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub kind: String,
    pub amount: i64,
    pub reference: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletSnapshot {
    pub user_id: String,
    pub balance: i64,
    pub recent: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    pub credit_amount: i64,
    pub max_redemptions: i64,
    #[serde(default)]
    pub redemptions: i64,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Apply a signed amount to a wallet and record it in the ledger.
/// Must run inside a transaction; returns the new balance.
pub(super) fn apply_entry(
    conn: &Connection,
    user_id: &str,
    kind: &str,
    amount: i64,
    reference: Option<&str>,
) -> Result<i64> {
    let balance: i64 = conn
        .query_row(
            "SELECT balance FROM wallets WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    let new_balance = balance
        .checked_add(amount)
        .ok_or_else(|| anyhow!("Wallet balance overflow for {}", user_id))?;
    if new_balance < 0 {
        return Err(LedgerError::InsufficientFunds {
            balance,
            requested: -amount,
        }
        .into());
    }

    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO wallets (user_id, balance, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET
            balance = excluded.balance,
            updated_at = excluded.updated_at",
        params![user_id, new_balance, now],
    )?;
    conn.execute(
        "INSERT INTO wallet_ledger (id, user_id, kind, amount, reference, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![Uuid::new_v4().to_string(), user_id, kind, amount, reference, now],
    )?;

    Ok(new_balance)
}

struct OrderRow {
    id: String,
    user_id: String,
    provider: String,
    amount_cents: i64,
    credits: i64,
    status: String,
    provider_ref: Option<String>,
    created_at: String,
    updated_at: String,
}

impl OrderRow {
    fn into_order(self) -> Result<PaymentOrder> {
        Ok(PaymentOrder {
            provider: PaymentProvider::from_str(&self.provider)
                .ok_or_else(|| anyhow!("Unknown payment provider {}", self.provider))?,
            status: OrderStatus::from_str(&self.status)
                .ok_or_else(|| anyhow!("Unknown order status {}", self.status))?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            id: self.id,
            user_id: self.user_id,
            amount_cents: self.amount_cents,
            credits: self.credits,
            provider_ref: self.provider_ref,
        })
    }
}

fn load_order(conn: &Connection, order_id: &str) -> Result<PaymentOrder> {
    let row = conn
        .query_row(
            "SELECT id, user_id, provider, amount_cents, credits, status, provider_ref,
                    created_at, updated_at
             FROM payment_orders WHERE id = ?1",
            params![order_id],
            |row| {
                Ok(OrderRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    provider: row.get(2)?,
                    amount_cents: row.get(3)?,
                    credits: row.get(4)?,
                    status: row.get(5)?,
                    provider_ref: row.get(6)?,
                    created_at: row.get(7)?,
                    updated_at: row.get(8)?,
                })
            },
        )
        .optional()?;
    row.ok_or(LedgerError::OrderNotFound)?.into_order()
}

fn set_order_status(
    conn: &Connection,
    order: &PaymentOrder,
    next: OrderStatus,
    provider_ref: Option<&str>,
) -> Result<()> {
    if !order.status.can_transition_to(next) {
        return Err(LedgerError::InvalidTransition {
            from: order.status,
            to: next,
        }
        .into());
    }
    let changes = conn.execute(
        "UPDATE payment_orders
         SET status = ?1, provider_ref = COALESCE(?2, provider_ref), updated_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            next.as_str(),
            provider_ref,
            now_rfc3339(),
            order.id,
            order.status.as_str()
        ],
    )?;
    if changes == 0 {
        return Err(anyhow!("Order {} changed concurrently", order.id));
    }
    Ok(())
}

impl PicksDb {
    pub fn wallet_balance(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock();
        let balance = conn
            .query_row(
                "SELECT balance FROM wallets WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(balance.unwrap_or(0))
    }

    /// Balance plus the most recent ledger entries
    pub fn wallet_snapshot(&self, user_id: &str, ledger_limit: usize) -> Result<WalletSnapshot> {
        let balance = self.wallet_balance(user_id)?;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, kind, amount, reference, created_at FROM wallet_ledger
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let recent = stmt
            .query_map(params![user_id, ledger_limit as i64], |row| {
                Ok(LedgerEntry {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    amount: row.get(2)?,
                    reference: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(WalletSnapshot {
            user_id: user_id.to_string(),
            balance,
            recent,
        })
    }

    /// Sum of all ledger entries of a user; always equals the wallet balance
    pub fn ledger_total(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM wallet_ledger WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    /// Add (or with a negative amount, remove) credits
    pub fn adjust_wallet(
        &self,
        user_id: &str,
        kind: &str,
        amount: i64,
        reference: Option<&str>,
    ) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let balance = apply_entry(&tx, user_id, kind, amount, reference)?;
        tx.commit().context("Failed to commit wallet adjustment")?;
        Ok(balance)
    }

    pub fn create_promo(&self, promo: &PromoCode) -> Result<()> {
        let conn = self.conn.lock();
        let changes = conn
            .execute(
                "INSERT INTO promo_codes
                 (code, credit_amount, max_redemptions, redemptions, expires_at, active, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6)
                 ON CONFLICT(code) DO NOTHING",
                params![
                    promo.code.trim().to_uppercase(),
                    promo.credit_amount,
                    promo.max_redemptions,
                    promo.expires_at.map(|t| t.to_rfc3339()),
                    promo.active,
                    now_rfc3339(),
                ],
            )
            .context("Failed to insert promo code")?;
        if changes == 0 {
            return Err(LedgerError::PromoExists.into());
        }
        info!(code = %promo.code, credit = promo.credit_amount, "🎟️ Promo code created");
        Ok(())
    }

    pub fn get_promo(&self, code: &str) -> Result<Option<PromoCode>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT code, credit_amount, max_redemptions, redemptions, expires_at, active
                 FROM promo_codes WHERE code = ?1",
                params![code.trim().to_uppercase()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, bool>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(
            |(code, credit_amount, max_redemptions, redemptions, expires_at, active)| {
                Ok(PromoCode {
                    code,
                    credit_amount,
                    max_redemptions,
                    redemptions,
                    expires_at: expires_at.as_deref().map(parse_ts).transpose()?,
                    active,
                })
            },
        )
        .transpose()
    }

    /// Redeem a promo code for a user; returns the new wallet balance
    pub fn redeem_promo(&self, user_id: &str, code: &str) -> Result<i64> {
        let code = code.trim().to_uppercase();
        let promo = self.get_promo(&code)?.ok_or(LedgerError::PromoNotFound)?;

        if !promo.active {
            return Err(LedgerError::PromoInactive.into());
        }
        if promo.expires_at.is_some_and(|t| t <= Utc::now()) {
            return Err(LedgerError::PromoExpired.into());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let claimed = tx.execute(
            "UPDATE promo_codes SET redemptions = redemptions + 1
             WHERE code = ?1 AND active = 1 AND redemptions < max_redemptions",
            params![code],
        )?;
        if claimed == 0 {
            return Err(LedgerError::PromoExhausted.into());
        }

        let inserted = tx.execute(
            "INSERT INTO promo_redemptions (code, user_id, redeemed_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(code, user_id) DO NOTHING",
            params![code, user_id, now_rfc3339()],
        )?;
        if inserted == 0 {
            return Err(LedgerError::PromoAlreadyRedeemed.into());
        }

        let balance = apply_entry(&tx, user_id, "promo", promo.credit_amount, Some(&code))?;
        tx.commit().context("Failed to commit promo redemption")?;

        info!(user_id, code = %code, credit = promo.credit_amount, "🎟️ Promo code redeemed");
        Ok(balance)
    }

    pub fn create_order(&self, order: &PaymentOrder) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO payment_orders
             (id, user_id, provider, amount_cents, credits, status, provider_ref, created_at,
              updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                order.id,
                order.user_id,
                order.provider.as_str(),
                order.amount_cents,
                order.credits,
                order.status.as_str(),
                order.provider_ref,
                order.created_at.to_rfc3339(),
                order.updated_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert payment order")?;
        Ok(())
    }

    pub fn get_order(&self, order_id: &str) -> Result<Option<PaymentOrder>> {
        let conn = self.conn.lock();
        match load_order(&conn, order_id) {
            Ok(order) => Ok(Some(order)),
            Err(e) if e.downcast_ref::<LedgerError>() == Some(&LedgerError::OrderNotFound) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// pending → paid. Replays on a paid or provisioned order are no-ops.
    pub fn mark_order_paid(
        &self,
        order_id: &str,
        provider_ref: Option<&str>,
    ) -> Result<PaymentOrder> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let order = load_order(&tx, order_id)?;

        if matches!(order.status, OrderStatus::Paid | OrderStatus::Provisioned) {
            return Ok(order);
        }
        set_order_status(&tx, &order, OrderStatus::Paid, provider_ref)?;
        let order = load_order(&tx, order_id)?;
        tx.commit().context("Failed to commit order payment")?;

        info!(order_id, provider = order.provider.as_str(), "💳 Order paid");
        Ok(order)
    }

    /// paid → provisioned, crediting the wallet in the same transaction.
    /// Returns the order and whether credits were granted by this call.
    pub fn provision_order(&self, order_id: &str) -> Result<(PaymentOrder, bool)> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let order = load_order(&tx, order_id)?;

        if order.status == OrderStatus::Provisioned {
            return Ok((order, false));
        }
        set_order_status(&tx, &order, OrderStatus::Provisioned, None)?;
        apply_entry(&tx, &order.user_id, "deposit", order.credits, Some(&order.id))?;
        let order = load_order(&tx, order_id)?;
        tx.commit().context("Failed to commit order provisioning")?;

        info!(
            order_id,
            user_id = %order.user_id,
            credits = order.credits,
            "✅ Order provisioned"
        );
        Ok((order, true))
    }

    /// pending → failed. Replays on a failed order are no-ops.
    pub fn mark_order_failed(
        &self,
        order_id: &str,
        provider_ref: Option<&str>,
    ) -> Result<PaymentOrder> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let order = load_order(&tx, order_id)?;

        if order.status == OrderStatus::Failed {
            return Ok(order);
        }
        set_order_status(&tx, &order, OrderStatus::Failed, provider_ref)?;
        let order = load_order(&tx, order_id)?;
        tx.commit().context("Failed to commit order failure")?;
        Ok(order)
    }
}
