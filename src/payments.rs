//! Payment orders
//!
//! Credits are bought through one of three gateways. Whatever the gateway,
//! an order moves `pending → paid → provisioned` (or `pending → failed`);
//! provider callbacks drive the transitions and may be replayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credits granted per cent paid
pub const CREDITS_PER_CENT: i64 = 10;

/// Smallest accepted order ($1.00)
pub const MIN_ORDER_CENTS: i64 = 100;

/// Largest accepted order ($10,000.00)
pub const MAX_ORDER_CENTS: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Card,
    Crypto,
    Paypal,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentProvider::Card => "card",
            PaymentProvider::Crypto => "crypto",
            PaymentProvider::Paypal => "paypal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "card" => Some(PaymentProvider::Card),
            "crypto" => Some(PaymentProvider::Crypto),
            "paypal" => Some(PaymentProvider::Paypal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Provisioned,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Provisioned => "provisioned",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "provisioned" => Some(OrderStatus::Provisioned),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Failed)
                | (OrderStatus::Paid, OrderStatus::Provisioned)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: String,
    pub user_id: String,
    pub provider: PaymentProvider,
    pub amount_cents: i64,
    pub credits: i64,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentOrder {
    /// New pending order, or `None` when the amount is outside the accepted range
    pub fn pending(user_id: &str, provider: PaymentProvider, amount_cents: i64) -> Option<Self> {
        if !(MIN_ORDER_CENTS..=MAX_ORDER_CENTS).contains(&amount_cents) {
            return None;
        }
        let now = Utc::now();
        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            provider,
            amount_cents,
            credits: amount_cents * CREDITS_PER_CENT,
            status: OrderStatus::Pending,
            provider_ref: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Outcome reported by a gateway callback
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventStatus {
    Paid,
    Failed,
}

/// Normalized gateway callback
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    pub order_id: String,
    pub provider: PaymentProvider,
    #[serde(default)]
    pub provider_ref: Option<String>,
    pub status: PaymentEventStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Failed));
        assert!(Paid.can_transition_to(Provisioned));

        assert!(!Pending.can_transition_to(Provisioned));
        assert!(!Paid.can_transition_to(Failed));
        assert!(!Provisioned.can_transition_to(Paid));
        assert!(!Failed.can_transition_to(Paid));
        assert!(!Provisioned.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Provisioned));
    }

    #[test]
    fn test_pending_order_amount_bounds() {
        let order = PaymentOrder::pending("u1", PaymentProvider::Paypal, 500).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.credits, 5_000);

        assert!(PaymentOrder::pending("u1", PaymentProvider::Card, 99).is_none());
        assert!(PaymentOrder::pending("u1", PaymentProvider::Card, MAX_ORDER_CENTS + 1).is_none());
    }

    #[test]
    fn test_payment_event_deserialization() {
        let event: PaymentEvent = serde_json::from_str(
            r#"{"order_id":"o1","provider":"crypto","provider_ref":"tx_9","status":"paid"}"#,
        )
        .unwrap();
        assert_eq!(event.provider, PaymentProvider::Crypto);
        assert_eq!(event.status, PaymentEventStatus::Paid);
        assert_eq!(event.provider_ref.as_deref(), Some("tx_9"));

        let event: PaymentEvent =
            serde_json::from_str(r#"{"order_id":"o1","provider":"card","status":"failed"}"#)
                .unwrap();
        assert!(event.provider_ref.is_none());
    }
}
