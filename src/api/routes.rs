//! API handlers

use super::{ApiError, AppState};
use crate::{
    auth::Claims,
    models::{OfficialResult, PickResult, SettlementSummary},
    payments::{PaymentEvent, PaymentEventStatus, PaymentOrder, PaymentProvider},
    picks::NewPick,
    store::{PicksDb, PromoCode, WalletSnapshot},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const DEFAULT_RESULTS_LIMIT: usize = 50;
const MAX_RESULTS_LIMIT: usize = 500;
const WALLET_LEDGER_LIMIT: usize = 20;

pub async fn health_check() -> &'static str {
    "OK"
}

/// Keep the notification address in sync with the provider's claims
fn remember_contact(db: &PicksDb, claims: &Claims) {
    let Some(email) = claims.email.as_deref().filter(|e| !e.trim().is_empty()) else {
        return;
    };
    if let Err(e) = db.upsert_user(&claims.sub, email, claims.name.as_deref()) {
        warn!(user_id = %claims.sub, "Failed to store user contact: {:#}", e);
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettleResponse {
    pub processed: usize,
    pub results: Vec<SettlementSummary>,
}

/// POST /api/settle-picks
pub async fn post_settle_picks(
    State(state): State<AppState>,
) -> Result<Json<SettleResponse>, ApiError> {
    let results = state.engine.settle_all_picks().await?;
    Ok(Json(SettleResponse {
        processed: results.len(),
        results,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub limit: Option<usize>,
}

/// GET /api/picks/results
pub async fn get_pick_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<Vec<PickResult>>, ApiError> {
    remember_contact(&state.db, &claims);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RESULTS_LIMIT)
        .clamp(1, MAX_RESULTS_LIMIT);
    Ok(Json(state.db.pick_results_for_user(&claims.sub, limit)?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PickCreated {
    pub pick_id: String,
    pub multiplier: f64,
    pub balance: i64,
}

/// POST /api/picks
pub async fn post_pick(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewPick>,
) -> Result<(StatusCode, Json<PickCreated>), ApiError> {
    remember_contact(&state.db, &claims);

    let pick = payload
        .into_pick(&claims.sub)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let balance = state.db.insert_pick_with_wager(&pick)?;

    info!(
        pick_id = %pick.id,
        user_id = %pick.user_id,
        gp = %pick.gp_name,
        mode = pick.mode.as_str(),
        wager = pick.wager_amount,
        "🏎️ Pick submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(PickCreated {
            pick_id: pick.id,
            multiplier: pick.multiplier,
            balance,
        }),
    ))
}

/// GET /api/wallet
pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<WalletSnapshot>, ApiError> {
    remember_contact(&state.db, &claims);
    Ok(Json(state.db.wallet_snapshot(&claims.sub, WALLET_LEDGER_LIMIT)?))
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

/// POST /api/promo/redeem
pub async fn post_redeem_promo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RedeemRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    remember_contact(&state.db, &claims);
    if payload.code.trim().is_empty() {
        return Err(ApiError::BadRequest("code is required".to_string()));
    }
    let balance = state.db.redeem_promo(&claims.sub, &payload.code)?;
    Ok(Json(BalanceResponse { balance }))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub provider: PaymentProvider,
    pub amount_cents: i64,
}

/// POST /api/orders
pub async fn post_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<PaymentOrder>), ApiError> {
    remember_contact(&state.db, &claims);

    let order = PaymentOrder::pending(&claims.sub, payload.provider, payload.amount_cents)
        .ok_or_else(|| ApiError::BadRequest("amount_cents out of range".to_string()))?;
    state.db.create_order(&order)?;

    info!(
        order_id = %order.id,
        provider = order.provider.as_str(),
        amount_cents = order.amount_cents,
        "🧾 Payment order created"
    );
    Ok((StatusCode::CREATED, Json(order)))
}

/// POST /api/webhooks/payments
pub async fn post_payment_webhook(
    State(state): State<AppState>,
    Json(event): Json<PaymentEvent>,
) -> Result<Json<PaymentOrder>, ApiError> {
    let order = state
        .db
        .get_order(&event.order_id)?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    if order.provider != event.provider {
        return Err(ApiError::BadRequest(format!(
            "Order {} was not placed with {}",
            order.id,
            event.provider.as_str()
        )));
    }

    let order = match event.status {
        PaymentEventStatus::Paid => {
            state
                .db
                .mark_order_paid(&order.id, event.provider_ref.as_deref())?;
            state.db.provision_order(&order.id)?.0
        }
        PaymentEventStatus::Failed => state
            .db
            .mark_order_failed(&order.id, event.provider_ref.as_deref())?,
    };

    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct DriverResult {
    pub driver_name: String,
    #[serde(default)]
    pub qualy_position: Option<i64>,
    #[serde(default)]
    pub race_position: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OfficialResultsRequest {
    pub gp_name: String,
    pub results: Vec<DriverResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WrittenResponse {
    pub written: usize,
}

/// POST /api/admin/results
pub async fn post_official_results(
    State(state): State<AppState>,
    Json(payload): Json<OfficialResultsRequest>,
) -> Result<Json<WrittenResponse>, ApiError> {
    let gp_name = payload.gp_name.trim().to_string();
    if gp_name.is_empty() {
        return Err(ApiError::BadRequest("gp_name is required".to_string()));
    }
    if payload
        .results
        .iter()
        .any(|r| r.driver_name.trim().is_empty())
    {
        return Err(ApiError::BadRequest("driver_name is required".to_string()));
    }

    let results: Vec<OfficialResult> = payload
        .results
        .into_iter()
        .map(|r| OfficialResult {
            gp_name: gp_name.clone(),
            driver_name: r.driver_name,
            qualy_position: r.qualy_position,
            race_position: r.race_position,
        })
        .collect();

    let written = state.db.upsert_official_results(&gp_name, &results)?;
    info!(gp = %gp_name, written, "🏁 Official results stored");
    Ok(Json(WrittenResponse { written }))
}

/// POST /api/admin/promo
pub async fn post_promo_code(
    State(state): State<AppState>,
    Json(promo): Json<PromoCode>,
) -> Result<StatusCode, ApiError> {
    if promo.code.trim().is_empty() {
        return Err(ApiError::BadRequest("code is required".to_string()));
    }
    if promo.credit_amount <= 0 || promo.max_redemptions < 1 {
        return Err(ApiError::BadRequest(
            "credit_amount and max_redemptions must be positive".to_string(),
        ));
    }
    state.db.create_promo(&promo)?;
    Ok(StatusCode::CREATED)
}
