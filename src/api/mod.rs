//! HTTP API
//!
//! Route groups are split by who may call them: users (bearer JWT), admins
//! (admin JWT), the scheduler (admin JWT or cron secret) and payment
//! gateways (webhook secret).

pub mod routes;

use crate::{
    auth::{
        admin_middleware, admin_or_cron_middleware, auth_middleware, webhook_middleware,
        AuthState,
    },
    middleware::request_logging,
    settlement::SettlementEngine,
    store::{LedgerError, PicksDb},
};
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PicksDb,
    pub engine: Arc<SettlementEngine>,
}

pub fn router(state: AppState, auth: AuthState) -> Router {
    let user_routes = Router::new()
        .route("/api/picks", post(routes::post_pick))
        .route("/api/picks/results", get(routes::get_pick_results))
        .route("/api/wallet", get(routes::get_wallet))
        .route("/api/promo/redeem", post(routes::post_redeem_promo))
        .route("/api/orders", post(routes::post_order))
        .route_layer(middleware::from_fn_with_state(auth.clone(), auth_middleware))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/api/admin/results", post(routes::post_official_results))
        .route("/api/admin/promo", post(routes::post_promo_code))
        .route_layer(middleware::from_fn_with_state(auth.clone(), admin_middleware))
        .with_state(state.clone());

    let settle_routes = Router::new()
        .route("/api/settle-picks", post(routes::post_settle_picks))
        .route_layer(middleware::from_fn_with_state(
            auth.clone(),
            admin_or_cron_middleware,
        ))
        .with_state(state.clone());

    let webhook_routes = Router::new()
        .route("/api/webhooks/payments", post(routes::post_payment_webhook))
        .route_layer(middleware::from_fn_with_state(auth, webhook_middleware))
        .with_state(state);

    let public_routes = Router::new().route("/health", get(routes::health_check));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .merge(settle_routes)
        .merge(webhook_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// API error responses
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal,
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let Some(ledger) = err.downcast_ref::<LedgerError>() else {
            error!("Request failed: {:#}", err);
            return ApiError::Internal;
        };
        let message = ledger.to_string();
        match ledger {
            LedgerError::PromoNotFound | LedgerError::OrderNotFound => ApiError::NotFound(message),
            LedgerError::PromoAlreadyRedeemed
            | LedgerError::PromoExists
            | LedgerError::PromoExhausted
            | LedgerError::InvalidTransition { .. } => ApiError::Conflict(message),
            LedgerError::InsufficientFunds { .. }
            | LedgerError::PromoInactive
            | LedgerError::PromoExpired => ApiError::BadRequest(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtHandler, UserRole};
    use crate::notify::LogNotifier;
    use crate::store::test_support::create_test_db;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::Value;
    use tempfile::NamedTempFile;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret-key-12345";

    struct Harness {
        app: Router,
        db: PicksDb,
        jwt: Arc<JwtHandler>,
        _temp: NamedTempFile,
    }

    fn harness() -> Harness {
        let (db, temp) = create_test_db();
        let jwt = Arc::new(JwtHandler::new(SECRET.to_string()));
        let engine = Arc::new(SettlementEngine::new(
            Arc::new(db.clone()),
            Arc::new(LogNotifier),
            "http://localhost/dashboard".to_string(),
        ));
        let auth = AuthState {
            jwt_handler: jwt.clone(),
            cron_secret: Some("cron-secret".to_string()),
            webhook_secret: Some("hook-secret".to_string()),
        };
        let app = router(
            AppState {
                db: db.clone(),
                engine,
            },
            auth,
        );
        Harness {
            app,
            db,
            jwt,
            _temp: temp,
        }
    }

    impl Harness {
        fn token(&self, user: &str, role: UserRole) -> String {
            self.jwt
                .generate_token(user, Some("fan@example.com"), role)
                .unwrap()
                .0
        }

        async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
            let resp = self.app.clone().oneshot(req).await.unwrap();
            let status = resp.status();
            let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, body)
        }
    }

    fn post_json(uri: &str, header: Option<(&str, String)>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn bearer(token: String) -> Option<(&'static str, String)> {
        Some(("Authorization", format!("Bearer {}", token)))
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let h = harness();
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_settle_requires_admin_or_cron() {
        let h = harness();

        let (status, _) = h.send(post_json("/api/settle-picks", None, json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let user = h.token("u1", UserRole::User);
        let (status, _) = h
            .send(post_json("/api/settle-picks", bearer(user), json!({})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let cron = Some(("x-cron-secret", "cron-secret".to_string()));
        let (status, body) = h.send(post_json("/api/settle-picks", cron, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processed"], 0);

        let admin = h.token("ops", UserRole::Admin);
        let (status, _) = h
            .send(post_json("/api/settle-picks", bearer(admin), json!({})))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pick_submission_flow_end_to_end() {
        let h = harness();
        let admin = h.token("ops", UserRole::Admin);
        let user = h.token("u1", UserRole::User);

        let pick = json!({
            "gp_name": "Monza",
            "session_type": "race",
            "mode": "all_or_nothing",
            "wager_amount": 1000,
            "selections": [
                {"driver": "Leclerc", "session_type": "race", "line": 2.5, "direction": "mejor"},
                {"driver": "Sainz", "session_type": "race", "line": 4.5, "direction": "peor"}
            ]
        });

        // No credits yet
        let (status, body) = h
            .send(post_json("/api/picks", bearer(user.clone()), pick.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Insufficient"));

        let (status, _) = h
            .send(post_json(
                "/api/admin/promo",
                bearer(admin.clone()),
                json!({"code": "GRID", "credit_amount": 5000, "max_redemptions": 10}),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = h
            .send(post_json("/api/promo/redeem", bearer(user.clone()), json!({"code": "grid"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], 5000);

        let (status, body) = h
            .send(post_json("/api/picks", bearer(user.clone()), pick))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["balance"], 4000);
        assert_eq!(body["multiplier"], 3.0);

        let (status, _) = h
            .send(post_json(
                "/api/admin/results",
                bearer(admin.clone()),
                json!({"gp_name": "Monza", "results": [
                    {"driver_name": "Leclerc", "race_position": 1},
                    {"driver_name": "Sainz", "race_position": 6}
                ]}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = h
            .send(post_json("/api/settle-picks", bearer(admin), json!({})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processed"], 1);
        assert_eq!(body["results"][0]["result"], "won");
        assert_eq!(body["results"][0]["payout"], 3000);

        let req = Request::get("/api/picks/results")
            .header("Authorization", format!("Bearer {}", user))
            .body(Body::empty())
            .unwrap();
        let (status, body) = h.send(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["correct_count"], 2);

        // Contact was captured from the token for settlement email
        assert!(h.db.contact_for_user("u1").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_payment_webhook_provisions_once() {
        let h = harness();
        let user = h.token("u1", UserRole::User);

        let (status, order) = h
            .send(post_json(
                "/api/orders",
                bearer(user),
                json!({"provider": "paypal", "amount_cents": 500}),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["status"], "pending");
        let order_id = order["id"].as_str().unwrap().to_string();

        let event = json!({
            "order_id": order_id,
            "provider": "paypal",
            "provider_ref": "PP-1",
            "status": "paid"
        });

        let (status, _) = h
            .send(post_json(
                "/api/webhooks/payments",
                Some(("x-webhook-secret", "wrong".to_string())),
                event.clone(),
            ))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        for _ in 0..2 {
            let (status, body) = h
                .send(post_json(
                    "/api/webhooks/payments",
                    Some(("x-webhook-secret", "hook-secret".to_string())),
                    event.clone(),
                ))
                .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "provisioned");
        }

        assert_eq!(h.db.wallet_balance("u1").unwrap(), 5_000);

        let wrong_provider =
            json!({"order_id": order_id, "provider": "card", "status": "failed"});
        let (status, _) = h
            .send(post_json(
                "/api/webhooks/payments",
                Some(("x-webhook-secret", "hook-secret".to_string())),
                wrong_provider,
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_ledger_errors_map_to_statuses() {
        let resp = ApiError::from(anyhow::Error::new(LedgerError::PromoNotFound)).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp =
            ApiError::from(anyhow::Error::new(LedgerError::PromoAlreadyRedeemed)).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = ApiError::from(anyhow::anyhow!("disk full")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
