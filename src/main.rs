//! F1 Picks API server
//!
//! Serves pick submission, wallet and settlement endpoints. When
//! `SETTLEMENT_INTERVAL_SECS` is set, settlement also runs on a timer
//! inside the process.

use anyhow::{Context, Result};
use f1_picks_backend::{
    api::{self, AppState},
    auth::{AuthState, JwtHandler},
    config::{load_env, AppConfig},
    notify::notifier_from_config,
    settlement::SettlementEngine,
    store::PicksDb,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("🏁 F1 Picks backend starting");

    let config = AppConfig::from_env()?;

    let db = PicksDb::new(&config.database_path)?;
    info!("💾 Picks database at: {}", config.database_path);

    let notifier = notifier_from_config(&config)?;
    let engine = Arc::new(
        SettlementEngine::new(Arc::new(db.clone()), notifier, config.dashboard_url())
            .with_email_concurrency(config.email_max_concurrency),
    );

    match config.settlement_interval {
        Some(every) => {
            info!("⏱️  Scheduled settlement every {}s", every.as_secs());
            engine.clone().spawn_interval(every);
        }
        None => info!("⏱️  Scheduled settlement disabled, waiting for POST /api/settle-picks"),
    }

    if config.cron_secret.is_none() {
        warn!("⚠️  CRON_SECRET not set, only admins can trigger settlement");
    }
    if config.webhook_secret.is_none() {
        warn!("⚠️  PAYMENT_WEBHOOK_SECRET not set, payment webhooks will be rejected");
    }

    let auth = AuthState {
        jwt_handler: Arc::new(JwtHandler::new(config.jwt_secret.clone())),
        cron_secret: config.cron_secret.clone(),
        webhook_secret: config.webhook_secret.clone(),
    };

    let app = api::router(AppState { db, engine }, auth);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "f1_picks_backend=debug,f1_picks=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
