//! Application configuration
//!
//! Everything comes from environment variables (optionally via `.env`).

use crate::settlement::DEFAULT_EMAIL_CONCURRENCY;
use anyhow::{Context, Result};
use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub cron_secret: Option<String>,
    pub webhook_secret: Option<String>,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub app_base_url: String,
    /// Scheduled settlement interval; `None` disables the in-process scheduler
    pub settlement_interval: Option<Duration>,
    /// Settlement emails sent concurrently (provider rate limits)
    pub email_max_concurrency: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_path = resolve_data_path(
            env::var("PICKS_DB_PATH")
                .or_else(|_| env::var("DATABASE_PATH"))
                .ok(),
            "f1_picks.db",
        );

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let jwt_secret = match env_nonempty("JWT_SECRET") {
            Some(s) => s,
            None => {
                warn!("⚠️  JWT_SECRET not set, using development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let settlement_interval = match env_nonempty("SETTLEMENT_INTERVAL_SECS") {
            Some(raw) => {
                let secs = raw
                    .parse::<u64>()
                    .context("Invalid SETTLEMENT_INTERVAL_SECS")?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        let email_max_concurrency = match env_nonempty("EMAIL_MAX_CONCURRENCY") {
            Some(raw) => raw
                .parse::<usize>()
                .context("Invalid EMAIL_MAX_CONCURRENCY")?
                .max(1),
            None => DEFAULT_EMAIL_CONCURRENCY,
        };

        Ok(Self {
            database_path,
            bind_addr,
            jwt_secret,
            cron_secret: env_nonempty("CRON_SECRET"),
            webhook_secret: env_nonempty("PAYMENT_WEBHOOK_SECRET"),
            resend_api_key: env_nonempty("RESEND_API_KEY"),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "F1 Picks <noreply@f1picks.app>".to_string()),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            settlement_interval,
            email_max_concurrency,
        })
    }

    /// Link placed in settlement emails
    pub fn dashboard_url(&self) -> String {
        format!("{}/dashboard", self.app_base_url.trim_end_matches('/'))
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_data_path(filename: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join(filename)
        .to_string_lossy()
        .to_string()
}

/// Absolute paths pass through; relative ones are taken from the crate root,
/// not the caller's cwd.
pub fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return default_data_path(default_filename);
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }

    base.join(p).to_string_lossy().to_string()
}

/// Load `.env` from the cwd (and parents) and from the crate root
pub fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidate = manifest_dir.join(".env");
    if candidate.exists() {
        let _ = dotenv::from_path(&candidate);
    }
}
