//! Outbound user notifications (transactional email)

pub mod email;
pub mod resend;

pub use email::{settlement_email, OutboundEmail};
pub use resend::ResendNotifier;

use crate::config::AppConfig;
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<()>;
}

/// Notifier used when no email provider is configured: logs and drops
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            "📭 Email provider not configured, skipping send"
        );
        Ok(())
    }
}

/// Resend when an API key is configured, otherwise the logging fallback
pub fn notifier_from_config(config: &AppConfig) -> Result<Arc<dyn Notifier>> {
    let Some(api_key) = config.resend_api_key.clone() else {
        warn!("⚠️  RESEND_API_KEY not set, settlement emails will only be logged");
        return Ok(Arc::new(LogNotifier));
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;
    info!("📧 Email notifications via Resend from {}", config.email_from);
    Ok(Arc::new(ResendNotifier::new(
        http,
        api_key,
        config.email_from.clone(),
    )))
}
