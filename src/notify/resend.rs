//! Transactional email over the Resend HTTP API

use super::{Notifier, OutboundEmail};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

pub struct ResendNotifier {
    http: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

impl ResendNotifier {
    pub fn new(http: reqwest::Client, api_key: String, from: String) -> Self {
        Self {
            http,
            api_key,
            from,
            endpoint: DEFAULT_RESEND_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait::async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let body = SendRequest {
            from: &self.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Email request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Email provider returned {}: {}", status, text));
        }

        debug!(to = %email.to, "📧 Email accepted by provider");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_shape() {
        let body = SendRequest {
            from: "F1 Picks <noreply@example.com>",
            to: ["fan@example.com"],
            subject: "Settled",
            html: "<p>hi</p>",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"][0], "fan@example.com");
        assert_eq!(json["from"], "F1 Picks <noreply@example.com>");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_an_error() {
        let notifier = ResendNotifier::new(
            reqwest::Client::new(),
            "key".to_string(),
            "noreply@example.com".to_string(),
        )
        .with_endpoint("http://127.0.0.1:9/emails".to_string());

        let email = OutboundEmail {
            to: "fan@example.com".to_string(),
            subject: "s".to_string(),
            html: "h".to_string(),
        };
        assert!(notifier.send(&email).await.is_err());
    }
}
