//! Outbound messages to users other than the one in the current turn

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_WEBHOOK_URL: &str = "http://bot_service:5002/whatsapp";
pub const DEFAULT_SENDER: &str = "+14155238886";

const CHANNEL_PREFIX: &str = "whatsapp:";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Network(String),

    #[error("messaging gateway returned {0}")]
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub webhook_url: String,
    /// Our number on the messaging channel, without the channel prefix
    pub sender: String,
    pub timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: DEFAULT_WEBHOOK_URL.to_string(),
            sender: DEFAULT_SENDER.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl NotifierConfig {
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            webhook_url: get("TWILIO_WEBHOOK_URL").unwrap_or(defaults.webhook_url),
            sender: get("TWILIO_SENDER").unwrap_or(defaults.sender),
            timeout: get("BACKEND_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.timeout, Duration::from_secs),
        }
    }
}

/// Posts messages into the messaging gateway's webhook as form data
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    config: NotifierConfig,
}

impl WebhookNotifier {
    pub fn new(config: NotifierConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub async fn send(&self, phone: &str, text: &str) -> Result<(), NotifyError> {
        let from = format!("{CHANNEL_PREFIX}{}", self.config.sender);
        let to = format!("{CHANNEL_PREFIX}{phone}");
        let response = self
            .client
            .post(&self.config.webhook_url)
            .form(&[("From", from.as_str()), ("To", to.as_str()), ("Body", text)])
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        tracing::info!(phone, "Sent outbound notification");
        Ok(())
    }
}
