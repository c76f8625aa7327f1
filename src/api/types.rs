//! API request and response types

use crate::state_machine::state::HistoryEntry;
use serde::{Deserialize, Serialize};

/// Inbound webhook form from the messaging gateway
#[derive(Debug, Deserialize)]
pub struct InboundMessageForm {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

impl InboundMessageForm {
    /// Sender phone number without the channel prefix (`whatsapp:+263...`)
    pub fn phone(&self) -> &str {
        self.from.rsplit(':').next().unwrap_or_default().trim()
    }
}

/// Request to classify a message without running a turn
#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub phone: String,
    pub messages: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
    pub store: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
