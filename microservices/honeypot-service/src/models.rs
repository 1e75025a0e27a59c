//! Request/response and callback payload schemas for the honeypot API.
//!
//! Unknown fields are ignored on the way in; epoch-int timestamps are
//! coerced to strings. The response model is kept minimal — no internal
//! state is ever leaked to the caller.

use serde::{Deserialize, Serialize};

fn default_sender() -> String {
    "scammer".to_string()
}

fn default_channel() -> String {
    "SMS".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

fn default_locale() -> String {
    "IN".to_string()
}

/// Accepts either a string or an epoch int/float timestamp, coercing to a string.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Timestamp {
    Text(String),
    Epoch(i64),
}

impl Timestamp {
    pub fn as_string(&self) -> String {
        match self {
            Timestamp::Text(s) => s.clone(),
            Timestamp::Epoch(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default = "default_sender")]
    pub sender: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_locale")]
    pub locale: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoneypotRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: Message,
    #[serde(default)]
    pub conversation_history: Vec<Message>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoneypotResponse {
    pub status: String,
    pub reply: String,
}

impl HoneypotResponse {
    pub fn ok(reply: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            reply: reply.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Eight categories of identifiers elicited from the scammer during the engagement.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIntelligence {
    pub phone_numbers: Vec<String>,
    pub bank_accounts: Vec<String>,
    pub upi_ids: Vec<String>,
    pub phishing_links: Vec<String>,
    pub email_addresses: Vec<String>,
    pub case_ids: Vec<String>,
    pub policy_numbers: Vec<String>,
    pub order_numbers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMetrics {
    pub total_messages_exchanged: i64,
    pub engagement_duration_seconds: i64,
}

/// Full callback payload posted to the external evaluation endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalOutput {
    pub session_id: String,
    pub confidence_level: f64,
    pub scam_detected: bool,
    pub scam_type: String,
    pub total_messages_exchanged: i64,
    pub extracted_intelligence: ExtractedIntelligence,
    pub engagement_metrics: EngagementMetrics,
    pub agent_notes: String,
}
