//! Final-output callback: gating, payload assembly and best-effort
//! delivery to the external evaluation endpoint.
//!
//! Dispatch happens on a detached task so the `/honeypot` response is
//! never held up by an outbound HTTP call. Delivery is attempted up to
//! three times with [1s, 2s, 4s] backoff and a 15s per-attempt timeout;
//! every attempt — successful or not — is appended to an on-disk audit
//! log capped at the most recent 1000 records.

use crate::models::{EngagementMetrics, ExtractedIntelligence, FinalOutput};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF: [Duration; 3] = [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);
const AUDIT_LOG_CAP: usize = 1000;
const RESPONSE_TEXT_CAP: usize = 500;

fn truncate_chars(s: &mut String, max_chars: usize) {
    if s.chars().count() > max_chars {
        let cut = s.char_indices().nth(max_chars).map(|(i, _)| i).unwrap_or(s.len());
        s.truncate(cut);
    }
}

/// `turnCount >= 12` is decisive on its own; below that, a confirmed scam
/// with at least 8 turns and the quality minima met is also sufficient.
pub fn should_send(turn_count: i64, scam_detected: bool, quality_met: bool) -> bool {
    turn_count >= 12 || (scam_detected && turn_count >= 8 && quality_met)
}

#[allow(clippy::too_many_arguments)]
pub fn build_final_output(
    session_id: &str,
    confidence_level: f64,
    scam_detected: bool,
    scam_type: &str,
    total_messages_exchanged: i64,
    extracted_intelligence: ExtractedIntelligence,
    engagement_duration_seconds: i64,
    agent_notes: String,
) -> FinalOutput {
    let scam_type = if scam_type == "unknown" && scam_detected {
        "bank_fraud".to_string()
    } else {
        scam_type.to_string()
    };

    FinalOutput {
        session_id: session_id.to_string(),
        confidence_level: (confidence_level.clamp(0.0, 1.0) * 10000.0).round() / 10000.0,
        scam_detected,
        scam_type,
        total_messages_exchanged: total_messages_exchanged.max(10),
        extracted_intelligence,
        engagement_metrics: EngagementMetrics {
            total_messages_exchanged: total_messages_exchanged.max(10),
            engagement_duration_seconds,
        },
        agent_notes,
    }
}

#[derive(Debug, Serialize)]
struct AuditRecord {
    timestamp: String,
    session_id: String,
    success: bool,
    response_status: Option<u16>,
    response_text: String,
    payload: serde_json::Value,
}

/// Dispatches `payload` to `callback_url`, retrying on failure, then
/// appends an audit record to `log_path`. Runs to completion on whatever
/// task it was spawned on; callers fire-and-forget via `tokio::spawn`.
pub async fn send_with_retry(client: &reqwest::Client, callback_url: &str, log_path: &str, payload: FinalOutput) {
    let body = json!(payload);
    let mut last_status: Option<u16> = None;
    let mut last_text = String::new();
    let mut success = false;

    for attempt in 0..MAX_ATTEMPTS {
        let result = tokio::time::timeout(
            ATTEMPT_TIMEOUT,
            client.post(callback_url).json(&body).send(),
        )
        .await;

        match result {
            Ok(Ok(response)) => {
                let status = response.status();
                last_status = Some(status.as_u16());
                last_text = response.text().await.unwrap_or_default();
                truncate_chars(&mut last_text, RESPONSE_TEXT_CAP);
                if (200..300).contains(&status.as_u16()) {
                    success = true;
                    break;
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(attempt, error = %err, "callback attempt failed");
                last_text = err.to_string();
                truncate_chars(&mut last_text, RESPONSE_TEXT_CAP);
            }
            Err(_) => {
                tracing::warn!(attempt, "callback attempt timed out");
                last_text = "request timed out".to_string();
            }
        }

        if attempt + 1 < MAX_ATTEMPTS {
            tokio::time::sleep(BACKOFF[attempt as usize]).await;
        }
    }

    if !success {
        tracing::error!(session_id = %payload.session_id, "callback delivery exhausted retries");
    }

    let record = AuditRecord {
        timestamp: Utc::now().to_rfc3339(),
        session_id: payload.session_id.clone(),
        success,
        response_status: last_status,
        response_text: last_text,
        payload: body,
    };

    if let Err(err) = append_audit_record(log_path, record).await {
        tracing::error!(error = %err, "failed to write callback audit log");
    }
}

async fn append_audit_record(log_path: &str, record: AuditRecord) -> anyhow::Result<()> {
    let existing = tokio::fs::read_to_string(log_path).await.unwrap_or_default();
    let mut records: Vec<serde_json::Value> = if existing.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&existing).unwrap_or_default()
    };

    records.push(serde_json::to_value(&record)?);
    if records.len() > AUDIT_LOG_CAP {
        let drop = records.len() - AUDIT_LOG_CAP;
        records.drain(0..drop);
    }

    let serialized = serde_json::to_string_pretty(&records)?;
    let mut file = tokio::fs::File::create(log_path).await?;
    file.write_all(serialized.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_send_on_turn_count_alone() {
        assert!(should_send(12, false, false));
    }

    #[test]
    fn should_send_on_scam_plus_quality() {
        assert!(should_send(8, true, true));
        assert!(!should_send(8, true, false));
        assert!(!should_send(7, true, true));
    }

    #[test]
    fn unknown_scam_type_coerces_to_bank_fraud_when_detected() {
        let output = build_final_output(
            "s1",
            0.5,
            true,
            "unknown",
            15,
            ExtractedIntelligence::default(),
            200,
            "notes".to_string(),
        );
        assert_eq!(output.scam_type, "bank_fraud");
    }

    #[test]
    fn message_count_is_floored_at_ten() {
        let output = build_final_output(
            "s2",
            0.1,
            false,
            "unknown",
            3,
            ExtractedIntelligence::default(),
            190,
            String::new(),
        );
        assert_eq!(output.total_messages_exchanged, 10);
    }
}
