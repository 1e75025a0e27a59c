//! HTTP handlers.
//!
//! `/honeypot` never returns a 5xx. Internal pipeline stages degrade to
//! their identity element (no signals, no intel, a generic reply) rather
//! than fail the request — only authentication and malformed request
//! bodies are rejected, per the "always 200" product policy.

use crate::auth;
use crate::callback;
use crate::error::Error;
use crate::models::{ExtractedIntelligence, HoneypotRequest, HoneypotResponse, StatusResponse};
use crate::session::Sender;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use rand::Rng;
use std::time::Duration;

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online".to_string(),
        service: "honeypot-service".to_string(),
        version: state.version.clone(),
    })
}

pub async fn honeypot(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<HoneypotResponse>, Error> {
    auth::verify_api_key(&headers, &state.config.api_key)?;

    let req: HoneypotRequest =
        serde_json::from_slice(&body).map_err(|e| Error::InvalidRequest(e.to_string()))?;

    let session_id = match req.session_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() && !req.message.text.trim().is_empty() => id.to_string(),
        _ => {
            return Ok(Json(HoneypotResponse::ok(
                "Sorry, could you tell me more about this?",
            )))
        }
    };

    state.sessions.ensure(&session_id);

    let is_fresh_session = state.sessions.message_count(&session_id) == 0;

    for hist in &req.conversation_history {
        let sender = Sender::from_str_field(&hist.sender);
        if sender == Sender::Scammer && !hist.text.trim().is_empty() {
            state.intel_store.extract_and_merge(&session_id, &hist.text);
            if is_fresh_session {
                state.risk.analyze_message(&session_id, &hist.text);
            }
        }
        state.sessions.add_message(&session_id, sender, &hist.text);
    }

    let message_text = req.message.text.clone();
    state.sessions.add_message(&session_id, Sender::Scammer, &message_text);
    state.quality.record_turn(&session_id);

    let turn_result = state.risk.analyze_message(&session_id, &message_text);
    let profile = state.risk.profile(&session_id);
    if profile.scam_detected {
        state.sessions.mark_scam_confirmed(&session_id);
    }
    for signal in &turn_result.turn_signals {
        state.quality.record_red_flag(&session_id, signal);
    }

    let turn_intel = state.intel_store.extract_and_merge(&session_id, &message_text);

    let turn_count = state.sessions.turn_count(&session_id);
    let stage = crate::engagement::stage_for(profile.cumulative_score, turn_count, profile.scam_detected);

    let intel_classes_obtained = obtained_intel_classes(&turn_intel);
    let probe = state.quality.generate_probing_response(
        &session_id,
        &profile.triggered_signals,
        stage,
        &intel_classes_obtained,
    );

    let reply = match probe {
        Some(probe_text) => {
            state.quality.record_investigative_question(&session_id);
            state.quality.record_elicitation(&session_id);
            probe_text
        }
        None => state.engagement.get_reply(
            &session_id,
            &message_text,
            turn_count.max(0) as u32,
            profile.cumulative_score,
            profile.scam_detected,
        ),
    };
    state.quality.record_response(&session_id, &reply);

    state.sessions.add_message(&session_id, Sender::Agent, &reply);
    state.sessions.set_agent_response(&session_id, &reply);

    maybe_dispatch_callback(&state, &session_id).await;

    let jitter_ms = rand::thread_rng().gen_range(400..=1000);
    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

    Ok(Json(HoneypotResponse::ok(reply)))
}

fn obtained_intel_classes(intel: &crate::extractor::Intelligence) -> std::collections::HashSet<&'static str> {
    let mut set = std::collections::HashSet::new();
    if !intel.phone_numbers.is_empty() {
        set.insert("phoneNumbers");
    }
    if !intel.upi_ids.is_empty() {
        set.insert("upiIds");
    }
    if !intel.bank_accounts.is_empty() {
        set.insert("bankAccounts");
    }
    if !intel.email_addresses.is_empty() {
        set.insert("emailAddresses");
    }
    set
}

async fn maybe_dispatch_callback(state: &AppState, session_id: &str) {
    let turn_count = state.sessions.turn_count(session_id);
    let scam_detected = state.sessions.is_scam_confirmed(session_id);
    let quality_met = state.quality.thresholds_met(session_id);

    if !callback::should_send(turn_count, scam_detected, quality_met) {
        return;
    }
    if !state.sessions.can_finalize(session_id) {
        return;
    }
    if !state.sessions.mark_finalized(session_id) {
        return;
    }

    let profile = state.risk.profile(session_id);
    let intel = state.intel_store.get(session_id);
    let total_messages = state.sessions.total_messages_exchanged(session_id);
    let duration = state.sessions.engagement_duration(session_id);

    let intel_counts: Vec<(&str, usize)> = vec![
        ("phone numbers", intel.phone_numbers.len()),
        ("bank accounts", intel.bank_accounts.len()),
        ("UPI IDs", intel.upi_ids.len()),
        ("phishing links", intel.phishing_links.len()),
        ("email addresses", intel.email_addresses.len()),
        ("case IDs", intel.case_ids.len()),
        ("policy numbers", intel.policy_numbers.len()),
        ("order numbers", intel.order_numbers.len()),
    ];

    let agent_notes = state.engagement.generate_agent_notes(
        session_id,
        &profile.triggered_signals,
        &profile.scam_type,
        &intel_counts,
        total_messages,
        duration,
    );

    let extracted = ExtractedIntelligence {
        phone_numbers: intel.phone_numbers,
        bank_accounts: intel.bank_accounts,
        upi_ids: intel.upi_ids,
        phishing_links: intel.phishing_links,
        email_addresses: intel.email_addresses,
        case_ids: intel.case_ids,
        policy_numbers: intel.policy_numbers,
        order_numbers: intel.order_numbers,
    };

    let payload = callback::build_final_output(
        session_id,
        profile.confidence_level(),
        scam_detected,
        &profile.scam_type,
        total_messages,
        extracted,
        duration,
        agent_notes,
    );

    let client = state.http_client.clone();
    let callback_url = state.config.callback_url.clone();
    let log_path = state.config.callback_log_path.clone();
    tokio::spawn(async move {
        callback::send_with_retry(&client, &callback_url, &log_path, payload).await;
    });
}
