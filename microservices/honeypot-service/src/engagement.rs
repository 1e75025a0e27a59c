//! Persona-driven reply selection.
//!
//! Five escalating stages model a victim going from confused bystander
//! to someone ready to transfer money. Within a stage, which response
//! pool gets drawn from depends on which tactic the scammer just used —
//! not the tactics accumulated over the whole conversation, so the
//! agent reacts to what was just said rather than re-litigating earlier
//! turns. A small per-session "used" set avoids repeating a line twice
//! in the same conversation.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

const STAGE_1: &[&str] = &[
    "Wait, who is this again?",
    "Sorry, I don't understand, can you explain?",
    "Is this about my bank account?",
    "I'm a bit confused, what do you need from me?",
    "How did you get my number?",
    "I haven't done anything wrong, why are you calling?",
    "Can you tell me more about this?",
    "I wasn't expecting this call.",
    "Hold on, let me understand this properly.",
    "What department did you say you're from?",
    "This sounds serious, what happened?",
    "I'm not sure I follow, can you repeat that?",
    "Give me a second, I need to think about this.",
    "Okay, I'm listening, go on.",
];

const STAGE_2: &[&str] = &[
    "Okay, so what do you need me to do?",
    "This is worrying, what are my options?",
    "I want to fix this, how do I proceed?",
    "Alright, tell me the next step.",
    "I don't want any trouble, what should I do?",
    "Is there somewhere I can verify this?",
    "I'm getting a bit anxious, please explain clearly.",
    "What happens if I don't do this today?",
    "Can you walk me through the process?",
    "I want to cooperate, what's required from me?",
    "Is my account actually at risk?",
    "Okay, I'm taking this seriously now.",
    "What information do you need first?",
    "I just want this resolved quickly.",
];

const STAGE_3: &[&str] = &[
    "Okay I understand, what's the next step to sort this out?",
    "I'm ready to cooperate, just tell me what to do.",
    "This is stressful, let's get it done.",
    "Alright, where do I send what you need?",
    "I trust you're trying to help me here.",
    "Let's move forward, what do you need from me?",
    "I don't want my account blocked, guide me through this.",
    "Okay, I'll do what's needed, just explain clearly.",
    "This is urgent, I understand, what now?",
    "I'm following along, please continue.",
    "Alright, I'll cooperate fully.",
    "I just want this sorted before it gets worse.",
    "Tell me exactly what I need to provide.",
    "Okay, I'm ready, what's next?",
];

const STAGE_4: &[&str] = &[
    "Okay, I'm ready to do this, just confirm the details once more.",
    "Alright, tell me exactly where to send it.",
    "I trust you, let's finish this quickly.",
    "Okay, give me the account details again please.",
    "I'm ready, just walk me through the last step.",
    "Let's get this done, what do you need confirmed?",
    "Okay, I'll proceed, just repeat the details.",
    "Alright, I'm prepared to complete this now.",
    "I understand, let's finalize this.",
    "Okay, I trust the process, what's the final step?",
    "I'm ready to transfer, confirm once more.",
    "Alright, just to be sure, repeat the amount and account.",
    "Okay, I want to be careful, confirm everything again.",
    "Let's wrap this up, what's left to do?",
];

const STAGE_5: &[&str] = &[
    "Okay, I'm ready to transfer the money now, confirm the details.",
    "Alright, sending it now, is this the correct account?",
    "I'm doing it right now, just confirm once more.",
    "Okay, transferring now, please stay on the line.",
    "I trust you completely, processing the payment now.",
    "Alright, it's done on my end, did you receive it?",
    "Okay, I've sent it, please confirm you got it.",
    "I'm completing the transfer as we speak.",
    "Alright, confirm this is the final step before I send it.",
    "Okay, ready to finalize, just need your go-ahead.",
    "I'm sending the money now, hold on.",
    "Alright, last confirmation before I complete this.",
    "Okay, processing now, let me know once it clears.",
    "I'm ready, this is the last thing I need to do, right?",
];

const OTP_RESPONSES: &[&str] = &[
    "What's the OTP for exactly?",
    "I got a code, is this what you need?",
    "Should I read out the numbers now?",
    "I don't usually share this, are you sure it's safe?",
    "Okay, give me a second to check my messages.",
    "Why does this need the code?",
    "Is this the 6 digit one I just got?",
    "I'm a bit nervous sharing this, is it fine?",
    "Let me find the message first.",
    "Okay, I'll read it slowly, one second.",
];

const ACCOUNT_RESPONSES: &[&str] = &[
    "Which account number do you need exactly?",
    "Is this for my savings account?",
    "Let me check my bank app for the details.",
    "Do you need the IFSC code too?",
    "I have more than one account, which one?",
    "Give me a moment to find the account number.",
    "Is this the account ending in a few digits, or the full number?",
    "I'll need to check my passbook for that.",
    "Okay, one second, let me find it.",
    "Should I include the branch name as well?",
];

const THREAT_RESPONSES: &[&str] = &[
    "Wait, am I in legal trouble?",
    "Is there really a warrant against me?",
    "I didn't do anything, why am I being threatened?",
    "This is scary, what do I need to do to avoid arrest?",
    "Please, I don't want any legal issues.",
    "Can this be resolved without going to court?",
    "I'm worried now, please tell me how to fix this.",
    "Is there a fine I can pay instead?",
    "I'll cooperate, just don't arrest me.",
    "What do I need to do right now to avoid this?",
];

const PAYMENT_LURE_RESPONSES: &[&str] = &[
    "Wait, I actually won something?",
    "How much is the prize exactly?",
    "What do I need to do to claim it?",
    "Is there a fee to release the prize?",
    "This is exciting, tell me more.",
    "How were we selected for this?",
    "Okay, where do I send the fee?",
    "Is this guaranteed, or could it fall through?",
    "I've never won anything before, how does this work?",
    "Alright, let's do this, what's needed?",
];

const ACCOUNT_COMPROMISE_RESPONSES: &[&str] = &[
    "Wait, is my account actually compromised?",
    "How did this happen?",
    "What should I do to secure it?",
    "Is my money safe right now?",
    "Should I change my password too?",
    "This is concerning, please help me fix it.",
    "Do I need to block my card?",
    "What caused this issue?",
    "I'm worried, please guide me through this.",
    "Okay, tell me the steps to secure my account.",
];

const COURIER_RESPONSES: &[&str] = &[
    "Wait, I have a parcel stuck somewhere?",
    "What's inside the parcel exactly?",
    "I didn't order anything, whose parcel is this?",
    "What do I need to do to release it?",
    "Is there a customs fee I need to pay?",
    "This is strange, can you give me the tracking number?",
    "Okay, how do I clear this?",
    "Is this connected to my identity somehow?",
    "I'm confused, can you explain the parcel issue again?",
    "Alright, tell me what's needed to release it.",
];

const TECH_CONFUSION: &[&str] = &[
    "I'm not very good with computers, can you explain simply?",
    "What do I click on exactly?",
    "I don't see what you're referring to on my screen.",
    "Is this the app you mean, or something else?",
    "Can you repeat the steps slower?",
    "I'm not sure I did that correctly.",
    "Where exactly do I enter that?",
    "Sorry, my screen looks different from what you're describing.",
    "I'm trying to follow, one moment please.",
    "Can you tell me again which button to press?",
];

const STALLING: &[&str] = &[
    "Give me a moment, I'm checking something.",
    "Hold on, let me get my phone unlocked.",
    "Sorry, can you repeat that last part?",
    "I'm just stepping away for a second, don't hang up.",
    "Let me find a pen to write this down.",
    "One moment, someone's at the door.",
    "Sorry, bad network, can you say that again?",
    "I'm looking for my card, just a second.",
    "Hold on, my phone is acting up.",
    "Sorry, give me a minute, I'm multitasking.",
];

const CONTINUATION_PROMPTS: &[&str] = &[
    "Okay, what's next?",
    "Please continue.",
    "I'm listening, go on.",
    "Alright, what do I do now?",
    "Okay, keep going.",
    "Yes, tell me more.",
    "Go ahead, I'm still here.",
    "Okay, and then?",
    "Right, what happens after that?",
    "I'm following, continue please.",
];

struct KeywordMap {
    label: &'static str,
    keywords: &'static [&'static str],
}

fn tactic_keyword_map() -> &'static [KeywordMap] {
    use std::sync::OnceLock;
    static CELL: OnceLock<Vec<KeywordMap>> = OnceLock::new();
    CELL.get_or_init(|| {
        vec![
            KeywordMap { label: "urgency", keywords: &["urgent", "immediately", "right now", "asap", "hurry"] },
            KeywordMap { label: "verification", keywords: &["verify", "confirm your identity", "verification"] },
            KeywordMap { label: "payment_lure", keywords: &["won", "prize", "lottery", "reward", "lucky"] },
            KeywordMap { label: "threat", keywords: &["arrest", "warrant", "court", "legal action", "jail"] },
            KeywordMap { label: "payment_request", keywords: &["send money", "transfer", "pay the", "processing fee"] },
            KeywordMap { label: "digital_arrest", keywords: &["digital arrest", "video call with police", "stay on camera"] },
            KeywordMap { label: "courier", keywords: &["parcel", "courier", "shipment", "customs"] },
            KeywordMap { label: "otp_request", keywords: &["otp", "one time password", "verification code"] },
            KeywordMap { label: "account_request", keywords: &["account number", "ifsc", "bank details"] },
            KeywordMap { label: "credential", keywords: &["password", "pin", "login", "credentials"] },
        ]
    })
}

fn detect_tactics(message: &str) -> HashSet<String> {
    let lower = message.to_lowercase();
    let spaced = format!(" {} ", lower);
    let mut out = HashSet::new();
    for entry in tactic_keyword_map() {
        let hit = entry.keywords.iter().any(|kw| {
            if kw.len() <= 4 || kw.starts_with(' ') || kw.ends_with(' ') {
                spaced.contains(&format!(" {} ", kw.trim()))
            } else {
                lower.contains(kw)
            }
        });
        if hit {
            out.insert(entry.label.to_string());
        }
    }
    out
}

/// Public wrapper so the handler can compute a session's stage without
/// going through a full `get_reply` call (needed to feed the quality
/// tracker's probing-response synthesis).
pub fn stage_for(risk_score: f64, msg_count: i64, is_scam: bool) -> u8 {
    compute_stage(risk_score, msg_count.max(0) as u32, is_scam)
}

fn compute_stage(risk_score: f64, msg_count: u32, is_scam: bool) -> u8 {
    if !is_scam && risk_score < 30.0 {
        return if msg_count <= 3 { 1 } else { 2 };
    }
    if risk_score < 50.0 {
        return 2;
    }
    if risk_score < 80.0 {
        return if msg_count <= 5 { 3 } else { 4 };
    }
    if msg_count >= 6 {
        5
    } else {
        4
    }
}

#[derive(Default)]
struct SessionContext {
    stage: u8,
    history: Vec<String>,
    tactics: HashSet<String>,
    used: HashSet<String>,
}

impl SessionContext {
    fn new() -> Self {
        Self {
            stage: 1,
            ..Default::default()
        }
    }
}

/// Selects a persona reply for each incoming scammer message and tracks
/// per-session stage, accumulated tactics, and anti-repetition state.
pub struct EngagementController {
    contexts: Mutex<HashMap<String, SessionContext>>,
}

impl EngagementController {
    pub fn new() -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_stage(&self, session_id: &str) -> u8 {
        self.contexts.lock().expect("lock poisoned").get(session_id).map(|c| c.stage).unwrap_or(1)
    }

    pub fn get_reply(
        &self,
        session_id: &str,
        message: &str,
        msg_count: u32,
        risk_score: f64,
        is_scam: bool,
    ) -> String {
        let current_tactics = detect_tactics(message);
        let stage = compute_stage(risk_score, msg_count, is_scam);

        let mut guard = self.contexts.lock().expect("lock poisoned");
        let ctx = guard.entry(session_id.to_string()).or_insert_with(SessionContext::new);
        ctx.stage = stage;
        for t in &current_tactics {
            ctx.tactics.insert(t.clone());
        }

        let mut rng = rand::thread_rng();
        let use_continuation =
            is_scam && stage >= 4 && msg_count >= 4 && current_tactics.is_empty() && rng.gen_bool(0.3);

        let pool: &[&str] = if use_continuation {
            CONTINUATION_PROMPTS
        } else {
            select_pool(&current_tactics, stage, msg_count, &mut rng)
        };

        let reply = pick_non_repeat(pool, &mut ctx.used, &mut rng);
        let reply = harden_reply(&reply, is_scam, msg_count, &mut rng);
        ctx.history.push(reply.clone());
        reply
    }

    /// Builds the pipe-delimited investigator note attached to the final callback.
    pub fn generate_agent_notes(
        &self,
        session_id: &str,
        signals: &HashSet<String>,
        scam_type: &str,
        intel_counts: &[(&str, usize)],
        total_msgs: i64,
        duration_secs: i64,
    ) -> String {
        let mut parts = Vec::new();
        parts.push(format!("Classification: {}", title_case(scam_type)));

        let mut sorted_signals: Vec<&String> = signals.iter().collect();
        sorted_signals.sort();
        if !sorted_signals.is_empty() {
            let labels: Vec<String> = sorted_signals.iter().map(|s| s.to_string()).collect();
            parts.push(format!("Detected signals: {}", labels.join(", ")));
        }

        parts.push(format!("Messages exchanged: {total_msgs}"));
        parts.push(format!("Engagement duration: {duration_secs}s"));

        let intel_parts: Vec<String> = intel_counts
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(label, n)| format!("{n} {label}"))
            .collect();
        if intel_parts.is_empty() {
            parts.push("No concrete identifiers extracted; scammer did not share actionable data.".to_string());
        } else {
            parts.push(intel_parts.join(", "));
        }

        let guard = self.contexts.lock().expect("lock poisoned");
        if let Some(ctx) = guard.get(session_id) {
            if !ctx.tactics.is_empty() {
                let mut tactics: Vec<&String> = ctx.tactics.iter().collect();
                tactics.sort();
                let joined: Vec<String> = tactics.iter().map(|s| s.to_string()).collect();
                parts.push(format!("Scammer tactics observed: {}", joined.join(", ")));
            }
        }

        parts.push(format!("Agent engagement reached stage {}/5", self.get_stage(session_id)));
        parts.join(" | ")
    }
}

impl Default for EngagementController {
    fn default() -> Self {
        Self::new()
    }
}

fn select_pool<'a>(
    tactics: &HashSet<String>,
    stage: u8,
    msg_count: u32,
    rng: &mut impl Rng,
) -> &'a [&'a str] {
    if tactics.contains("otp_request") {
        return OTP_RESPONSES;
    }
    if tactics.contains("account_request") {
        return ACCOUNT_RESPONSES;
    }
    if tactics.contains("credential") {
        return TECH_CONFUSION;
    }

    if tactics.contains("courier") {
        return COURIER_RESPONSES;
    }
    if tactics.contains("threat") || tactics.contains("digital_arrest") {
        return THREAT_RESPONSES;
    }
    if tactics.contains("payment_lure") {
        return PAYMENT_LURE_RESPONSES;
    }

    if tactics.contains("verification") || tactics.contains("urgency") {
        if msg_count <= 2 {
            return ACCOUNT_COMPROMISE_RESPONSES;
        }
        return if rng.gen_bool(0.6) { STAGE_3 } else { ACCOUNT_COMPROMISE_RESPONSES };
    }

    match stage {
        1 => STAGE_1,
        2 => STAGE_2,
        3 => STAGE_3,
        4 => {
            if rng.gen_bool(0.75) {
                STAGE_4
            } else {
                STALLING
            }
        }
        _ => {
            if rng.gen_bool(0.8) {
                STAGE_5
            } else {
                CONTINUATION_PROMPTS
            }
        }
    }
}

const RED_FLAG_LEXICON: &[&str] = &[
    "This feels a bit suspicious to me.",
    "Honestly this is making me nervous.",
    "Something about this doesn't sound right.",
    "I want to verify this first, I'm a little worried.",
    "My family would be concerned if they heard this.",
    "This feels like a lot of pressure for something urgent.",
    "I've heard of scams like this, so forgive my caution.",
    "This sounds too good to be true, honestly.",
];

const ELICITATION_LEXICON: &[&str] = &[
    "Can you give me your number so I can note it down?",
    "Tell me the account number again so I can spell it back.",
    "Share the UPI ID once more so I get it right.",
    "What's the reference number I should keep on file?",
    "Can you repeat the case ID so I write it down correctly?",
    "What's the beneficiary name and IFSC for this?",
];

const DETECTION_LEAK_TOKENS: &[&str] = &["scam", "detection", "honeypot", "agent"];

fn contains_any(text: &str, lexicon: &[&str]) -> bool {
    let lower = text.to_lowercase();
    lexicon.iter().any(|phrase| lower.contains(&phrase.to_lowercase()))
}

/// Applies emit-time hardening: injects red-flag/elicitation lexicon when
/// absent, then strips any literal token that would reveal detection.
fn harden_reply(reply: &str, is_scam: bool, msg_count: u32, rng: &mut impl Rng) -> String {
    let mut out = reply.to_string();

    if is_scam && !contains_any(&out, RED_FLAG_LEXICON) {
        let phrase = RED_FLAG_LEXICON.choose(rng).expect("non-empty");
        let connector = COMPOUND_CONNECTORS[rng.gen_range(0..COMPOUND_CONNECTORS.len())];
        out.push_str(connector);
        out.push_str(&lowercase_first(phrase));
    }

    if msg_count >= 2 && !contains_any(&out, ELICITATION_LEXICON) {
        let phrase = ELICITATION_LEXICON.choose(rng).expect("non-empty");
        let connector = COMPOUND_CONNECTORS[rng.gen_range(0..COMPOUND_CONNECTORS.len())];
        out.push_str(connector);
        out.push_str(&lowercase_first(phrase));
    }

    for token in DETECTION_LEAK_TOKENS {
        let pattern = format!("(?i)\\b{token}\\b");
        if let Ok(re) = regex::Regex::new(&pattern) {
            out = re.replace_all(&out, "this").to_string();
        }
    }

    out
}

const COMPOUND_CONNECTORS: &[&str] = &[
    " Also, ",
    " And one more thing — ",
    " By the way, ",
    " While we are on this, ",
    " Oh and also, ",
    " Before I forget — ",
];

fn pick_non_repeat(pool: &[&str], used: &mut HashSet<String>, rng: &mut impl Rng) -> String {
    let unused: Vec<&str> = pool.iter().copied().filter(|p| !used.contains(*p)).collect();
    let chosen = if unused.is_empty() {
        used.clear();
        *pool.choose(rng).expect("non-empty pool")
    } else {
        *unused.choose(rng).expect("non-empty unused set")
    };
    used.insert(chosen.to_string());
    chosen.to_string()
}

fn title_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut c = word.chars();
            match c.next() {
                Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_progression_matches_risk_thresholds() {
        assert_eq!(compute_stage(10.0, 2, false), 1);
        assert_eq!(compute_stage(10.0, 4, false), 2);
        assert_eq!(compute_stage(45.0, 1, true), 2);
        assert_eq!(compute_stage(60.0, 3, true), 3);
        assert_eq!(compute_stage(60.0, 6, true), 4);
        assert_eq!(compute_stage(90.0, 7, true), 5);
        assert_eq!(compute_stage(90.0, 2, true), 4);
    }

    #[test]
    fn otp_tactic_selects_otp_pool() {
        let controller = EngagementController::new();
        let reply = controller.get_reply("s1", "please share the otp now", 2, 20.0, false);
        assert!(OTP_RESPONSES.contains(&reply.as_str()));
    }

    #[test]
    fn replies_do_not_repeat_until_pool_exhausted() {
        let controller = EngagementController::new();
        let mut seen = HashSet::new();
        for i in 0..STAGE_1.len() {
            let reply = controller.get_reply("s2", "hello", i as u32, 5.0, false);
            assert!(!seen.contains(&reply));
            seen.insert(reply);
        }
    }

    #[test]
    fn title_case_handles_snake_case() {
        assert_eq!(title_case("bank_fraud"), "Bank Fraud");
    }
}
