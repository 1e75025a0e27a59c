//! Tracks how thoroughly a conversation has investigated the scammer and
//! synthesizes probing follow-ups when the engagement is falling short.
//!
//! Five minima gate "quality met": turns, questions asked, investigative
//! questions, distinct red flags surfaced, and elicitation attempts. When
//! two or more categories are behind and the conversation is already
//! halfway through its minimum turn count, probes are compounded into a
//! single multi-part message instead of asked one at a time.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

const MIN_TURN_COUNT: u32 = 8;
const MIN_QUESTIONS_ASKED: u32 = 5;
const MIN_INVESTIGATIVE_QUESTIONS: u32 = 3;
const MIN_RED_FLAGS: u32 = 5;
const MIN_ELICITATION_ATTEMPTS: u32 = 5;

const INVESTIGATIVE_TEMPLATES: &[&str] = &[
    "Which department are you calling from exactly?",
    "Can you tell me your employee ID?",
    "What is the official name of your organization?",
    "Which branch or office are you calling from?",
    "Can you give me a reference number for this case?",
    "Who is your supervisor I can verify this with?",
    "What is the official website where I can check this?",
    "Can I call back on an official number to confirm?",
    "What documents do you need from me exactly?",
    "How did you get my phone number?",
    "Is there a written notice I can see before responding?",
    "What's the exact amount I owe, and why?",
    "Can you send this request in writing first?",
    "Which court or authority issued this order?",
    "What's your badge or ID number?",
    "Can you confirm my full name and account on file?",
    "Is this related to a specific transaction I made?",
    "What happens if I don't act on this today?",
    "Can you explain the process in more detail?",
    "Who should I escalate this to if I have concerns?",
    "What is the case or complaint number?",
    "Can you provide an official email address?",
    "How long has this case been open?",
    "What proof do you have of this issue?",
    "Is there a government portal I can verify this on?",
    "What's the legal basis for this action?",
    "Can I get this in writing on letterhead?",
    "Who authorized this contact?",
    "What is your direct callback number?",
    "Can you repeat the procedure once more, slowly?",
    "Is there a complaint ID tied to my account?",
    "What's the deadline, exactly, and who set it?",
];

fn red_flag_templates() -> &'static HashMap<&'static str, [&'static str; 4]> {
    use std::sync::OnceLock;
    static CELL: OnceLock<HashMap<&'static str, [&'static str; 4]>> = OnceLock::new();
    CELL.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert("urgency", ["Why does this need to happen right now?", "What happens if I wait a day?", "Why can't this wait until tomorrow?", "Is there really no time to verify this first?"]);
        m.insert("otp_request", ["Why would you need my OTP for this?", "Isn't sharing an OTP against bank policy?", "Can this be done without my OTP?", "Why is the OTP required on your end?"]);
        m.insert("payment_request", ["Why do I need to pay anything for this?", "What is this payment actually for?", "Can this fee be waived instead?", "Why can't the amount be deducted officially?"]);
        m.insert("authority_impersonation", ["Can you prove you're actually from that department?", "Do you have an official ID you can share?", "Is there a way to verify you through the official helpline?", "Why would a government office contact me this way?"]);
        m.insert("suspension", ["Why wasn't I notified earlier through official channels?", "Can I resolve this at a branch instead?", "Is there a formal suspension notice I can see?", "Why is this being resolved over chat?"]);
        m.insert("legal_threat", ["What specific law have I supposedly broken?", "Can I see the actual legal notice?", "Shouldn't a warrant be served in person?", "Why is a legal matter being handled this way?"]);
        m.insert("suspicious_url", ["Why do I need to click a link for this?", "Is there an official site I can go to instead?", "Why isn't this on the bank's known domain?", "Can you describe what the link leads to?"]);
        m.insert("emotional_pressure", ["Why does this feel so urgent and secretive?", "Why was I asked to keep this confidential?", "Is there a reason you don't want me to tell anyone?", "Why the pressure instead of patience?"]);
        m.insert("courier", ["Which courier company is this exactly?", "Can I track this shipment myself?", "Why is customs contacting me directly?", "What's the shipment tracking number?"]);
        m.insert("tech_support", ["Why do you need remote access to my computer?", "Which antivirus flagged this issue?", "Can I verify this through the software vendor?", "Why can't I just restart my computer instead?"]);
        m.insert("job_fraud", ["Why is there a fee to start a job?", "Can I see an official offer letter first?", "Why wasn't this posted on a known job site?", "What company is actually hiring here?"]);
        m.insert("investment", ["Why are the returns guaranteed?", "Can I verify this platform is regulated?", "What happens if the market goes down?", "Why the rush to invest today?"]);
        m.insert("identity_theft", ["Why do you need my Aadhaar details over chat?", "Is there a safer way to verify my identity?", "Why wasn't this requested through an official app?", "What will this information be used for?"]);
        m.insert("phishing", ["Why is this not coming through an official channel?", "Can I verify this by visiting a branch?", "Why is my information needed over message?", "Is there a secure portal for this instead?"]);
        m.insert("fees", ["Why is there a fee for something that should be free?", "Can this fee be confirmed in writing?", "Why wasn't this fee mentioned earlier?", "Is there a way to avoid this charge?"]);
        m.insert("impersonation", ["Can you verify your identity another way?", "Is there someone else I can confirm this with?", "Why would that organization contact me like this?", "Can I call the official number instead?"]);
        m
    })
}

const ELICITATION_TEMPLATES: &[&str] = &[
    "What number should I use to confirm this with you directly?",
    "Can you share the account or UPI ID I should send this to?",
    "What's the best email to reach your department at?",
    "Can I get your direct contact number for my records?",
    "Which UPI handle should this payment go to?",
    "What bank account details do you need me to use?",
    "Is there a case number I should reference when I call back?",
    "What's the official email this is coming from?",
    "Can you give me the exact account number again?",
    "Which number are you calling me from right now?",
    "What's your WhatsApp number in case we get disconnected?",
    "Can you text me the payment link so I have it saved?",
    "What's the reference ID for this transaction?",
    "Is there a toll-free number I can call to verify?",
    "What's the registered number on this account?",
    "Can I get the full details of where to send this?",
    "What identifier should I quote when making the payment?",
    "Which branch code should I use for this transfer?",
    "Can you confirm the UPI ID one more time?",
    "What's the tracking number for this parcel?",
];

const COMPOUND_CONNECTORS: &[&str] = &[
    " Also, ",
    " And one more thing — ",
    " By the way, ",
    " While we are on this, ",
    " Oh and also, ",
    " Before I forget — ",
];

fn map_signal_to_redflag(signal: &str) -> &'static str {
    match signal {
        "account_suspension" => "suspension",
        "prize_lure" => "payment_request",
        "upi_specific" => "payment_request",
        "loan_fraud" => "fees",
        "insurance_fraud" => "fees",
        "romance_scam" => "emotional_pressure",
        "otp_request" => "otp_request",
        "payment_request" => "payment_request",
        "authority_impersonation" => "authority_impersonation",
        "legal_threat" => "legal_threat",
        "suspicious_url" => "suspicious_url",
        "emotional_pressure" => "emotional_pressure",
        "courier" => "courier",
        "tech_support" => "tech_support",
        "job_fraud" => "job_fraud",
        "investment" => "investment",
        "identity_theft" => "identity_theft",
        _ => "urgency",
    }
}

fn intel_keywords() -> &'static HashMap<&'static str, Vec<&'static str>> {
    use std::sync::OnceLock;
    static CELL: OnceLock<HashMap<&'static str, Vec<&'static str>>> = OnceLock::new();
    CELL.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert("phoneNumbers", vec!["phone number", "phone", "contact number", "mobile number", "callback number", "direct number", "registered mobile"]);
        m.insert("upiIds", vec!["upi id", "upi", "upi address"]);
        m.insert("bankAccounts", vec!["account number", "ifsc", "bank account", "bank details", "beneficiary", "bank branch"]);
        m.insert("emailAddresses", vec!["email"]);
        m
    })
}

#[derive(Debug, Default, Clone)]
struct Metrics {
    turn_count: u32,
    questions_asked: u32,
    investigative_questions: u32,
    red_flags_identified: HashSet<String>,
    elicitation_attempts: u32,
    last_response_themes: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct MissingThresholds {
    pub turns: Option<u32>,
    pub questions: Option<u32>,
    pub investigative: Option<u32>,
    pub red_flags: Option<u32>,
    pub elicitation: Option<u32>,
}

impl MissingThresholds {
    pub fn is_empty(&self) -> bool {
        self.turns.is_none()
            && self.questions.is_none()
            && self.investigative.is_none()
            && self.red_flags.is_none()
            && self.elicitation.is_none()
    }

    fn category_count(&self) -> usize {
        [
            self.questions.is_some(),
            self.investigative.is_some(),
            self.red_flags.is_some(),
            self.elicitation.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }
}

struct SessionTracking {
    metrics: Metrics,
    used_investigative: HashSet<usize>,
    used_elicitation: HashSet<usize>,
}

impl SessionTracking {
    fn new() -> Self {
        Self {
            metrics: Metrics::default(),
            used_investigative: HashSet::new(),
            used_elicitation: HashSet::new(),
        }
    }
}

/// Per-session quality bookkeeping and probing-response synthesis.
pub struct QualityTracker {
    sessions: Mutex<HashMap<String, SessionTracking>>,
}

impl QualityTracker {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_turn(&self, session_id: &str) {
        let mut guard = self.sessions.lock().expect("lock poisoned");
        guard.entry(session_id.to_string()).or_insert_with(SessionTracking::new).metrics.turn_count += 1;
    }

    pub fn record_response(&self, session_id: &str, response: &str) {
        let mut guard = self.sessions.lock().expect("lock poisoned");
        let entry = guard.entry(session_id.to_string()).or_insert_with(SessionTracking::new);
        if response.contains('?') {
            entry.metrics.questions_asked += 1;
        }
    }

    pub fn record_investigative_question(&self, session_id: &str) {
        let mut guard = self.sessions.lock().expect("lock poisoned");
        guard.entry(session_id.to_string()).or_insert_with(SessionTracking::new).metrics.investigative_questions += 1;
    }

    pub fn record_red_flag(&self, session_id: &str, flag_type: &str) {
        let mut guard = self.sessions.lock().expect("lock poisoned");
        guard
            .entry(session_id.to_string())
            .or_insert_with(SessionTracking::new)
            .metrics
            .red_flags_identified
            .insert(flag_type.to_string());
    }

    pub fn record_elicitation(&self, session_id: &str) {
        let mut guard = self.sessions.lock().expect("lock poisoned");
        guard.entry(session_id.to_string()).or_insert_with(SessionTracking::new).metrics.elicitation_attempts += 1;
    }

    pub fn thresholds_met(&self, session_id: &str) -> bool {
        self.get_missing_thresholds(session_id).is_empty()
    }

    pub fn get_missing_thresholds(&self, session_id: &str) -> MissingThresholds {
        let guard = self.sessions.lock().expect("lock poisoned");
        let m = match guard.get(session_id) {
            Some(s) => &s.metrics,
            None => {
                return MissingThresholds {
                    turns: Some(MIN_TURN_COUNT),
                    questions: Some(MIN_QUESTIONS_ASKED),
                    investigative: Some(MIN_INVESTIGATIVE_QUESTIONS),
                    red_flags: Some(MIN_RED_FLAGS),
                    elicitation: Some(MIN_ELICITATION_ATTEMPTS),
                }
            }
        };
        let mut missing = MissingThresholds::default();
        if m.turn_count < MIN_TURN_COUNT {
            missing.turns = Some(MIN_TURN_COUNT - m.turn_count);
        }
        if m.questions_asked < MIN_QUESTIONS_ASKED {
            missing.questions = Some(MIN_QUESTIONS_ASKED - m.questions_asked);
        }
        if m.investigative_questions < MIN_INVESTIGATIVE_QUESTIONS {
            missing.investigative = Some(MIN_INVESTIGATIVE_QUESTIONS - m.investigative_questions);
        }
        if (m.red_flags_identified.len() as u32) < MIN_RED_FLAGS {
            missing.red_flags = Some(MIN_RED_FLAGS - m.red_flags_identified.len() as u32);
        }
        if m.elicitation_attempts < MIN_ELICITATION_ATTEMPTS {
            missing.elicitation = Some(MIN_ELICITATION_ATTEMPTS - m.elicitation_attempts);
        }
        missing
    }

    /// Returns a probing follow-up, or `None` if nothing is missing.
    pub fn generate_probing_response(
        &self,
        session_id: &str,
        detected_signals: &HashSet<String>,
        stage: u8,
        intel_obtained: &HashSet<&str>,
    ) -> Option<String> {
        let missing = self.get_missing_thresholds(session_id);
        if missing.is_empty() {
            return None;
        }

        let turns_used = {
            let guard = self.sessions.lock().expect("lock poisoned");
            guard.get(session_id).map(|s| s.metrics.turn_count).unwrap_or(0)
        };

        let categories_missing = missing.category_count();
        let urgent = categories_missing >= 2 && turns_used >= MIN_TURN_COUNT / 2;

        if urgent {
            return Some(self.build_compound_probe(session_id, &missing, detected_signals, stage, intel_obtained));
        }

        if missing.investigative.is_some() {
            if let Some(t) = self.pick_unused_investigative(session_id) {
                return Some(t);
            }
        }

        if missing.red_flags.is_some() {
            let guard = self.sessions.lock().expect("lock poisoned");
            let referenced = guard
                .get(session_id)
                .map(|s| s.metrics.red_flags_identified.clone())
                .unwrap_or_default();
            drop(guard);
            let unreferenced: Vec<&String> = detected_signals.iter().filter(|s| !referenced.contains(*s)).collect();
            if let Some(signal) = unreferenced.choose(&mut rand::thread_rng()) {
                let key = map_signal_to_redflag(signal);
                if let Some(templates) = red_flag_templates().get(key) {
                    let pick = templates.choose(&mut rand::thread_rng()).unwrap();
                    return Some(pick.to_string());
                }
            }
        }

        if missing.elicitation.is_some() && stage >= 3 {
            if let Some(t) = self.pick_unused_elicitation(session_id, intel_obtained) {
                return Some(t);
            }
        }

        self.pick_unused_investigative(session_id)
    }

    fn filtered_elicitation_indices(intel_obtained: &HashSet<&str>) -> Vec<usize> {
        let obtained_keywords: Vec<&str> = intel_obtained
            .iter()
            .filter_map(|class| intel_keywords().get(class))
            .flatten()
            .copied()
            .collect();

        let filtered: Vec<usize> = ELICITATION_TEMPLATES
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                let lower = t.to_lowercase();
                !obtained_keywords.iter().any(|kw| lower.contains(kw))
            })
            .map(|(i, _)| i)
            .collect();

        if filtered.is_empty() {
            (0..ELICITATION_TEMPLATES.len()).collect()
        } else {
            filtered
        }
    }

    fn pick_unused_investigative(&self, session_id: &str) -> Option<String> {
        let mut guard = self.sessions.lock().expect("lock poisoned");
        let entry = guard.entry(session_id.to_string()).or_insert_with(SessionTracking::new);
        let total = INVESTIGATIVE_TEMPLATES.len();
        let unused: Vec<usize> = (0..total).filter(|i| !entry.used_investigative.contains(i)).collect();
        let idx = if unused.is_empty() {
            rand::thread_rng().gen_range(0..total)
        } else {
            let pick = *unused.choose(&mut rand::thread_rng()).unwrap();
            entry.used_investigative.insert(pick);
            pick
        };
        Some(INVESTIGATIVE_TEMPLATES[idx].to_string())
    }

    fn pick_unused_elicitation(&self, session_id: &str, intel_obtained: &HashSet<&str>) -> Option<String> {
        let candidates = Self::filtered_elicitation_indices(intel_obtained);
        let mut guard = self.sessions.lock().expect("lock poisoned");
        let entry = guard.entry(session_id.to_string()).or_insert_with(SessionTracking::new);
        let unused: Vec<usize> = candidates.iter().copied().filter(|i| !entry.used_elicitation.contains(i)).collect();
        let idx = if unused.is_empty() {
            *candidates.choose(&mut rand::thread_rng())?
        } else {
            let pick = *unused.choose(&mut rand::thread_rng()).unwrap();
            entry.used_elicitation.insert(pick);
            pick
        };
        Some(ELICITATION_TEMPLATES[idx].to_string())
    }

    fn build_compound_probe(
        &self,
        session_id: &str,
        missing: &MissingThresholds,
        detected_signals: &HashSet<String>,
        stage: u8,
        intel_obtained: &HashSet<&str>,
    ) -> String {
        let mut parts: Vec<String> = Vec::new();

        if missing.red_flags.is_some() && !detected_signals.is_empty() {
            if let Some(signal) = detected_signals.iter().collect::<Vec<_>>().choose(&mut rand::thread_rng()) {
                let key = map_signal_to_redflag(signal);
                if let Some(templates) = red_flag_templates().get(key) {
                    parts.push(templates.choose(&mut rand::thread_rng()).unwrap().to_string());
                }
            }
        }

        if missing.investigative.is_some() {
            if let Some(t) = self.pick_unused_investigative(session_id) {
                parts.push(t);
            }
        }

        if missing.elicitation.is_some() && stage >= 2 {
            if let Some(t) = self.pick_unused_elicitation(session_id, intel_obtained) {
                parts.push(t);
            }
        }

        if parts.is_empty() {
            return self
                .pick_unused_investigative(session_id)
                .unwrap_or_else(|| INVESTIGATIVE_TEMPLATES[0].to_string());
        }

        let mut out = parts[0].clone();
        for (i, part) in parts.iter().enumerate().skip(1) {
            let connector = COMPOUND_CONNECTORS[i % COMPOUND_CONNECTORS.len()];
            let lowered = lowercase_first(part);
            out.push_str(connector);
            out.push_str(&lowered);
        }
        out
    }
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

impl Default for QualityTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_missing_everything() {
        let tracker = QualityTracker::new();
        assert!(!tracker.thresholds_met("s1"));
    }

    #[test]
    fn thresholds_met_after_sufficient_activity() {
        let tracker = QualityTracker::new();
        for _ in 0..MIN_TURN_COUNT {
            tracker.record_turn("s2");
        }
        for _ in 0..MIN_QUESTIONS_ASKED {
            tracker.record_response("s2", "why is that?");
        }
        for _ in 0..MIN_INVESTIGATIVE_QUESTIONS {
            tracker.record_investigative_question("s2");
        }
        for flag in ["urgency", "otp_request", "payment_request", "authority_impersonation", "suspension"] {
            tracker.record_red_flag("s2", flag);
        }
        for _ in 0..MIN_ELICITATION_ATTEMPTS {
            tracker.record_elicitation("s2");
        }
        assert!(tracker.thresholds_met("s2"));
    }
}
