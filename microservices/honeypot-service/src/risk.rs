//! Weighted-regex risk scoring over a conversation.
//!
//! Eighteen signal layers — nine "core" social-engineering tactics plus
//! nine "auxiliary" scam-family fingerprints — are scored independently
//! against each incoming message and accumulated across the whole
//! session. Once the cumulative score crosses the detection threshold
//! the session latches `scam_detected` and picks a scam type from the
//! triggered signal set; neither ever reverts.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

const SCAM_THRESHOLD: f64 = 40.0;

struct Layer {
    name: &'static str,
    patterns: Vec<(Regex, f64)>,
}

fn compile_layer(name: &'static str, patterns: &[(&str, f64)]) -> Layer {
    Layer {
        name,
        patterns: patterns
            .iter()
            .map(|(p, w)| (Regex::new(&format!("(?i){p}")).expect("static pattern"), *w))
            .collect(),
    }
}

macro_rules! lazy_layer {
    ($fn_name:ident, $name:expr, $($pat:expr => $w:expr),+ $(,)?) => {
        fn $fn_name() -> &'static Layer {
            static CELL: OnceLock<Layer> = OnceLock::new();
            CELL.get_or_init(|| compile_layer($name, &[$(($pat, $w)),+]))
        }
    };
}

lazy_layer!(
    urgency_layer, "urgency",
    r"\b(urgent|urgently|immediate(?:ly)?|right\s*now|asap)\b" => 12.0,
    r"\b(act\s*now|do\s*it\s*now|hurry|time\s*is\s*running\s*out)\b" => 12.0,
    r"\b(within\s*\d+\s*(?:minutes?|hours?)|expires?\s*(?:today|soon))\b" => 14.0,
    r"\b(last\s*(?:chance|warning)|final\s*notice)\b" => 14.0,
    r"\b(jaldi|abhi|turant)\b" => 10.0,
    r"\b(deadline|time\s*(?:running|left)|before\s*\d+)\b" => 12.0,
    r"\b(don'?t\s*wait|limited\s*time|time\s*sensitive)\b" => 14.0,
    r"\bnow\b" => 10.0,
);

lazy_layer!(
    authority_layer, "authority_impersonation",
    r"\b(rbi|reserve\s*bank|income\s*tax\s*department|cbi|central\s*bureau)\b" => 18.0,
    r"\b(police|cyber\s*cell|cyber\s*crime)\b" => 18.0,
    r"\b(customs|narcotics|enforcement\s*directorate|\bed\b)\b" => 18.0,
    r"\b(trai|telecom\s*regulatory)\b" => 16.0,
    r"\b(supreme\s*court|high\s*court|magistrate)\b" => 18.0,
    r"\b(government\s*official|sarkari\s*adhikari)\b" => 14.0,
    r"\b(sbi|state\s*bank|hdfc|icici|axis\s*bank|kotak|pnb)\b" => 10.0,
);

lazy_layer!(
    otp_layer, "otp_request",
    r"\b(otp|one\s*time\s*password|verification\s*code)\b" => 20.0,
    r"\b(share\s*(?:the|your)\s*(?:otp|code)|send\s*(?:me\s*)?(?:the\s*)?otp)\b" => 22.0,
    r"\b(6\s*digit\s*code|confirmation\s*code)\b" => 18.0,
);

lazy_layer!(
    payment_layer, "payment_request",
    r"\b(send\s*money|transfer\s*(?:funds|amount)|make\s*(?:a\s*)?payment)\b" => 16.0,
    r"\b(pay\s*(?:the\s*)?(?:fee|fine|penalty|charges))\b" => 16.0,
    r"\b(processing\s*fee|security\s*deposit|refundable\s*deposit)\b" => 14.0,
    r"\b(gift\s*card|google\s*play\s*card|itunes\s*card)\b" => 18.0,
    r"\b(?:send|transfer|pay)\s*(?:me|us|the|now|rs|₹|\$|\d+)\b" => 18.0,
);

lazy_layer!(
    suspension_layer, "account_suspension",
    r"\b(account\s*(?:will\s*be\s*)?(?:suspended|blocked|frozen|deactivated))\b" => 18.0,
    r"\b(your\s*(?:sim|card|service)\s*will\s*be\s*(?:blocked|disconnected))\b" => 18.0,
    r"\b(kyc\s*(?:update|expir\w*|pending))\b" => 16.0,
    r"\b(account\s*(?:will\s*be\s*)?permanently\s*closed)\b" => 18.0,
    r"\b(?:suspend|block|deactivat|freez|terminat|clos|lock)(?:ed|ing|ion|ure)?\b" => 16.0,
);

lazy_layer!(
    lure_layer, "prize_lure",
    r"\b(you\s*(?:have\s*)?won|congratulations.*(?:won|selected))\b" => 16.0,
    r"\b(lottery|lucky\s*draw|lucky\s*winner)\b" => 18.0,
    r"\b(cash\s*prize|free\s*gift|claim\s*your\s*(?:prize|reward))\b" => 16.0,
);

lazy_layer!(
    url_layer, "suspicious_url",
    r"https?://[^\s]+" => 10.0,
    r"\b(click\s*(?:the|this)?\s*link|visit\s*(?:this|the)\s*(?:link|site))\b" => 12.0,
    r"bit\.ly|tinyurl|wa\.me|t\.me" => 14.0,
);

lazy_layer!(
    emotional_layer, "emotional_pressure",
    r"\b(trust\s*me|i\s*(?:promise|swear))\b" => 8.0,
    r"\b(don'?t\s*tell\s*anyone|keep\s*this\s*(?:confidential|secret))\b" => 14.0,
    r"\b(you\s*(?:will\s*be\s*)?arrested|jail|warrant\s*(?:issued|against\s*you))\b" => 16.0,
);

lazy_layer!(
    legal_threat_layer, "legal_threat",
    r"\b(legal\s*action|court\s*case|fir\s*(?:will\s*be\s*)?(?:filed|registered))\b" => 16.0,
    r"\b(non[\s\-]?bailable\s*warrant|arrest\s*warrant)\b" => 18.0,
    r"\b(money\s*laundering|digital\s*arrest)\b" => 18.0,
);

lazy_layer!(
    courier_aux, "courier",
    r"\b(parcel|courier|shipment)\s*(?:is\s*)?(?:held|seized|stuck)\b" => 14.0,
    r"\b(fedex|dhl|blue\s*dart|customs\s*clearance)\b" => 12.0,
    r"\billegal\s*(?:items|substances)\s*found\s*in\s*(?:your\s*)?parcel\b" => 16.0,
);

lazy_layer!(
    upi_aux, "upi_specific",
    r"[\w.\-]+@(?:paytm|ybl|oksbi|okaxis|okhdfcbank|upi)\b" => 16.0,
    r"\b(upi\s*pin|upi\s*id)\b" => 12.0,
    r"\bscan\s*(?:the\s*)?qr\s*code\b" => 14.0,
);

lazy_layer!(
    invest_aux, "investment",
    r"\b(guaranteed\s*returns?|double\s*your\s*money)\b" => 16.0,
    r"\b(crypto|bitcoin|trading\s*(?:platform|app))\b" => 12.0,
    r"\b(invest(?:ment)?\s*(?:opportunity|scheme))\b" => 14.0,
);

lazy_layer!(
    tech_support_aux, "tech_support",
    r"\b(your\s*computer\s*(?:has\s*a\s*)?virus|malware\s*detected)\b" => 16.0,
    r"\b(remote\s*access|anydesk|teamviewer|quick\s*support)\b" => 18.0,
    r"\b(microsoft\s*support|windows\s*support\s*team)\b" => 14.0,
);

lazy_layer!(
    job_fraud_aux, "job_fraud",
    r"\b(work\s*from\s*home|part[\s\-]?time\s*job)\b" => 10.0,
    r"\b(registration\s*fee|training\s*fee)\s*(?:for\s*the\s*job)?\b" => 16.0,
    r"\b(daily\s*(?:task|income)|earn\s*\d+\s*per\s*day)\b" => 14.0,
);

lazy_layer!(
    loan_fraud_aux, "loan_fraud",
    r"\b(instant\s*loan|pre[\s\-]?approved\s*loan)\b" => 14.0,
    r"\b(processing\s*fee\s*(?:for|to)\s*(?:disburse|release)\s*(?:the\s*)?loan)\b" => 18.0,
    r"\bno\s*credit\s*check\b" => 10.0,
);

lazy_layer!(
    insurance_fraud_aux, "insurance_fraud",
    r"\b(policy\s*(?:has\s*)?matured|bonus\s*amount\s*pending)\b" => 16.0,
    r"\b(insurance\s*(?:claim|refund)\s*(?:pending|approved))\b" => 14.0,
);

lazy_layer!(
    romance_scam_aux, "romance_scam",
    r"\b(i\s*love\s*you|my\s*dear|sweetheart)\b" => 8.0,
    r"\b(stuck\s*at\s*(?:customs|airport)|need\s*money\s*to\s*(?:come|fly)\s*(?:home|to\s*you))\b" => 18.0,
);

lazy_layer!(
    identity_theft_aux, "identity_theft",
    r"\b(aadhaar\s*(?:number|card)|pan\s*(?:number|card))\s*(?:verification|details)\b" => 16.0,
    r"\b(your\s*identity\s*(?:has\s*been\s*)?(?:stolen|misused))\b" => 14.0,
);

fn core_layers() -> &'static [&'static Layer] {
    static CELL: OnceLock<Vec<&'static Layer>> = OnceLock::new();
    CELL.get_or_init(|| {
        vec![
            urgency_layer(),
            authority_layer(),
            otp_layer(),
            payment_layer(),
            suspension_layer(),
            lure_layer(),
            url_layer(),
            emotional_layer(),
            legal_threat_layer(),
        ]
    })
}

fn auxiliary_layers() -> &'static [&'static Layer] {
    static CELL: OnceLock<Vec<&'static Layer>> = OnceLock::new();
    CELL.get_or_init(|| {
        vec![
            courier_aux(),
            upi_aux(),
            invest_aux(),
            tech_support_aux(),
            job_fraud_aux(),
            loan_fraud_aux(),
            insurance_fraud_aux(),
            romance_scam_aux(),
            identity_theft_aux(),
        ]
    })
}

fn escalation_bonus(distinct_categories: usize) -> f64 {
    let table: &[(usize, f64)] = &[(2, 10.0), (3, 28.0), (4, 45.0), (5, 60.0), (6, 72.0), (7, 85.0), (8, 100.0)];
    table
        .iter()
        .rev()
        .find(|(k, _)| distinct_categories >= *k)
        .map(|(_, v)| *v)
        .unwrap_or(0.0)
}

fn greeting_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| {
        [
            r"^\s*(hi|hello|hey)[\s!.,?]*$",
            r"^\s*(good\s*morning|good\s*afternoon|good\s*evening)[\s!.,?]*$",
            r"^\s*(namaste|namaskar)[\s!.,?]*$",
            r"^\s*(kaise\s*ho|kaisa\s*hai|how\s*are\s*you)[\s!.,?]*$",
        ]
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("static"))
        .collect()
    })
}

fn is_pure_greeting(text: &str) -> bool {
    greeting_patterns().iter().any(|re| re.is_match(text.trim()))
}

const VALID_SCAM_TYPES: &[&str] = &[
    "bank_fraud",
    "upi_fraud",
    "phishing",
    "lottery",
    "impersonation",
    "courier",
    "investment",
    "tech_support",
    "job_fraud",
    "loan_fraud",
    "insurance_fraud",
    "unknown",
];

#[derive(Debug, Clone, Default)]
pub struct RiskProfile {
    pub cumulative_score: f64,
    pub turn_scores: Vec<f64>,
    pub triggered_signals: HashSet<String>,
    pub signal_counts: HashMap<String, u32>,
    pub scam_detected: bool,
    pub scam_type: String,
    pub message_count: u32,
}

impl RiskProfile {
    fn new() -> Self {
        Self {
            scam_type: "unknown".to_string(),
            ..Default::default()
        }
    }

    pub fn confidence_level(&self) -> f64 {
        (self.cumulative_score / 100.0).clamp(0.0, 1.0)
    }
}

pub struct TurnResult {
    pub turn_score: f64,
    pub newly_detected: bool,
    pub turn_signals: HashSet<String>,
}

/// Thread-safe accumulator; one `RiskProfile` per session id.
pub struct RiskAccumulator {
    profiles: std::sync::Mutex<HashMap<String, RiskProfile>>,
}

impl RiskAccumulator {
    pub fn new() -> Self {
        Self {
            profiles: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn profile(&self, session_id: &str) -> RiskProfile {
        self.profiles
            .lock()
            .expect("lock poisoned")
            .get(session_id)
            .cloned()
            .unwrap_or_else(RiskProfile::new)
    }

    pub fn analyze_message(&self, session_id: &str, text: &str) -> TurnResult {
        let mut profiles = self.profiles.lock().expect("lock poisoned");
        let profile = profiles.entry(session_id.to_string()).or_insert_with(RiskProfile::new);

        if text.trim().is_empty() {
            return TurnResult {
                turn_score: 0.0,
                newly_detected: false,
                turn_signals: HashSet::new(),
            };
        }

        profile.message_count += 1;

        if profile.message_count == 1 && is_pure_greeting(text) {
            profile.turn_scores.push(0.0);
            return TurnResult {
                turn_score: 0.0,
                newly_detected: false,
                turn_signals: HashSet::new(),
            };
        }

        let mut turn_score = 0.0_f64;
        let mut turn_signals: HashSet<String> = HashSet::new();

        for layer in core_layers().iter().chain(auxiliary_layers().iter()) {
            let layer_score: f64 = layer
                .patterns
                .iter()
                .filter(|(re, _)| re.is_match(text))
                .map(|(_, w)| *w)
                .sum();
            if layer_score > 0.0 {
                turn_score += layer_score;
                turn_signals.insert(layer.name.to_string());
                *profile.signal_counts.entry(layer.name.to_string()).or_insert(0) += 1;
            }
        }

        for signal in &turn_signals {
            profile.triggered_signals.insert(signal.clone());
        }

        let escalation = escalation_bonus(turn_signals.len());
        let repeat_bonus: f64 = profile
            .signal_counts
            .values()
            .map(|&count| match count {
                2 => 6.0,
                n if n >= 3 => 12.0,
                _ => 0.0,
            })
            .sum();

        profile.cumulative_score += turn_score + escalation + repeat_bonus;
        profile.turn_scores.push(turn_score);

        let mut newly_detected = false;
        if profile.cumulative_score >= SCAM_THRESHOLD && !profile.scam_detected {
            profile.scam_detected = true;
            profile.scam_type = classify(&profile.triggered_signals);
            newly_detected = true;
        }

        TurnResult {
            turn_score,
            newly_detected,
            turn_signals,
        }
    }
}

impl Default for RiskAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(signals: &HashSet<String>) -> String {
    let has = |s: &str| signals.contains(s);
    let scam_type = if has("courier") {
        "courier"
    } else if has("investment") {
        "investment"
    } else if has("tech_support") {
        "tech_support"
    } else if has("job_fraud") {
        "job_fraud"
    } else if has("loan_fraud") {
        "loan_fraud"
    } else if has("insurance_fraud") {
        "insurance_fraud"
    } else if has("romance_scam") {
        "impersonation"
    } else if has("upi_specific") {
        "upi_fraud"
    } else if has("prize_lure") {
        "lottery"
    } else if has("authority_impersonation") {
        "impersonation"
    } else if has("otp_request") || has("suspicious_url") {
        "phishing"
    } else if has("account_suspension") || has("payment_request") {
        "bank_fraud"
    } else if has("legal_threat") {
        "impersonation"
    } else if has("identity_theft") {
        "phishing"
    } else {
        "unknown"
    };
    debug_assert!(VALID_SCAM_TYPES.contains(&scam_type));
    scam_type.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pure_greeting_scores_zero() {
        let acc = RiskAccumulator::new();
        let result = acc.analyze_message("s1", "hello");
        assert_eq!(result.turn_score, 0.0);
        assert!(!result.newly_detected);
    }

    #[test]
    fn otp_request_latches_detection_once_threshold_crossed() {
        let acc = RiskAccumulator::new();
        acc.analyze_message("s2", "this is urgent, your account will be suspended");
        let r = acc.analyze_message("s2", "share the otp now to confirm your identity");
        let profile = acc.profile("s2");
        assert!(profile.cumulative_score >= SCAM_THRESHOLD || !r.newly_detected);
    }

    #[test]
    fn score_is_monotonic_non_decreasing() {
        let acc = RiskAccumulator::new();
        let mut last = 0.0;
        for msg in ["hi", "urgent otp required", "send otp now or account suspended"] {
            acc.analyze_message("s3", msg);
            let profile = acc.profile("s3");
            assert!(profile.cumulative_score >= last);
            last = profile.cumulative_score;
        }
    }

    #[test]
    fn classify_prefers_courier_over_generic_signals() {
        let mut signals = HashSet::new();
        signals.insert("courier".to_string());
        signals.insert("account_suspension".to_string());
        assert_eq!(classify(&signals), "courier");
    }
}
