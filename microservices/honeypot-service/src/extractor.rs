//! Extraction and canonicalization of scammer-supplied identifiers.
//!
//! Eight classes are pulled out of free text: phone numbers, bank
//! accounts, UPI ids, phishing links, email addresses, case ids, policy
//! numbers and order numbers. Every class is deduplicated after
//! canonicalization so the same identifier quoted two different ways
//! (`+91 98765 43210` vs `9876543210`) collapses to one entry.
//!
//! The upstream UPI pattern relies on a negative lookahead the `regex`
//! crate's RE2-derived engine cannot express. We drop the lookahead from
//! the pattern and replicate it as a manual post-match character check
//! instead, which is the same technique used for the "contextual" UPI
//! branch of the system this was ported from.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn upi_providers() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        [
            "paytm", "ybl", "oksbi", "okaxis", "okhdfcbank", "okicici", "axisbank", "ibl", "upi",
            "sbi", "hdfcbank", "icici", "axl", "kotak", "yesbank", "idfcfirst", "indus", "pnb",
            "barodampay", "unionbank", "canarabank", "boi", "cnrb", "federal", "rbl", "jupiteraxis",
            "fam", "freecharge", "airtel", "jio", "phonepe", "gpay", "apl", "aubank", "dbs", "dcb",
            "equitas", "kmb", "kvb", "sib", "tjsb", "uco", "united", "utbi", "waicici", "wahdfcbank",
            "yapl", "fbpe", "cub", "idbi", "indianbank", "pingpay", "purz", "rajgovhdfcbank", "sc",
            "timescosmos", "vijb", "citi", "citibank", "hsbc", "hsbcbank", "allbank", "apb",
            "abfspay", "bandhan", "birla", "dlb", "eazypay", "icici.cc", "idfcbank", "imobile",
            "jkb", "karb", "kbl", "lime", "mahb", "nsdl", "payzapp", "psb", "rmbl", "sbicard",
            "shivalikbank", "tapicici", "ubi", "yesg", "fakebank", "fakeupi", "fraudbank",
            "scammerbank", "scamupi",
        ]
        .into_iter()
        .collect()
    })
}

fn email_domain_denylist() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        [
            "gmail", "yahoo", "hotmail", "outlook", "live", "rediffmail", "protonmail", "aol",
            "icloud", "zoho", "yandex", "mail", "msn", "me", "pm", "tutanota",
        ]
        .into_iter()
        .collect()
    })
}

struct CanonicalNormalizer;

impl CanonicalNormalizer {
    fn normalize_phone(raw: &str) -> String {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        let digits = if digits.len() == 12 && digits.starts_with("91") {
            digits[2..].to_string()
        } else if digits.len() == 11 && digits.starts_with('0') {
            digits[1..].to_string()
        } else {
            digits
        };
        if digits.len() == 10 && matches!(digits.as_bytes()[0], b'6'..=b'9') {
            format!("+91{digits}")
        } else {
            digits
        }
    }

    fn normalize_url(raw: &str) -> String {
        raw.trim()
            .to_lowercase()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '>'])
            .to_string()
    }

    fn normalize_upi(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    fn normalize_email(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    fn normalize_bank_account(raw: &str) -> String {
        raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect()
    }

    fn normalize_id_field(raw: &str) -> String {
        raw.chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase()
    }
}

struct WeightedPatterns(Vec<Regex>);

impl WeightedPatterns {
    fn compile(patterns: &[&str]) -> Self {
        Self(
            patterns
                .iter()
                .map(|p| Regex::new(&format!("(?i){p}")).expect("static pattern"))
                .collect(),
        )
    }
}

macro_rules! lazy_patterns {
    ($fn_name:ident, $($pat:expr),+ $(,)?) => {
        fn $fn_name() -> &'static WeightedPatterns {
            static CELL: OnceLock<WeightedPatterns> = OnceLock::new();
            CELL.get_or_init(|| WeightedPatterns::compile(&[$($pat),+]))
        }
    };
}

lazy_patterns!(
    phone_patterns,
    r"\+91[\s\-]?\d{5}[\s\-]?\d{5}",
    r"\+91[\s\-]?\d{10}",
    r"\b91[\s\-]?\d{5}[\s\-]?\d{5}\b",
    r"\b0\d{10}\b",
    r"\b[6-9]\d{9}\b",
    r"\b[6-9]\d{4}[\s\-]\d{5}\b",
    r"\btoll[\s\-]?free\s*:?\s*\d{4}[\s\-]?\d{3}[\s\-]?\d{4}\b",
    r"\b1800[\s\-]?\d{3}[\s\-]?\d{4}\b",
    r"\b0\d{2,4}[\s\-]\d{6,8}\b",
    r"wa\.me/\d{10,12}",
    r"\bwhatsapp\s*:?\s*\+?\d{10,12}\b",
    r"\bcontact\s*(?:number|no\.?|#)?\s*:?\s*(\d[\d\s\-]{8,12}\d)\b",
    r"\bcall\s*(?:me|us)?\s*(?:on|at)?\s*:?\s*(\+?\d[\d\s\-]{8,12}\d)\b",
    r"\bregistered\s*mobile\s*:?\s*(\+?\d[\d\s\-]{8,12}\d)\b",
    r"\bdirect\s*(?:line|number)\s*:?\s*(\+?\d[\d\s\-]{8,12}\d)\b",
    r"\bmy\s*number\s*is\s*:?\s*(\+?\d[\d\s\-]{8,12}\d)\b",
    r"\breach\s*me\s*at\s*:?\s*(\+?\d[\d\s\-]{8,12}\d)\b",
    r"\bcallback\s*(?:number|no\.?)?\s*:?\s*(\+?\d[\d\s\-]{8,12}\d)\b",
);

lazy_patterns!(
    contextual_bank_patterns,
    r"\baccount\s*(?:number|no\.?)\s*:?\s*(\d{9,18})\b",
    r"\ba/c\s*(?:number|no\.?)?\s*:?\s*(\d{9,18})\b",
    r"\bbank\s*account\s*:?\s*(\d{9,18})\b",
    r"\bbeneficiary\s*account\s*:?\s*(\d{9,18})\b",
    r"\bcredit\s*(?:to|into)\s*account\s*(\d{9,18})\b",
    r"\btransfer\s*to\s*(\d{9,18})\b",
);

lazy_patterns!(
    contextual_upi_patterns,
    r"\bupi\s*(?:id|address)?\s*:?\s*([\w.\-]{2,}@[a-zA-Z][a-zA-Z0-9]{1,30})\b",
);

lazy_patterns!(
    url_patterns,
    r"https?://[^\s]+",
    r"www\.[^\s]+",
    r"bit\.ly/[^\s]+",
    r"tinyurl\.com/[^\s]+",
    r"t\.me/[^\s]+",
    r"wa\.me/[^\s]+",
    r"forms\.google\.com/[^\s]+",
    r"\b[a-zA-Z0-9\-]+\.(?:xyz|top|club|cn|tk|ga|ml|gq|cf)\b[^\s]*",
);

lazy_patterns!(
    case_id_patterns,
    r"\bCBI[\-/]?\d{4,}\b",
    r"\bFIR[\-/]?\d{4,}\b",
    r"\bNCB[\-/]?\d{4,}\b",
    r"\bED[\-/]?\d{4,}\b",
    r"\bCYBER[\-/]?\d{4,}\b",
    r"\bITR[\-/]?\d{4,}\b",
    r"\bDRI[\-/]?\d{4,}\b",
    r"\bFRD[\-/]?\d{4,}\b",
    r"\bREFUND[\-/]?\d{4,}\b",
    r"\bcase\s*(?:id|no\.?|number)\s*:?\s*([A-Z0-9\-/]{5,})\b",
    r"\b[A-Z]{2,5}[\-/][A-Z0-9]{2,}[\-/][0-9]{2,}\b",
);

lazy_patterns!(
    policy_number_patterns,
    r"\bPOL[\-/]?\d{4,}\b",
    r"\bINS[\-/]?\d{4,}\b",
    r"\bPOLICY[\-/]?\d{4,}\b",
    r"\bP[\-/]\d{6,}\b",
    r"\bLIC[\-/]?\d{4,}\b",
    r"\bpolicy\s*(?:number|no\.?)\s*:?\s*([A-Z0-9\-/]{5,})\b",
);

lazy_patterns!(
    order_number_patterns,
    r"\bORD[\-/]?\d{4,}\b",
    r"\bTRN\d{4,}\b",
    r"\bTX[N]?\d{4,}\b",
    r"\bAMZ[\-/]?\d{4,}\b",
    r"\bFLK[\-/]?\d{4,}\b",
    r"\bSHIP[\-/]?\d{4,}\b",
    r"\border\s*(?:id|number|no\.?)\s*:?\s*([A-Z0-9\-/]{5,})\b",
    r"\btracking\s*(?:id|number)\s*:?\s*([A-Z0-9\-/]{5,})\b",
    r"\bshipment\s*(?:id|number)\s*:?\s*([A-Z0-9\-/]{5,})\b",
    r"\bconsignment\s*(?:id|number)\s*:?\s*([A-Z0-9\-/]{5,})\b",
    r"\b[A-Z]{2,4}\d{6,}\b",
    r"\border\s+(\d{5,})\b",
);

fn bank_account_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"\b\d{9,18}\b").expect("static"))
}

fn upi_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    // Lookahead `(?![.\-][a-zA-Z0-9])` dropped; validated in `extract_upi_ids`.
    CELL.get_or_init(|| {
        Regex::new(r"\b[\w.\-]{2,}@[a-zA-Z][a-zA-Z0-9]{1,30}\b").expect("static")
    })
}

fn email_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        Regex::new(r"\b[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}\b").expect("static")
    })
}

/// Stable, insertion-ordered set: first-seen canonical form wins, iteration order preserved.
#[derive(Default)]
struct OrderedSet {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedSet {
    fn insert(&mut self, value: String) {
        if self.seen.insert(value.clone()) {
            self.items.push(value);
        }
    }

    fn into_sorted(mut self) -> Vec<String> {
        self.items.sort();
        self.items
    }
}

#[derive(Debug, Clone, Default)]
pub struct Intelligence {
    pub phone_numbers: Vec<String>,
    pub bank_accounts: Vec<String>,
    pub upi_ids: Vec<String>,
    pub phishing_links: Vec<String>,
    pub email_addresses: Vec<String>,
    pub case_ids: Vec<String>,
    pub policy_numbers: Vec<String>,
    pub order_numbers: Vec<String>,
}

impl Intelligence {
    pub fn has_any(&self) -> bool {
        !(self.phone_numbers.is_empty()
            && self.bank_accounts.is_empty()
            && self.upi_ids.is_empty()
            && self.phishing_links.is_empty()
            && self.email_addresses.is_empty()
            && self.case_ids.is_empty()
            && self.policy_numbers.is_empty()
            && self.order_numbers.is_empty())
    }

    pub fn merge(&mut self, other: &Intelligence) {
        self.merge_in(&other.phone_numbers, |s| &mut s.phone_numbers);
        self.merge_in(&other.bank_accounts, |s| &mut s.bank_accounts);
        self.merge_in(&other.upi_ids, |s| &mut s.upi_ids);
        self.merge_in(&other.phishing_links, |s| &mut s.phishing_links);
        self.merge_in(&other.email_addresses, |s| &mut s.email_addresses);
        self.merge_in(&other.case_ids, |s| &mut s.case_ids);
        self.merge_in(&other.policy_numbers, |s| &mut s.policy_numbers);
        self.merge_in(&other.order_numbers, |s| &mut s.order_numbers);
    }

    fn merge_in(&mut self, incoming: &[String], field: impl Fn(&mut Self) -> &mut Vec<String>) {
        let mut set: HashSet<String> = field(self).iter().cloned().collect();
        for item in incoming {
            if set.insert(item.clone()) {
                field(self).push(item.clone());
            }
        }
        field(self).sort();
    }
}

/// Stateless extraction pipeline, applied fresh to each incoming message.
pub struct IntelligenceExtractor;

impl IntelligenceExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> Intelligence {
        Intelligence {
            phone_numbers: self.extract_phones(text),
            bank_accounts: self.extract_bank_accounts(text),
            upi_ids: self.extract_upi_ids(text),
            phishing_links: self.extract_urls(text),
            email_addresses: self.extract_emails(text),
            case_ids: self.extract_case_ids(text),
            policy_numbers: self.extract_policy_numbers(text),
            order_numbers: self.extract_order_numbers(text),
        }
    }

    fn extract_phones(&self, text: &str) -> Vec<String> {
        let mut out = OrderedSet::default();
        for re in &phone_patterns().0 {
            for caps in re.captures_iter(text) {
                let raw = caps.get(1).or_else(|| caps.get(0)).unwrap().as_str();
                out.insert(CanonicalNormalizer::normalize_phone(raw));
            }
        }
        out.into_sorted()
    }

    fn extract_bank_accounts(&self, text: &str) -> Vec<String> {
        let mut out = OrderedSet::default();
        for caps in bank_account_pattern().captures_iter(text) {
            let raw = caps.get(0).unwrap().as_str();
            let n = raw.len();
            if n == 10 && matches!(raw.as_bytes()[0], b'6'..=b'9') {
                continue;
            }
            if n == 4 && raw.starts_with("20") {
                continue;
            }
            out.insert(CanonicalNormalizer::normalize_bank_account(raw));
        }
        for re in &contextual_bank_patterns().0 {
            for caps in re.captures_iter(text) {
                let raw = caps.get(1).or_else(|| caps.get(0)).unwrap().as_str();
                out.insert(CanonicalNormalizer::normalize_bank_account(raw));
            }
        }
        out.into_sorted()
    }

    fn extract_upi_ids(&self, text: &str) -> Vec<String> {
        let mut out = OrderedSet::default();
        for m in upi_pattern().find_iter(text) {
            if Self::upi_lookahead_rejects(text, m.end()) {
                continue;
            }
            let candidate = m.as_str();
            let (handle, domain) = match candidate.split_once('@') {
                Some(parts) => parts,
                None => continue,
            };
            let domain_lower = domain.to_lowercase();
            let is_provider = upi_providers().contains(domain_lower.as_str());
            let is_email_domain = email_domain_denylist().contains(
                domain_lower.split('.').next().unwrap_or(""),
            );
            if is_email_domain && !is_provider {
                continue;
            }
            if handle.len() < 2 {
                continue;
            }
            out.insert(CanonicalNormalizer::normalize_upi(candidate));
        }
        for re in &contextual_upi_patterns().0 {
            for caps in re.captures_iter(text) {
                let raw = caps.get(1).or_else(|| caps.get(0)).unwrap().as_str();
                out.insert(CanonicalNormalizer::normalize_upi(raw));
            }
        }
        out.into_sorted()
    }

    /// Replicates the dropped `(?![.\-][a-zA-Z0-9])` lookahead: reject if the
    /// character right after the match is `.` or `-` followed by alnum.
    fn upi_lookahead_rejects(text: &str, match_end: usize) -> bool {
        let rest = &text[match_end..];
        let mut chars = rest.chars();
        match chars.next() {
            Some('.') | Some('-') => matches!(chars.next(), Some(c) if c.is_ascii_alphanumeric()),
            _ => false,
        }
    }

    fn extract_emails(&self, text: &str) -> Vec<String> {
        let mut out = OrderedSet::default();
        for m in email_pattern().find_iter(text) {
            let candidate = m.as_str();
            let domain = match candidate.split_once('@') {
                Some((_, d)) => d.to_lowercase(),
                None => continue,
            };
            let domain_base = domain.split('.').next().unwrap_or(domain.as_str());
            if upi_providers().contains(domain_base) {
                continue;
            }
            out.insert(CanonicalNormalizer::normalize_email(candidate));
        }
        out.into_sorted()
    }

    fn extract_urls(&self, text: &str) -> Vec<String> {
        let mut out = OrderedSet::default();
        for re in &url_patterns().0 {
            for m in re.find_iter(text) {
                let cleaned = CanonicalNormalizer::normalize_url(m.as_str());
                if cleaned.len() > 5 {
                    out.insert(cleaned);
                }
            }
        }
        out.into_sorted()
    }

    fn extract_case_ids(&self, text: &str) -> Vec<String> {
        let excluded_prefixes = ["pol-", "ins-", "policy-", "p-", "lic-"];
        let mut out = OrderedSet::default();
        for re in &case_id_patterns().0 {
            for caps in re.captures_iter(text) {
                let raw = caps.get(1).or_else(|| caps.get(0)).unwrap().as_str();
                let lower = raw.to_lowercase();
                if excluded_prefixes.iter().any(|p| lower.starts_with(p)) {
                    continue;
                }
                out.insert(CanonicalNormalizer::normalize_id_field(raw));
            }
        }
        out.into_sorted()
    }

    fn extract_policy_numbers(&self, text: &str) -> Vec<String> {
        let mut out = OrderedSet::default();
        for re in &policy_number_patterns().0 {
            for caps in re.captures_iter(text) {
                let raw = caps.get(1).or_else(|| caps.get(0)).unwrap().as_str();
                out.insert(CanonicalNormalizer::normalize_id_field(raw));
            }
        }
        out.into_sorted()
    }

    fn extract_order_numbers(&self, text: &str) -> Vec<String> {
        let mut out = OrderedSet::default();
        for re in &order_number_patterns().0 {
            for caps in re.captures_iter(text) {
                let raw = caps.get(1).or_else(|| caps.get(0)).unwrap().as_str();
                out.insert(CanonicalNormalizer::normalize_id_field(raw));
            }
        }
        out.into_sorted()
    }
}

impl Default for IntelligenceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-session running total of everything extracted so far, so a phone
/// number mentioned in turn 2 is not lost once turn 5 moves on.
pub struct IntelligenceStore {
    extractor: IntelligenceExtractor,
    accumulated: std::sync::Mutex<HashMap<String, Intelligence>>,
}

impl IntelligenceStore {
    pub fn new() -> Self {
        Self {
            extractor: IntelligenceExtractor::new(),
            accumulated: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn extract_and_merge(&self, session_id: &str, text: &str) -> Intelligence {
        let turn_intel = self.extractor.extract(text);
        let mut guard = self.accumulated.lock().expect("lock poisoned");
        let entry = guard.entry(session_id.to_string()).or_insert_with(Intelligence::default);
        entry.merge(&turn_intel);
        entry.clone()
    }

    pub fn get(&self, session_id: &str) -> Intelligence {
        self.accumulated
            .lock()
            .expect("lock poisoned")
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for IntelligenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_phone_with_country_code() {
        let extractor = IntelligenceExtractor::new();
        let intel = extractor.extract("call me on +91 98765 43210 right now");
        assert!(intel.phone_numbers.contains(&"+919876543210".to_string()));
    }

    #[test]
    fn rejects_upi_handle_followed_by_dot_alnum() {
        let extractor = IntelligenceExtractor::new();
        let intel = extractor.extract("visit scam@paytm.fake-domain.com for help");
        assert!(!intel.upi_ids.iter().any(|id| id == "scam@paytm"));
    }

    #[test]
    fn extracts_valid_upi_handle() {
        let extractor = IntelligenceExtractor::new();
        let intel = extractor.extract("pay to agent123@paytm now");
        assert!(intel.upi_ids.contains(&"agent123@paytm".to_string()));
    }

    #[test]
    fn dedupes_across_variants() {
        let extractor = IntelligenceExtractor::new();
        let intel = extractor.extract("my number is 9876543210, also reachable at +91 9876543210");
        assert_eq!(intel.phone_numbers.len(), 1);
    }
}
