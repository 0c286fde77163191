use std::sync::LazyLock;

use leave_core::config::EnforcementStrictness;
use regex::Regex;

pub const ACCESS_DENIED_MESSAGE: &str =
    "Access denied: you can only request your own leave information.";
pub const VERIFY_ELIGIBILITY_MESSAGE: &str =
    "Let me verify your eligibility using our official policy database.";
pub const CANNOT_PROCESS_MESSAGE: &str = "I cannot process that request.";

static MENTIONED_EMPLOYEE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bE\d{3,}\b").expect("valid employee mention regex"));

static EMPLOYEE_ID_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^E\d{3,}$").expect("valid employee id regex"));

/// Phrases that announce an eligibility outcome. Matched as lowercase substrings.
const DECISION_PHRASES: &[&str] = &[
    "approved",
    "not approved",
    "eligible",
    "not eligible",
    "you can take",
    "you cannot take",
    "you may take",
    "request is valid",
];

/// Questions that can only be answered from authoritative data.
static HARD_INTENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bcan i take\b.*\bleave\b",
        r"\bam i (eligible|allowed)\b",
        r"\bapprove\b.*\bleave\b",
        r"\bbook\b.*\bleave\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid hard intent regex"))
    .collect()
});

static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)ignore (all )?previous instructions",
        r"(?i)disregard.*rules",
        r"(?i)you are now",
        r"(?i)<script>",
        r"(?i)drop table",
        r"(?i)select \* from",
        r"\.\./\.\./\.\./",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid injection regex"))
    .collect()
});

static SSN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid ssn regex"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@([A-Za-z0-9.-]+\.[A-Za-z]{2,})\b").expect("valid email regex")
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: &'static str },
}

impl GuardrailDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub enforcement: EnforcementStrictness,
}

impl GuardrailPolicy {
    pub fn new(enforcement: EnforcementStrictness) -> Self {
        Self { enforcement }
    }

    /// Rejects a message that names an employee other than the one bound to the session.
    pub fn check_identity(&self, bound_employee: Option<&str>, message: &str) -> GuardrailDecision {
        match bound_employee {
            Some(bound) if mentioned_employees(message).any(|mentioned| mentioned != bound) => {
                GuardrailDecision::Deny {
                    reason_code: "cross_employee_access",
                    user_message: ACCESS_DENIED_MESSAGE,
                }
            }
            _ => GuardrailDecision::Allow,
        }
    }

    pub fn screen_input(&self, message: &str) -> GuardrailDecision {
        if INJECTION_PATTERNS.iter().any(|pattern| pattern.is_match(message)) {
            GuardrailDecision::Deny {
                reason_code: "suspicious_input",
                user_message: CANNOT_PROCESS_MESSAGE,
            }
        } else {
            GuardrailDecision::Allow
        }
    }

    /// Decides whether a model answer may reach the user given the tool evidence gathered
    /// during the same request.
    pub fn review_answer(
        &self,
        message: &str,
        answer: &str,
        has_tool_evidence: bool,
    ) -> GuardrailDecision {
        if has_tool_evidence {
            return GuardrailDecision::Allow;
        }
        if contains_decision_language(answer) {
            return GuardrailDecision::Deny {
                reason_code: "unverified_decision",
                user_message: VERIFY_ELIGIBILITY_MESSAGE,
            };
        }
        if self.enforcement == EnforcementStrictness::VerifiedTopic
            && requires_verified_data(message)
        {
            return GuardrailDecision::Deny {
                reason_code: "unverified_answer",
                user_message: VERIFY_ELIGIBILITY_MESSAGE,
            };
        }
        GuardrailDecision::Allow
    }
}

pub fn mentioned_employees(message: &str) -> impl Iterator<Item = &str> {
    MENTIONED_EMPLOYEE_ID.find_iter(message).map(|found| found.as_str())
}

pub fn is_valid_employee_id(employee_id: &str) -> bool {
    EMPLOYEE_ID_FORMAT.is_match(employee_id)
}

pub fn contains_decision_language(text: &str) -> bool {
    let text = text.to_lowercase();
    DECISION_PHRASES.iter().any(|phrase| text.contains(phrase))
}

pub fn requires_verified_data(message: &str) -> bool {
    let message = message.to_lowercase();
    HARD_INTENT_PATTERNS.iter().any(|pattern| pattern.is_match(&message))
}

/// Masks social security numbers and the local part of email addresses.
pub fn redact_sensitive(text: &str) -> String {
    let masked = SSN.replace_all(text, "XXX-XX-XXXX");
    EMAIL.replace_all(&masked, "****@$1").into_owned()
}
