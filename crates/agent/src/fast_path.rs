//! Deterministic answers for lookups that never need the language model.

use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

use leave_core::{
    Country, LeavePolicy, LeavePolicyEngine, LeaveSummary, PolicyLookup, RequestContext,
};
use regex::Regex;
use tracing::{info, warn};

const BALANCE_KEYWORDS: &[&str] =
    &["balance", "how many leave", "leave left", "remaining", "how much"];

static INDIA_KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bindian?\b").expect("valid india keyword regex"));

static US_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(us|american|united states)\b").expect("valid us keyword regex")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FastPathIntent {
    Balance,
    CountryPolicy(Country),
}

impl FastPathIntent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::CountryPolicy(Country::India) => "india_policy",
            Self::CountryPolicy(Country::Us) => "us_policy",
        }
    }
}

/// Every detector that matches, in priority order.
pub fn detect(message: &str) -> Vec<FastPathIntent> {
    let message = message.to_lowercase();
    let mut intents = Vec::new();

    if BALANCE_KEYWORDS.iter().any(|keyword| message.contains(keyword)) {
        intents.push(FastPathIntent::Balance);
    }
    if message.contains("policy") {
        if INDIA_KEYWORDS.is_match(&message) {
            intents.push(FastPathIntent::CountryPolicy(Country::India));
        }
        if US_KEYWORDS.is_match(&message) {
            intents.push(FastPathIntent::CountryPolicy(Country::Us));
        }
    }
    intents
}

pub fn format_balance(summary: &LeaveSummary) -> String {
    let lines: Vec<String> = summary
        .leave_balances
        .iter()
        .map(|(leave_type, days)| format!("• {leave_type}: {days} days"))
        .collect();
    format!("Here's your current leave balance:\n\n{}", lines.join("\n"))
}

pub fn format_policies(lookup: &PolicyLookup) -> String {
    let mut text = format!("Here are the leave policies for {} employees:\n\n", lookup.country);
    for (leave_type, policy) in lookup.entries() {
        let _ = writeln!(text, "• **{leave_type}**: {}/year", allowance(policy));
    }
    text
}

fn allowance(policy: &LeavePolicy) -> String {
    match (policy.annual_allowance, policy.allowance_weeks) {
        (Some(days), _) => format!("{days} days"),
        (None, Some(weeks)) => format!("{weeks} weeks"),
        (None, None) => "N/A days".to_string(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FastPathAnswer {
    pub intent: FastPathIntent,
    pub text: String,
}

pub struct FastPath {
    engine: Arc<LeavePolicyEngine>,
}

impl FastPath {
    pub fn new(engine: Arc<LeavePolicyEngine>) -> Self {
        Self { engine }
    }

    /// Tries each matching detector in turn. A failed lookup falls through to the next
    /// detector, and `None` sends the message on to the model.
    pub async fn try_answer(
        &self,
        ctx: &RequestContext,
        employee_id: &str,
        message: &str,
    ) -> Option<FastPathAnswer> {
        for intent in detect(message) {
            let text = match intent {
                FastPathIntent::Balance => {
                    match self.engine.get_employee_leave_summary(ctx, employee_id).await {
                        Ok(summary) => Some(format_balance(&summary)),
                        Err(error) => {
                            warn!(
                                event_name = "agent.fast_path.fallthrough",
                                correlation_id = %ctx.correlation_id(),
                                intent = intent.label(),
                                error = %error,
                                "fast path lookup failed"
                            );
                            None
                        }
                    }
                }
                FastPathIntent::CountryPolicy(country) => {
                    match self.engine.get_leave_policy(ctx, country.code(), None) {
                        Ok(lookup) => Some(format_policies(&lookup)),
                        Err(error) => {
                            warn!(
                                event_name = "agent.fast_path.fallthrough",
                                correlation_id = %ctx.correlation_id(),
                                intent = intent.label(),
                                error = %error,
                                "fast path lookup failed"
                            );
                            None
                        }
                    }
                }
            };

            if let Some(text) = text {
                info!(
                    event_name = "agent.fast_path.answered",
                    correlation_id = %ctx.correlation_id(),
                    intent = intent.label(),
                    "fast path answered"
                );
                return Some(FastPathAnswer { intent, text });
            }
        }
        None
    }
}
