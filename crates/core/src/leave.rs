//! Policy lookup, eligibility decisions and balance summaries.
//!
//! These three operations are the only source of authoritative answers about leave. Each one
//! records itself in the caller's [`RequestContext`] so the routing layer can tell verified
//! answers apart from model-generated text.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::catalog::PolicyProvider;
use crate::directory::EmployeeDirectory;
use crate::domain::employee::EmployeeRecord;
use crate::domain::policy::{BlackoutPeriod, Country, CountryPolicies, LeavePolicy};
use crate::request_context::RequestContext;

pub const GET_LEAVE_POLICY: &str = "get_leave_policy";
pub const CHECK_LEAVE_ELIGIBILITY: &str = "check_leave_eligibility";
pub const GET_EMPLOYEE_LEAVE_SUMMARY: &str = "get_employee_leave_summary";

const LOW_BALANCE_THRESHOLD: u32 = 5;

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Wall clock in the server's local time zone.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LeaveToolError {
    #[error("Invalid country: {country}. Must be 'US' or 'India'.")]
    InvalidCountry { country: String },
    #[error("Leave type '{leave_type}' not found for {country}. Please check the leave type name.")]
    LeaveTypeNotFound { country: Country, leave_type: String },
    #[error("No leave policies found for {country}.")]
    NoPolicyData { country: Country },
    #[error("Employee {employee_id} not found.")]
    EmployeeNotFound { employee_id: String },
}

impl LeaveToolError {
    pub fn to_payload(&self) -> Value {
        json!({ "error": self.to_string(), "success": false })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PolicyDetail {
    Single(LeavePolicy),
    All(CountryPolicies),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PolicyLookup {
    pub country: Country,
    /// The requested leave type, or `"all"`.
    pub leave_type: String,
    pub policy: PolicyDetail,
}

impl PolicyLookup {
    /// `(leave type, policy)` pairs in catalogue order.
    pub fn entries(&self) -> Vec<(&str, &LeavePolicy)> {
        match &self.policy {
            PolicyDetail::Single(policy) => vec![(self.leave_type.as_str(), policy)],
            PolicyDetail::All(policies) => {
                policies.iter().map(|(name, policy)| (name.as_str(), policy)).collect()
            }
        }
    }

    pub fn to_payload(&self) -> Value {
        json!({
            "country": self.country,
            "leave_type": self.leave_type,
            "policy": self.policy,
            "success": true,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LeaveSummary {
    pub employee_id: String,
    pub name: String,
    pub department: String,
    pub country: String,
    pub hire_date: NaiveDate,
    pub leave_balances: BTreeMap<String, u32>,
}

impl LeaveSummary {
    pub fn to_payload(&self) -> Value {
        let mut payload = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Some(object) = payload.as_object_mut() {
            object.insert("success".to_string(), Value::Bool(true));
        }
        payload
    }
}

/// Why a leave request failed, in evaluation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ineligibility {
    EmployeeNotFound { employee_id: String },
    LeaveTypeUnavailable { leave_type: String, country: String },
    InvalidDate { start_date: String },
    InsufficientBalance { leave_type: String, current_balance: u32, requested_days: u32 },
    InsufficientNotice { leave_type: String, required_notice_days: u32, actual_notice_days: i64 },
    ExceedsMaxConsecutive { leave_type: String, max_allowed: u32, requested: u32 },
    BlackoutOverlap { period: BlackoutPeriod },
}

impl Ineligibility {
    pub fn reason(&self) -> String {
        match self {
            Self::EmployeeNotFound { employee_id } => {
                format!("Employee {employee_id} not found in system.")
            }
            Self::LeaveTypeUnavailable { leave_type, country } => {
                format!("Leave type '{leave_type}' not available for {country} employees.")
            }
            Self::InvalidDate { start_date } => {
                format!("Invalid date format: {start_date}. Please use YYYY-MM-DD.")
            }
            Self::InsufficientBalance { leave_type, current_balance, requested_days } => format!(
                "Insufficient {leave_type} balance. You have {current_balance} days available \
                 but requested {requested_days} days."
            ),
            Self::InsufficientNotice { leave_type, required_notice_days, actual_notice_days } => {
                format!(
                    "Insufficient notice period. {leave_type} requires {required_notice_days} \
                     days notice, but leave starts in {actual_notice_days} days."
                )
            }
            Self::ExceedsMaxConsecutive { leave_type, max_allowed, requested } => format!(
                "{leave_type} allows maximum {max_allowed} consecutive days, but you requested \
                 {requested} days."
            ),
            Self::BlackoutOverlap { period } => format!(
                "Requested dates overlap with blackout period ({} to {}). Please choose \
                 different dates.",
                period.start.format("%Y-%m-%d"),
                period.end.format("%Y-%m-%d")
            ),
        }
    }

    pub fn to_payload(&self) -> Value {
        let mut payload = json!({ "eligible": false, "reason": self.reason() });
        let extra = match self {
            Self::EmployeeNotFound { .. }
            | Self::LeaveTypeUnavailable { .. }
            | Self::InvalidDate { .. } => json!({ "error": true }),
            Self::InsufficientBalance { current_balance, requested_days, .. } => json!({
                "current_balance": current_balance,
                "requested_days": requested_days,
                "shortage": requested_days - current_balance,
            }),
            Self::InsufficientNotice { required_notice_days, actual_notice_days, .. } => json!({
                "required_notice_days": required_notice_days,
                "actual_notice_days": actual_notice_days,
            }),
            Self::ExceedsMaxConsecutive { max_allowed, requested, .. } => {
                json!({ "max_allowed": max_allowed, "requested": requested })
            }
            Self::BlackoutOverlap { period } => json!({ "blackout_period": period.to_string() }),
        };
        if let (Some(target), Value::Object(fields)) = (payload.as_object_mut(), extra) {
            target.extend(fields);
        }
        payload
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApprovedLeave {
    pub current_balance: u32,
    pub requested_days: u32,
    pub balance_after: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub warnings: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EligibilityDecision {
    Eligible(ApprovedLeave),
    Ineligible(Ineligibility),
}

impl EligibilityDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible(_))
    }

    pub fn reason(&self) -> String {
        match self {
            Self::Eligible(_) => "Leave request is eligible for approval.".to_string(),
            Self::Ineligible(ineligibility) => ineligibility.reason(),
        }
    }

    pub fn to_payload(&self) -> Value {
        match self {
            Self::Eligible(approved) => json!({
                "eligible": true,
                "reason": self.reason(),
                "current_balance": approved.current_balance,
                "requested_days": approved.requested_days,
                "balance_after": approved.balance_after,
                "start_date": approved.start_date.format("%Y-%m-%d").to_string(),
                "end_date": approved.end_date.format("%Y-%m-%d").to_string(),
                "warnings": approved.warnings,
                "next_steps": approved.next_steps,
            }),
            Self::Ineligible(ineligibility) => ineligibility.to_payload(),
        }
    }
}

pub struct LeavePolicyEngine {
    directory: Arc<dyn EmployeeDirectory>,
    policies: Arc<dyn PolicyProvider>,
    clock: Arc<dyn Clock>,
}

impl LeavePolicyEngine {
    pub fn new(directory: Arc<dyn EmployeeDirectory>, policies: Arc<dyn PolicyProvider>) -> Self {
        Self { directory, policies, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub fn get_leave_policy(
        &self,
        ctx: &RequestContext,
        country: &str,
        leave_type: Option<&str>,
    ) -> Result<PolicyLookup, LeaveToolError> {
        ctx.record_tool_invocation(GET_LEAVE_POLICY);

        let country = country
            .parse::<Country>()
            .map_err(|_| LeaveToolError::InvalidCountry { country: country.to_string() })?;
        let policies = self
            .policies
            .country_policies(country)
            .ok_or(LeaveToolError::NoPolicyData { country })?;

        let leave_type = leave_type.map(str::trim).filter(|value| !value.is_empty());
        let lookup = match leave_type {
            Some(leave_type) => {
                let policy = policies.get(leave_type).cloned().ok_or_else(|| {
                    LeaveToolError::LeaveTypeNotFound {
                        country,
                        leave_type: leave_type.to_string(),
                    }
                })?;
                PolicyLookup {
                    country,
                    leave_type: leave_type.to_string(),
                    policy: PolicyDetail::Single(policy),
                }
            }
            None => PolicyLookup {
                country,
                leave_type: "all".to_string(),
                policy: PolicyDetail::All(policies.clone()),
            },
        };

        info!(
            event_name = "leave.policy.lookup",
            correlation_id = %ctx.correlation_id(),
            country = %lookup.country,
            leave_type = %lookup.leave_type,
            "leave policy resolved"
        );
        Ok(lookup)
    }

    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub async fn check_leave_eligibility(
        &self,
        ctx: &RequestContext,
        employee_id: &str,
        leave_type: &str,
        start_date: &str,
        num_days: u32,
    ) -> EligibilityDecision {
        ctx.record_tool_invocation(CHECK_LEAVE_ELIGIBILITY);

        let decision = self.evaluate(employee_id, leave_type, start_date, num_days).await;
        info!(
            event_name = "leave.eligibility.decided",
            correlation_id = %ctx.correlation_id(),
            employee_id,
            leave_type,
            eligible = decision.is_eligible(),
            "leave eligibility evaluated"
        );
        decision
    }

    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub async fn get_employee_leave_summary(
        &self,
        ctx: &RequestContext,
        employee_id: &str,
    ) -> Result<LeaveSummary, LeaveToolError> {
        ctx.record_tool_invocation(GET_EMPLOYEE_LEAVE_SUMMARY);

        let employee = self.resolve_employee(employee_id).await.ok_or_else(|| {
            LeaveToolError::EmployeeNotFound { employee_id: employee_id.to_string() }
        })?;

        Ok(LeaveSummary {
            employee_id: employee.employee_id.0,
            name: employee.name,
            department: employee.department,
            country: employee.country,
            hire_date: employee.hire_date,
            leave_balances: employee.leave_balances,
        })
    }

    async fn evaluate(
        &self,
        employee_id: &str,
        leave_type: &str,
        start_date: &str,
        num_days: u32,
    ) -> EligibilityDecision {
        use EligibilityDecision::Ineligible;

        let Some(employee) = self.resolve_employee(employee_id).await else {
            return Ineligible(Ineligibility::EmployeeNotFound {
                employee_id: employee_id.to_string(),
            });
        };

        let policy = employee
            .country
            .parse::<Country>()
            .ok()
            .and_then(|country| self.policies.policy(country, leave_type));
        let Some(policy) = policy else {
            return Ineligible(Ineligibility::LeaveTypeUnavailable {
                leave_type: leave_type.to_string(),
                country: employee.country.clone(),
            });
        };

        let invalid_date = || {
            Ineligible(Ineligibility::InvalidDate { start_date: start_date.to_string() })
        };
        let Ok(start) = NaiveDate::parse_from_str(start_date.trim(), "%Y-%m-%d") else {
            return invalid_date();
        };
        let Some(end) = start.checked_add_signed(Duration::days(i64::from(num_days) - 1)) else {
            return invalid_date();
        };

        let current_balance = employee.balance(leave_type);
        if current_balance < num_days {
            return Ineligible(Ineligibility::InsufficientBalance {
                leave_type: leave_type.to_string(),
                current_balance,
                requested_days: num_days,
            });
        }

        if policy.min_notice_days > 0 {
            let notice_days = whole_days_until(start, self.clock.now());
            if notice_days < i64::from(policy.min_notice_days) {
                return Ineligible(Ineligibility::InsufficientNotice {
                    leave_type: leave_type.to_string(),
                    required_notice_days: policy.min_notice_days,
                    actual_notice_days: notice_days,
                });
            }
        }

        if let Some(max_allowed) = policy.max_consecutive_days {
            if num_days > max_allowed {
                return Ineligible(Ineligibility::ExceedsMaxConsecutive {
                    leave_type: leave_type.to_string(),
                    max_allowed,
                    requested: num_days,
                });
            }
        }

        let blackout = policy.blackout_periods.iter().find(|period| period.overlaps(start, end));
        if let Some(period) = blackout {
            return Ineligible(Ineligibility::BlackoutOverlap { period: *period });
        }

        let balance_after = current_balance - num_days;
        EligibilityDecision::Eligible(ApprovedLeave {
            current_balance,
            requested_days: num_days,
            balance_after,
            start_date: start,
            end_date: end,
            warnings: warnings_for(policy, num_days, balance_after),
            next_steps: next_steps_for(policy),
        })
    }

    async fn resolve_employee(
        &self,
        employee_id: &str,
    ) -> Option<EmployeeRecord> {
        match self.directory.employee(employee_id).await {
            Ok(record) => record,
            Err(error) => {
                warn!(
                    event_name = "leave.directory.lookup_failed",
                    employee_id,
                    error = %error,
                    "employee lookup failed; treating employee as unresolved"
                );
                None
            }
        }
    }
}

/// `floor((start at 00:00 - now) / 1 day)`, negative when the start date is in the past.
fn whole_days_until(start: NaiveDate, now: NaiveDateTime) -> i64 {
    let midnight = start.and_time(chrono::NaiveTime::MIN);
    midnight.signed_duration_since(now).num_seconds().div_euclid(86_400)
}

fn warnings_for(policy: &LeavePolicy, num_days: u32, balance_after: u32) -> Vec<String> {
    let mut warnings = Vec::new();
    if policy.approval_required {
        warnings.push("Manager approval required".to_string());
    }
    if let Some(threshold) = policy.documentation_required_after_days {
        if threshold > 0 && num_days > threshold {
            warnings.push(format!("Medical documentation required for {num_days} days"));
        }
    }
    if balance_after < LOW_BALANCE_THRESHOLD {
        warnings.push(format!("Low balance warning: only {balance_after} days will remain"));
    }
    warnings
}

fn next_steps_for(policy: &LeavePolicy) -> Vec<String> {
    let approval = if policy.approval_required {
        "Await manager approval"
    } else {
        "Request will be auto-approved"
    };
    vec!["Submit leave request through HR portal".to_string(), approval.to_string()]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::json;

    use super::{
        whole_days_until, EligibilityDecision, FixedClock, Ineligibility, LeavePolicyEngine,
        LeaveToolError, CHECK_LEAVE_ELIGIBILITY, GET_EMPLOYEE_LEAVE_SUMMARY, GET_LEAVE_POLICY,
    };
    use crate::catalog::PolicyCatalog;
    use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
    use crate::directory::{
        DirectoryError, EmployeeDirectory, InMemoryEmployeeDirectory, ResilientDirectory,
    };
    use crate::domain::employee::EmployeeRecord;
    use crate::domain::policy::Country;
    use crate::request_context::RequestContext;

    fn at(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
    }

    fn engine_at(now: &str) -> LeavePolicyEngine {
        LeavePolicyEngine::new(
            Arc::new(InMemoryEmployeeDirectory::with_demo_employees()),
            Arc::new(PolicyCatalog::standard()),
        )
        .with_clock(Arc::new(FixedClock(at(now))))
    }

    fn ineligibility(decision: EligibilityDecision) -> Option<Ineligibility> {
        match decision {
            EligibilityDecision::Ineligible(reason) => Some(reason),
            EligibilityDecision::Eligible(_) => None,
        }
    }

    #[test]
    fn policy_lookup_returns_single_policy_and_records_invocation() {
        let engine = engine_at("2026-10-19 09:00:00");
        let ctx = RequestContext::default();

        let lookup = engine.get_leave_policy(&ctx, "US", Some("PTO"));
        let payload = lookup.map(|lookup| lookup.to_payload()).unwrap_or_default();

        assert_eq!(payload["success"], json!(true));
        assert_eq!(payload["country"], json!("US"));
        assert_eq!(payload["policy"]["annual_allowance"], json!(20));
        assert_eq!(payload["policy"]["blackout_periods"][0]["start"], json!("2026-12-20"));
        assert_eq!(ctx.tools_invoked(), vec![GET_LEAVE_POLICY.to_string()]);
    }

    #[test]
    fn policy_lookup_without_leave_type_returns_every_policy() {
        let engine = engine_at("2026-10-19 09:00:00");
        let ctx = RequestContext::default();

        let lookup = engine.get_leave_policy(&ctx, "india", None);
        let names: Vec<String> = lookup
            .map(|lookup| lookup.entries().iter().map(|(name, _)| name.to_string()).collect())
            .unwrap_or_default();

        assert_eq!(
            names,
            vec!["Casual Leave", "Optional Holidays", "Privilege Leave", "Sick Leave"]
        );
    }

    #[test]
    fn countries_outside_us_and_india_are_rejected() {
        let engine = engine_at("2026-10-19 09:00:00");
        let ctx = RequestContext::default();

        for country in ["UK", "", "Germany", "U S"] {
            let result = engine.get_leave_policy(&ctx, country, None);
            assert_eq!(
                result.map(|lookup| lookup.country),
                Err(LeaveToolError::InvalidCountry { country: country.to_string() })
            );
        }
        assert_eq!(ctx.tools_invoked().len(), 4);
    }

    #[test]
    fn unknown_leave_type_and_missing_country_data_are_distinguished() {
        let engine = LeavePolicyEngine::new(
            Arc::new(InMemoryEmployeeDirectory::with_demo_employees()),
            Arc::new(PolicyCatalog::empty()),
        );
        let ctx = RequestContext::default();
        let missing = engine.get_leave_policy(&ctx, "US", None).map(|lookup| lookup.leave_type);
        assert_eq!(missing, Err(LeaveToolError::NoPolicyData { country: Country::Us }));

        let engine = engine_at("2026-10-19 09:00:00");
        let unknown =
            engine.get_leave_policy(&ctx, "US", Some("Sabbatical")).map(|lookup| lookup.leave_type);
        let error = unknown.err();
        assert_eq!(
            error.as_ref().map(ToString::to_string).as_deref(),
            Some("Leave type 'Sabbatical' not found for US. Please check the leave type name.")
        );
        assert_eq!(error.map(|error| error.to_payload()["success"].clone()), Some(json!(false)));
    }

    #[tokio::test]
    async fn start_date_tomorrow_fails_the_pto_notice_check() {
        let engine = engine_at("2026-10-19 10:30:00");
        let ctx = RequestContext::default();

        let decision = engine.check_leave_eligibility(&ctx, "E001", "PTO", "2026-10-20", 3).await;
        let payload = decision.to_payload();

        assert_eq!(payload["eligible"], json!(false));
        assert_eq!(payload["required_notice_days"], json!(3));
        assert_eq!(payload["actual_notice_days"], json!(0));
        assert!(payload["reason"].as_str().unwrap_or_default().contains("notice period"));
        assert_eq!(ctx.tools_invoked(), vec![CHECK_LEAVE_ELIGIBILITY.to_string()]);
    }

    #[tokio::test]
    async fn pto_inside_year_end_blackout_is_ineligible() {
        let engine = engine_at("2026-10-19 10:30:00");
        let ctx = RequestContext::default();

        let decision = engine.check_leave_eligibility(&ctx, "E001", "PTO", "2026-12-23", 3).await;
        let payload = decision.to_payload();

        assert_eq!(payload["eligible"], json!(false));
        assert_eq!(payload["blackout_period"], json!("2026-12-20:2026-12-31"));
        assert!(payload["reason"].as_str().unwrap_or_default().contains("blackout"));
    }

    #[tokio::test]
    async fn request_ending_on_first_blackout_day_still_overlaps() {
        let engine = engine_at("2026-10-19 10:30:00");
        let ctx = RequestContext::default();

        let touching = engine.check_leave_eligibility(&ctx, "E001", "PTO", "2026-12-18", 3).await;
        assert!(matches!(
            ineligibility(touching),
            Some(Ineligibility::BlackoutOverlap { .. })
        ));

        let clear = engine.check_leave_eligibility(&ctx, "E001", "PTO", "2026-12-17", 3).await;
        assert!(clear.is_eligible());
    }

    #[tokio::test]
    async fn insufficient_balance_reports_shortage() {
        let engine = engine_at("2026-10-19 10:30:00");
        let ctx = RequestContext::default();

        let decision =
            engine.check_leave_eligibility(&ctx, "E002", "Privilege Leave", "2026-11-20", 20).await;
        let payload = decision.to_payload();

        assert_eq!(payload["eligible"], json!(false));
        assert_eq!(payload["current_balance"], json!(12));
        assert_eq!(payload["requested_days"], json!(20));
        assert_eq!(payload["shortage"], json!(8));
    }

    #[tokio::test]
    async fn checks_short_circuit_in_documented_order() {
        let engine = engine_at("2026-10-19 10:30:00");
        let ctx = RequestContext::default();

        let unknown = engine.check_leave_eligibility(&ctx, "E999", "PTO", "not-a-date", 99).await;
        assert_eq!(
            ineligibility(unknown),
            Some(Ineligibility::EmployeeNotFound { employee_id: "E999".to_string() })
        );

        let wrong_country =
            engine.check_leave_eligibility(&ctx, "E001", "Casual Leave", "not-a-date", 99).await;
        assert!(matches!(
            ineligibility(wrong_country),
            Some(Ineligibility::LeaveTypeUnavailable { ref country, .. }) if country == "US"
        ));

        let bad_date = engine.check_leave_eligibility(&ctx, "E001", "PTO", "12/01/2026", 99).await;
        assert!(matches!(ineligibility(bad_date), Some(Ineligibility::InvalidDate { .. })));

        let over_balance =
            engine.check_leave_eligibility(&ctx, "E002", "Casual Leave", "2026-10-20", 11).await;
        assert!(matches!(
            ineligibility(over_balance),
            Some(Ineligibility::InsufficientBalance { current_balance: 10, .. })
        ));

        let too_long =
            engine.check_leave_eligibility(&ctx, "E002", "Casual Leave", "2026-10-20", 4).await;
        assert_eq!(
            ineligibility(too_long),
            Some(Ineligibility::ExceedsMaxConsecutive {
                leave_type: "Casual Leave".to_string(),
                max_allowed: 3,
                requested: 4,
            })
        );
    }

    #[tokio::test]
    async fn eligible_request_carries_warnings_and_next_steps() {
        let engine = engine_at("2026-10-19 10:30:00");
        let ctx = RequestContext::default();

        let decision = engine.check_leave_eligibility(&ctx, "E001", "PTO", "2026-11-02", 10).await;
        let payload = decision.to_payload();

        assert_eq!(payload["eligible"], json!(true));
        assert_eq!(payload["reason"], json!("Leave request is eligible for approval."));
        assert_eq!(payload["balance_after"], json!(5));
        assert_eq!(payload["end_date"], json!("2026-11-11"));
        assert_eq!(payload["warnings"], json!(["Manager approval required"]));
        assert_eq!(
            payload["next_steps"],
            json!(["Submit leave request through HR portal", "Await manager approval"])
        );
    }

    #[tokio::test]
    async fn sick_leave_beyond_threshold_needs_documentation_and_auto_approves() {
        let engine = engine_at("2026-10-19 10:30:00");
        let ctx = RequestContext::default();

        let decision =
            engine.check_leave_eligibility(&ctx, "E001", "Sick Leave", "2026-10-19", 4).await;
        let payload = decision.to_payload();

        assert_eq!(payload["eligible"], json!(true));
        assert_eq!(
            payload["warnings"],
            json!([
                "Medical documentation required for 4 days",
                "Low balance warning: only 4 days will remain"
            ])
        );
        assert_eq!(payload["next_steps"][1], json!("Request will be auto-approved"));
    }

    #[tokio::test]
    async fn eligibility_is_idempotent_for_identical_inputs() {
        let engine = engine_at("2026-10-19 10:30:00");
        let ctx = RequestContext::default();

        let first = engine.check_leave_eligibility(&ctx, "E001", "PTO", "2026-11-02", 2).await;
        let second = engine.check_leave_eligibility(&ctx, "E001", "PTO", "2026-11-02", 2).await;

        assert_eq!(first, second);
        assert_eq!(ctx.tools_invoked().len(), 2);
    }

    #[tokio::test]
    async fn summary_for_unknown_employee_reports_not_found() {
        let engine = engine_at("2026-10-19 10:30:00");
        let ctx = RequestContext::default();

        let summary = engine.get_employee_leave_summary(&ctx, "E999").await;
        let payload = summary
            .map(|summary| summary.to_payload())
            .unwrap_or_else(|error| error.to_payload());

        assert_eq!(payload["success"], json!(false));
        assert!(payload["error"].as_str().unwrap_or_default().contains("not found"));
        assert_eq!(ctx.tools_invoked(), vec![GET_EMPLOYEE_LEAVE_SUMMARY.to_string()]);
    }

    #[tokio::test]
    async fn summary_lists_identity_and_balances() {
        let engine = engine_at("2026-10-19 10:30:00");
        let ctx = RequestContext::default();

        let payload = engine
            .get_employee_leave_summary(&ctx, "E002")
            .await
            .map(|summary| summary.to_payload())
            .unwrap_or_default();

        assert_eq!(payload["success"], json!(true));
        assert_eq!(payload["name"], json!("Priya Sharma"));
        assert_eq!(payload["hire_date"], json!("2021-06-10"));
        assert_eq!(payload["leave_balances"]["Optional Holidays"], json!(2));
    }

    struct BrokenDirectory;

    #[async_trait]
    impl EmployeeDirectory for BrokenDirectory {
        async fn employee(&self, _: &str) -> Result<Option<EmployeeRecord>, DirectoryError> {
            Err(DirectoryError::Query("syntax error near SELECT".to_string()))
        }
    }

    #[tokio::test]
    async fn engine_keeps_answering_through_breaker_fallback() {
        let breaker =
            Arc::new(CircuitBreaker::new("employee-directory", CircuitBreakerConfig::default()));
        let directory = ResilientDirectory::new(
            Arc::new(BrokenDirectory),
            InMemoryEmployeeDirectory::with_demo_employees(),
            breaker,
        );
        let engine =
            LeavePolicyEngine::new(Arc::new(directory), Arc::new(PolicyCatalog::standard()));
        let ctx = RequestContext::default();

        let summary = engine.get_employee_leave_summary(&ctx, "E001").await;
        assert_eq!(summary.map(|summary| summary.name), Ok("John Doe".to_string()));
    }

    #[test]
    fn whole_day_difference_floors_toward_negative_infinity() {
        let start = NaiveDate::from_ymd_opt(2026, 10, 22).unwrap_or_default();

        assert_eq!(whole_days_until(start, at("2026-10-19 00:00:00")), 3);
        assert_eq!(whole_days_until(start, at("2026-10-19 00:00:01")), 2);
        assert_eq!(whole_days_until(start, at("2026-10-22 12:00:00")), -1);
    }
}
