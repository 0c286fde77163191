//! Leave tools exposed to the language model, and the gate every model-issued call passes
//! through before it reaches the engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use leave_core::leave::{CHECK_LEAVE_ELIGIBILITY, GET_EMPLOYEE_LEAVE_SUMMARY, GET_LEAVE_POLICY};
use leave_core::{Country, LeavePolicyEngine, RequestContext};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::guardrails::is_valid_employee_id;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;
    async fn execute(&self, ctx: &RequestContext, input: Value) -> Result<Value>;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolCallRejection {
    #[error("Unknown tool: {name}.")]
    UnknownTool { name: String },
    #[error("Invalid employee_id format: {employee_id}.")]
    InvalidEmployeeId { employee_id: String },
    #[error("Access denied: tools may only read data for the requesting employee.")]
    CrossEmployeeAccess { bound: String, requested: String },
    #[error("Invalid date format: {start_date}. Please use YYYY-MM-DD.")]
    InvalidDate { start_date: String },
    #[error("Invalid country: {country}. Must be 'US' or 'India'.")]
    InvalidCountry { country: String },
    #[error("num_days must be at least 1.")]
    InvalidDayCount,
}

impl ToolCallRejection {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } => "unknown_tool",
            Self::InvalidEmployeeId { .. } => "invalid_employee_id",
            Self::CrossEmployeeAccess { .. } => "cross_employee_access",
            Self::InvalidDate { .. } => "invalid_date",
            Self::InvalidCountry { .. } => "invalid_country",
            Self::InvalidDayCount => "invalid_day_count",
        }
    }

    pub fn to_payload(&self) -> Value {
        json!({ "error": self.to_string(), "success": false })
    }
}

/// Checks the arguments of a model-issued call against the identity bound to the request.
/// Only fields that are present are checked; missing required fields surface when the tool
/// parses its input.
pub fn validate_tool_call(
    input: &Value,
    bound_employee: Option<&str>,
) -> Result<(), ToolCallRejection> {
    if let Some(employee_id) = input.get("employee_id") {
        let employee_id = employee_id.as_str().unwrap_or_default();
        if !is_valid_employee_id(employee_id) {
            return Err(ToolCallRejection::InvalidEmployeeId {
                employee_id: employee_id.to_string(),
            });
        }
        if let Some(bound) = bound_employee {
            if employee_id != bound {
                return Err(ToolCallRejection::CrossEmployeeAccess {
                    bound: bound.to_string(),
                    requested: employee_id.to_string(),
                });
            }
        }
    }

    if let Some(start_date) = input.get("start_date") {
        let start_date = start_date.as_str().unwrap_or_default();
        if NaiveDate::parse_from_str(start_date, "%Y-%m-%d").is_err() {
            return Err(ToolCallRejection::InvalidDate { start_date: start_date.to_string() });
        }
    }

    if let Some(country) = input.get("country") {
        let country = country.as_str().unwrap_or_default();
        if country.parse::<Country>().is_err() {
            return Err(ToolCallRejection::InvalidCountry { country: country.to_string() });
        }
    }

    if let Some(num_days) = input.get("num_days") {
        if num_days.as_u64().map_or(true, |days| days < 1) {
            return Err(ToolCallRejection::InvalidDayCount);
        }
    }

    Ok(())
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn with_leave_tools(engine: Arc<LeavePolicyEngine>) -> Self {
        let mut registry = Self::default();
        registry.register(GetLeavePolicyTool::new(engine.clone()));
        registry.register(CheckLeaveEligibilityTool::new(engine.clone()));
        registry.register(GetEmployeeLeaveSummaryTool::new(engine));
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// Runs a model-issued call and always answers with a JSON payload for the model.
    /// Rejected calls never reach the tool, so they leave no evidence in `ctx`.
    pub async fn dispatch(&self, ctx: &RequestContext, name: &str, input: Value) -> Value {
        let Some(tool) = self.tools.get(name) else {
            let rejection = ToolCallRejection::UnknownTool { name: name.to_string() };
            warn!(
                event_name = "agent.tool_call.rejected",
                correlation_id = %ctx.correlation_id(),
                tool = name,
                reason_code = rejection.reason_code(),
                "tool call rejected"
            );
            return rejection.to_payload();
        };

        let bound_employee = ctx.bound_employee();
        if let Err(rejection) = validate_tool_call(&input, bound_employee.as_deref()) {
            warn!(
                event_name = "agent.tool_call.rejected",
                correlation_id = %ctx.correlation_id(),
                tool = name,
                reason_code = rejection.reason_code(),
                "tool call rejected"
            );
            return rejection.to_payload();
        }

        match tool.execute(ctx, input).await {
            Ok(payload) => {
                info!(
                    event_name = "agent.tool_call.completed",
                    correlation_id = %ctx.correlation_id(),
                    tool = name,
                    "tool call completed"
                );
                payload
            }
            Err(error) => {
                warn!(
                    event_name = "agent.tool_call.failed",
                    correlation_id = %ctx.correlation_id(),
                    tool = name,
                    error = %error,
                    "tool call failed"
                );
                json!({ "error": error.to_string(), "success": false })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PolicyArgs {
    country: String,
    #[serde(default)]
    leave_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EligibilityArgs {
    employee_id: String,
    leave_type: String,
    start_date: String,
    num_days: u32,
}

#[derive(Debug, Deserialize)]
struct SummaryArgs {
    employee_id: String,
}

pub struct GetLeavePolicyTool {
    engine: Arc<LeavePolicyEngine>,
}

impl GetLeavePolicyTool {
    pub fn new(engine: Arc<LeavePolicyEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for GetLeavePolicyTool {
    fn name(&self) -> &'static str {
        GET_LEAVE_POLICY
    }

    fn description(&self) -> &'static str {
        "Return the official leave policy rules for a country, optionally for one leave type."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "country": { "type": "string", "enum": ["US", "India"] },
                "leave_type": {
                    "type": "string",
                    "description": "Leave type such as PTO or Casual Leave. Omit for all types."
                }
            },
            "required": ["country"]
        })
    }

    async fn execute(&self, ctx: &RequestContext, input: Value) -> Result<Value> {
        let args: PolicyArgs =
            serde_json::from_value(input).context("invalid get_leave_policy arguments")?;
        Ok(match self.engine.get_leave_policy(ctx, &args.country, args.leave_type.as_deref()) {
            Ok(lookup) => lookup.to_payload(),
            Err(error) => error.to_payload(),
        })
    }
}

pub struct CheckLeaveEligibilityTool {
    engine: Arc<LeavePolicyEngine>,
}

impl CheckLeaveEligibilityTool {
    pub fn new(engine: Arc<LeavePolicyEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for CheckLeaveEligibilityTool {
    fn name(&self) -> &'static str {
        CHECK_LEAVE_ELIGIBILITY
    }

    fn description(&self) -> &'static str {
        "Check whether the employee may take a specific leave request against balance, notice, \
         consecutive-day and blackout rules."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "employee_id": { "type": "string", "description": "Employee id such as E001" },
                "leave_type": { "type": "string" },
                "start_date": { "type": "string", "description": "YYYY-MM-DD" },
                "num_days": { "type": "integer", "minimum": 1 }
            },
            "required": ["employee_id", "leave_type", "start_date", "num_days"]
        })
    }

    async fn execute(&self, ctx: &RequestContext, input: Value) -> Result<Value> {
        let args: EligibilityArgs =
            serde_json::from_value(input).context("invalid check_leave_eligibility arguments")?;
        let decision = self
            .engine
            .check_leave_eligibility(
                ctx,
                &args.employee_id,
                &args.leave_type,
                &args.start_date,
                args.num_days,
            )
            .await;
        Ok(decision.to_payload())
    }
}

pub struct GetEmployeeLeaveSummaryTool {
    engine: Arc<LeavePolicyEngine>,
}

impl GetEmployeeLeaveSummaryTool {
    pub fn new(engine: Arc<LeavePolicyEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for GetEmployeeLeaveSummaryTool {
    fn name(&self) -> &'static str {
        GET_EMPLOYEE_LEAVE_SUMMARY
    }

    fn description(&self) -> &'static str {
        "Return the employee's profile and current leave balances."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "employee_id": { "type": "string", "description": "Employee id such as E001" }
            },
            "required": ["employee_id"]
        })
    }

    async fn execute(&self, ctx: &RequestContext, input: Value) -> Result<Value> {
        let args: SummaryArgs = serde_json::from_value(input)
            .context("invalid get_employee_leave_summary arguments")?;
        Ok(match self.engine.get_employee_leave_summary(ctx, &args.employee_id).await {
            Ok(summary) => summary.to_payload(),
            Err(error) => error.to_payload(),
        })
    }
}
