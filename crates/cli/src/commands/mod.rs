pub mod config;
pub mod doctor;
pub mod eligibility;
pub mod migrate;
pub mod seed;

use leave_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::runtime::Runtime;

/// Exit status plus the single JSON line a command prints.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
enum OutcomeStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: OutcomeStatus,
    error_class: Option<&'a str>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandOutcome<'_> {
    fn into_result(self, exit_code: u8) -> CommandResult {
        let output = serde_json::to_string(&self).unwrap_or_else(|error| {
            json!({
                "command": self.command,
                "status": "error",
                "error_class": "serialization",
                "message": error.to_string(),
            })
            .to_string()
        });
        CommandResult { exit_code, output }
    }
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        CommandOutcome {
            command,
            status: OutcomeStatus::Ok,
            error_class: None,
            message: message.into(),
            data,
        }
        .into_result(0)
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        CommandOutcome {
            command,
            status: OutcomeStatus::Error,
            error_class: Some(error_class),
            message: message.into(),
            data: None,
        }
        .into_result(exit_code)
    }

    /// Wraps output that is already rendered, such as the doctor report.
    pub fn rendered(output: String) -> Self {
        Self { exit_code: 0, output }
    }
}

/// A failed step inside a database command: error class, detail and exit code.
pub(crate) struct StepFailure {
    class: &'static str,
    message: String,
    exit_code: u8,
}

impl StepFailure {
    pub(crate) fn connect(error: impl ToString) -> Self {
        Self { class: "db_connectivity", message: error.to_string(), exit_code: 4 }
    }

    pub(crate) fn migration(error: impl ToString) -> Self {
        Self { class: "migration", message: error.to_string(), exit_code: 5 }
    }

    pub(crate) fn new(class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { class, message: message.into(), exit_code }
    }

    pub(crate) fn into_result(self, command: &str) -> CommandResult {
        CommandResult::failure(command, self.class, self.message, self.exit_code)
    }
}

/// Configuration plus a current-thread runtime, the shared preamble of database commands.
pub(crate) fn prepare(command: &str) -> Result<(AppConfig, Runtime), CommandResult> {
    let config = load_config(command)?;
    Ok((config, async_runtime(command)?))
}

/// Loads configuration, or the exit-code-2 failure every command reports.
pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn async_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}
