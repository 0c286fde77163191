//! Readiness report for operators: configuration, language model setup and database reach.

use leave_core::config::{AppConfig, DirectorySource, LlmProvider, LoadOptions};
use leave_db::connect_with_config;
use serde::Serialize;

use crate::commands::async_runtime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

impl CheckStatus {
    fn marker(self) -> &'static str {
        match self {
            Self::Pass => "ok",
            Self::Fail => "fail",
            Self::Skipped => "skip",
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let failed = checks.iter().filter(|check| check.status == CheckStatus::Fail).count();
        let (overall_status, summary) = match failed {
            0 => (CheckStatus::Pass, "doctor: no readiness check failed".to_string()),
            n => (CheckStatus::Fail, format!("doctor: {n} readiness check(s) failed")),
        };
        Self { overall_status, summary, checks }
    }
}

pub fn run(json_output: bool) -> String {
    let report = DoctorReport::from_checks(collect_checks());

    if !json_output {
        return render_human(&report);
    }
    serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
        serde_json::json!({
            "overall_status": "fail",
            "summary": "doctor serialization failed",
            "error": error.to_string(),
        })
        .to_string()
    })
}

fn collect_checks() -> Vec<DoctorCheck> {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            let skipped = "skipped because configuration did not load";
            return vec![
                DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string()),
                DoctorCheck::new("llm_readiness", CheckStatus::Skipped, skipped),
                DoctorCheck::new("database_connectivity", CheckStatus::Skipped, skipped),
            ];
        }
    };

    vec![
        DoctorCheck::new(
            "config_validation",
            CheckStatus::Pass,
            format!("configuration loaded for environment `{}`", config.environment),
        ),
        llm_readiness(&config),
        database_connectivity(&config),
    ]
}

fn llm_readiness(config: &AppConfig) -> DoctorCheck {
    let llm = &config.llm;
    let details = match llm.provider {
        LlmProvider::Offline => "offline demo model; no provider credentials needed".to_string(),
        LlmProvider::OpenAi => {
            format!("api key configured for `{}` at {}", llm.model, llm.resolved_base_url())
        }
        LlmProvider::Ollama => {
            format!("local model `{}` at {}", llm.model, llm.resolved_base_url())
        }
    };
    DoctorCheck::new("llm_readiness", CheckStatus::Pass, details)
}

fn database_connectivity(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "database_connectivity";

    let runtime = match async_runtime("doctor") {
        Ok(runtime) => runtime,
        Err(_) => {
            return DoctorCheck::new(NAME, CheckStatus::Fail, "failed to initialize async runtime")
        }
    };
    let reached = runtime.block_on(async {
        let pool = connect_with_config(&config.database).await.map_err(|e| e.to_string())?;
        pool.close().await;
        Ok::<(), String>(())
    });

    match reached {
        Ok(()) => DoctorCheck::new(
            NAME,
            CheckStatus::Pass,
            format!("connected using `{}`", config.database.url),
        ),
        // Only the database directory source needs a reachable database.
        Err(error) if config.directory.source == DirectorySource::Database => DoctorCheck::new(
            NAME,
            CheckStatus::Fail,
            format!("failed to connect to database: {error}"),
        ),
        Err(error) => DoctorCheck::new(
            NAME,
            CheckStatus::Skipped,
            format!("failed to connect to database: {error} (directory.source = mock)"),
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    std::iter::once(report.summary.clone())
        .chain(report.checks.iter().map(|check| {
            format!("- [{}] {}: {}", check.status.marker(), check.name, check.details)
        }))
        .collect::<Vec<_>>()
        .join("\n")
}
