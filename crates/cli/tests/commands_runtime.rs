use std::env;
use std::sync::{Mutex, OnceLock};

use leave_cli::commands::eligibility::{self, EligibilityArgs};
use leave_cli::commands::{doctor, migrate, seed};
use serde_json::Value;

const IN_MEMORY_DB: (&str, &str) = ("LEAVE_DATABASE_URL", "sqlite::memory:");

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[IN_MEMORY_DB], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_openai_without_key() {
    with_env(&[IN_MEMORY_DB, ("LEAVE_LLM_PROVIDER", "openai")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_loads_the_demo_directory() {
    with_env(&[IN_MEMORY_DB], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "demo employee directory loaded: E001, E002");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(&[IN_MEMORY_DB], || {
        let first = parse_payload(&seed::run().output);
        let second = parse_payload(&seed::run().output);

        assert_eq!(first["status"], "ok");
        assert_eq!(second["status"], "ok");
        assert_eq!(first["message"], second["message"]);
    });
}

#[test]
fn eligibility_approves_a_request_within_policy() {
    with_env(&[IN_MEMORY_DB], || {
        let result = eligibility::run(&args("E001", "Sick Leave", "2099-06-01", 1));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "eligibility");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "Leave request is eligible for approval.");
        assert_eq!(payload["data"]["eligible"], true);
        assert_eq!(payload["data"]["balance_after"], 7);
    });
}

#[test]
fn eligibility_reports_ineligibility_as_data() {
    struct Case {
        employee_id: &'static str,
        leave_type: &'static str,
        start_date: &'static str,
        num_days: u32,
        reason: &'static str,
    }

    let cases = [
        Case {
            employee_id: "E999",
            leave_type: "PTO",
            start_date: "2099-06-01",
            num_days: 1,
            reason: "Employee E999 not found in system.",
        },
        Case {
            employee_id: "E001",
            leave_type: "PTO",
            start_date: "06/01/2099",
            num_days: 1,
            reason: "Invalid date format: 06/01/2099. Please use YYYY-MM-DD.",
        },
        Case {
            employee_id: "E001",
            leave_type: "Casual Leave",
            start_date: "2099-06-01",
            num_days: 1,
            reason: "Leave type 'Casual Leave' not available for US employees.",
        },
    ];

    with_env(&[IN_MEMORY_DB], || {
        for case in &cases {
            let result = eligibility::run(&args(
                case.employee_id,
                case.leave_type,
                case.start_date,
                case.num_days,
            ));
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["data"]["eligible"], false, "case: {}", case.reason);
            assert_eq!(payload["message"], case.reason);
        }
    });
}

#[test]
fn doctor_passes_with_demo_configuration() {
    with_env(&[IN_MEMORY_DB], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .map(|checks| checks.iter().filter_map(|check| check["name"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(names, vec!["config_validation", "llm_readiness", "database_connectivity"]);
    });
}

#[test]
fn doctor_fails_when_config_is_invalid() {
    with_env(&[("LEAVE_DATABASE_URL", "postgres://nope")], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

fn args(employee_id: &str, leave_type: &str, start_date: &str, num_days: u32) -> EligibilityArgs {
    EligibilityArgs {
        employee_id: employee_id.to_string(),
        leave_type: leave_type.to_string(),
        start_date: start_date.to_string(),
        num_days,
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "LEAVE_ENVIRONMENT",
        "LEAVE_DATABASE_URL",
        "LEAVE_DATABASE_MAX_CONNECTIONS",
        "LEAVE_DATABASE_TIMEOUT_SECS",
        "LEAVE_DIRECTORY_SOURCE",
        "LEAVE_LLM_PROVIDER",
        "LEAVE_LLM_API_KEY",
        "OPENAI_API_KEY",
        "LEAVE_LLM_BASE_URL",
        "LEAVE_LLM_MODEL",
        "LEAVE_LLM_TIMEOUT_SECS",
        "LEAVE_LLM_MAX_RETRIES",
        "LEAVE_LLM_MAX_TOOL_ROUNDS",
        "LEAVE_SESSIONS_MAX_SESSIONS",
        "LEAVE_SESSIONS_MAX_HISTORY",
        "LEAVE_SESSIONS_TTL_SECS",
        "LEAVE_CIRCUIT_BREAKER_FAILURE_THRESHOLD",
        "LEAVE_CIRCUIT_BREAKER_TIMEOUT_SECS",
        "LEAVE_GUARDRAILS_ENFORCEMENT",
        "LEAVE_SERVER_BIND_ADDRESS",
        "LEAVE_SERVER_PORT",
        "LEAVE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "LEAVE_LOGGING_LEVEL",
        "LEAVE_LOGGING_FORMAT",
        "LEAVE_LOG_LEVEL",
        "LEAVE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
