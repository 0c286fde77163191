//! `leave config`: effective settings with the layer each one came from.

use std::env;
use std::fs;
use std::path::Path;

use leave_core::config::{discover_config_file, env_vars_for, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file = discover_config_file();
    let file_doc = file.as_deref().and_then(read_document);

    std::iter::once("effective config (source precedence: env > file > default):".to_string())
        .chain(displayed_settings(&config).into_iter().map(|(key, value)| {
            let source = field_source(key, file_doc.as_ref(), file.as_deref());
            format!("- {key} = {value} (source: {source})")
        }))
        .collect::<Vec<_>>()
        .join("\n")
}

fn displayed_settings(config: &AppConfig) -> Vec<(&'static str, String)> {
    let api_key = config.llm.api_key.as_ref().map(|key| key.expose_secret());
    vec![
        ("environment", config.environment.clone()),
        ("database.url", config.database.url.clone()),
        ("directory.source", format!("{:?}", config.directory.source)),
        ("llm.provider", format!("{:?}", config.llm.provider)),
        ("llm.model", config.llm.model.clone()),
        ("llm.base_url", config.llm.resolved_base_url().to_string()),
        ("llm.api_key", redact_key(api_key)),
        ("sessions.max_sessions", config.sessions.max_sessions.to_string()),
        ("sessions.ttl_secs", config.sessions.ttl_secs.to_string()),
        ("circuit_breaker.failure_threshold", config.circuit_breaker.failure_threshold.to_string()),
        ("guardrails.enforcement", format!("{:?}", config.guardrails.enforcement)),
        ("server.port", config.server.port.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ]
}

fn read_document(path: &Path) -> Option<Value> {
    fs::read_to_string(path).ok()?.parse::<Value>().ok()
}

fn field_source(key_path: &str, file_doc: Option<&Value>, file: Option<&Path>) -> String {
    if let Some(var) = env_vars_for(key_path).iter().find(|var| env::var_os(var).is_some()) {
        return format!("env ({var})");
    }

    match (file_doc, file) {
        (Some(doc), Some(path)) if contains_path(doc, key_path) => {
            format!("file ({})", path.display())
        }
        _ => "default".to_string(),
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |node, key| node.get(key)).is_some()
}

fn redact_key(key: Option<&str>) -> String {
    match key.map(str::trim) {
        None => "<unset>".to_string(),
        Some("") => "<empty>".to_string(),
        Some(key) => match key.split_once('-') {
            Some((prefix, _)) if prefix.len() <= 4 => format!("{prefix}-***"),
            _ => "<redacted>".to_string(),
        },
    }
}
