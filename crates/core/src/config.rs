//! Layered configuration for the leave assistant.
//!
//! Values resolve in order: built-in defaults, `leave-assistant.toml` (with `${VAR}`
//! interpolation), the `LEAVE_*` environment variables in [`ENV_OVERRIDES`], and finally
//! [`ConfigOverrides`] supplied by the caller. The result is validated before use.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::de::{value::StrDeserializer, DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

const CONFIG_FILE_CANDIDATES: [&str; 2] = ["leave-assistant.toml", "config/leave-assistant.toml"];

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: String,
    pub database: DatabaseConfig,
    pub directory: DirectoryConfig,
    pub llm: LlmConfig,
    pub sessions: SessionConfig,
    pub circuit_breaker: CircuitBreakerSettings,
    pub guardrails: GuardrailConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub source: DirectorySource,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    #[serde(deserialize_with = "optional_secret")]
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Upper bound on tool-call round trips within one model turn.
    pub max_tool_rounds: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_sessions: usize,
    pub max_history: usize,
    pub ttl_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    pub enforcement: EnforcementStrictness,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectorySource {
    #[default]
    Mock,
    Database,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
    #[default]
    Offline,
}

/// How aggressively unverified model answers are suppressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementStrictness {
    /// Block decision phrasing ("approved", "you can take") without tool evidence.
    #[default]
    DecisionLanguage,
    /// Also block any answer to a verified-data question without tool evidence.
    VerifiedTopic,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Programmatic values that beat every other layer.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub environment: Option<String>,
    pub database_url: Option<String>,
    pub directory_source: Option<DirectorySource>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            database: DatabaseConfig::default(),
            directory: DirectoryConfig::default(),
            llm: LlmConfig::default(),
            sessions: SessionConfig::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            guardrails: GuardrailConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://leave-assistant.db".to_string(),
            max_connections: 5,
            timeout_secs: 30,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            api_key: None,
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            max_retries: 2,
            max_tool_rounds: 4,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_sessions: 1000, max_history: 20, ttl_secs: 30 * 60 }
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self { failure_threshold: 5, timeout_secs: 60 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1".to_string(), port: 8080, graceful_shutdown_secs: 15 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::default() }
    }
}

impl LlmConfig {
    /// Endpoint root for OpenAI-compatible providers.
    pub fn resolved_base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, LlmProvider::Ollama) => "http://localhost:11434/v1",
            (None, _) => "https://api.openai.com/v1",
        }
    }

    fn missing_api_key(&self) -> bool {
        self.api_key.as_ref().map_or(true, |key| key.expose_secret().trim().is_empty())
    }
}

fn optional_secret<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Raw value of one environment variable, tagged with its name for error reporting.
pub struct EnvValue<'a> {
    var: &'a str,
    raw: String,
}

impl EnvValue<'_> {
    fn text(self) -> String {
        self.raw
    }

    fn secret(self) -> Option<SecretString> {
        Some(SecretString::from(self.raw))
    }

    fn number<T: FromStr>(&self) -> Result<T, ConfigError> {
        self.raw.trim().parse().map_err(|_| self.invalid())
    }

    /// Parses a snake_case enum value the same way the config file does.
    fn choice<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let normalized = self.raw.trim().to_ascii_lowercase();
        let deserializer: StrDeserializer<'_, serde::de::value::Error> =
            normalized.as_str().into_deserializer();
        T::deserialize(deserializer).map_err(|_| self.invalid())
    }

    fn invalid(&self) -> ConfigError {
        ConfigError::InvalidEnvOverride { key: self.var.to_string(), value: self.raw.clone() }
    }
}

type ApplyEnv = fn(&mut AppConfig, EnvValue<'_>) -> Result<(), ConfigError>;

/// An environment variable layer entry. The first variable in `vars` that is set wins.
pub struct EnvOverride {
    pub path: &'static str,
    pub vars: &'static [&'static str],
    apply: ApplyEnv,
}

macro_rules! env_override {
    (
        $path:literal,
        [$($var:literal),+],
        |$config:ident, $value:ident| $field:expr => $parsed:expr
    ) => {
        EnvOverride {
            path: $path,
            vars: &[$($var),+],
            apply: |$config, $value| {
                $field = $parsed;
                Ok(())
            },
        }
    };
}

pub const ENV_OVERRIDES: &[EnvOverride] = &[
    env_override!("environment", ["LEAVE_ENVIRONMENT"], |c, v| c.environment => v.text()),
    env_override!("database.url", ["LEAVE_DATABASE_URL"], |c, v| c.database.url => v.text()),
    env_override!(
        "database.max_connections",
        ["LEAVE_DATABASE_MAX_CONNECTIONS"],
        |c, v| c.database.max_connections => v.number()?
    ),
    env_override!(
        "database.timeout_secs",
        ["LEAVE_DATABASE_TIMEOUT_SECS"],
        |c, v| c.database.timeout_secs => v.number()?
    ),
    env_override!(
        "directory.source",
        ["LEAVE_DIRECTORY_SOURCE"],
        |c, v| c.directory.source => v.choice()?
    ),
    env_override!("llm.provider", ["LEAVE_LLM_PROVIDER"], |c, v| c.llm.provider => v.choice()?),
    env_override!(
        "llm.api_key",
        ["LEAVE_LLM_API_KEY", "OPENAI_API_KEY"],
        |c, v| c.llm.api_key => v.secret()
    ),
    env_override!("llm.base_url", ["LEAVE_LLM_BASE_URL"], |c, v| c.llm.base_url => Some(v.text())),
    env_override!("llm.model", ["LEAVE_LLM_MODEL"], |c, v| c.llm.model => v.text()),
    env_override!(
        "llm.timeout_secs",
        ["LEAVE_LLM_TIMEOUT_SECS"],
        |c, v| c.llm.timeout_secs => v.number()?
    ),
    env_override!(
        "llm.max_retries",
        ["LEAVE_LLM_MAX_RETRIES"],
        |c, v| c.llm.max_retries => v.number()?
    ),
    env_override!(
        "llm.max_tool_rounds",
        ["LEAVE_LLM_MAX_TOOL_ROUNDS"],
        |c, v| c.llm.max_tool_rounds => v.number()?
    ),
    env_override!(
        "sessions.max_sessions",
        ["LEAVE_SESSIONS_MAX_SESSIONS"],
        |c, v| c.sessions.max_sessions => v.number()?
    ),
    env_override!(
        "sessions.max_history",
        ["LEAVE_SESSIONS_MAX_HISTORY"],
        |c, v| c.sessions.max_history => v.number()?
    ),
    env_override!(
        "sessions.ttl_secs",
        ["LEAVE_SESSIONS_TTL_SECS"],
        |c, v| c.sessions.ttl_secs => v.number()?
    ),
    env_override!(
        "circuit_breaker.failure_threshold",
        ["LEAVE_CIRCUIT_BREAKER_FAILURE_THRESHOLD"],
        |c, v| c.circuit_breaker.failure_threshold => v.number()?
    ),
    env_override!(
        "circuit_breaker.timeout_secs",
        ["LEAVE_CIRCUIT_BREAKER_TIMEOUT_SECS"],
        |c, v| c.circuit_breaker.timeout_secs => v.number()?
    ),
    env_override!(
        "guardrails.enforcement",
        ["LEAVE_GUARDRAILS_ENFORCEMENT"],
        |c, v| c.guardrails.enforcement => v.choice()?
    ),
    env_override!(
        "server.bind_address",
        ["LEAVE_SERVER_BIND_ADDRESS"],
        |c, v| c.server.bind_address => v.text()
    ),
    env_override!("server.port", ["LEAVE_SERVER_PORT"], |c, v| c.server.port => v.number()?),
    env_override!(
        "server.graceful_shutdown_secs",
        ["LEAVE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        |c, v| c.server.graceful_shutdown_secs => v.number()?
    ),
    env_override!(
        "logging.level",
        ["LEAVE_LOGGING_LEVEL", "LEAVE_LOG_LEVEL"],
        |c, v| c.logging.level => v.text()
    ),
    env_override!(
        "logging.format",
        ["LEAVE_LOGGING_FORMAT", "LEAVE_LOG_FORMAT"],
        |c, v| c.logging.format => v.choice()?
    ),
];

/// The config file `AppConfig::load` would read without an explicit path.
pub fn discover_config_file() -> Option<PathBuf> {
    resolve_config_path(None)
}

/// Environment variables that feed the dotted config key, empty when none do.
pub fn env_vars_for(path: &str) -> &'static [&'static str] {
    ENV_OVERRIDES.iter().find(|entry| entry.path == path).map_or(&[], |entry| entry.vars)
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let LoadOptions { config_path, require_file, overrides } = options;

        let mut config = match resolve_config_path(config_path.as_deref()) {
            Some(path) => Self::from_file(&path)?,
            None if require_file => {
                let expected =
                    config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file over the defaults. Missing keys keep their default value.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        toml::from_str(&interpolate_env_vars(&raw)?)
            .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        for entry in ENV_OVERRIDES {
            let value = entry
                .vars
                .iter()
                .find_map(|var| read_env(var).map(|raw| EnvValue { var, raw }));
            if let Some(value) = value {
                (entry.apply)(self, value)?;
            }
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            environment,
            database_url,
            directory_source,
            log_level,
            llm_provider,
            llm_model,
            server_port,
        } = overrides;

        replace(&mut self.environment, environment);
        replace(&mut self.database.url, database_url);
        replace(&mut self.directory.source, directory_source);
        replace(&mut self.logging.level, log_level);
        replace(&mut self.llm.provider, llm_provider);
        replace(&mut self.llm.model, llm_model);
        replace(&mut self.server.port, server_port);
    }

    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (database, llm, sessions) = (&self.database, &self.llm, &self.sessions);
        let breaker = &self.circuit_breaker;
        let level = self.logging.level.trim().to_ascii_lowercase();

        let rules = [
            (self.environment.trim().is_empty(), "environment must not be empty"),
            (
                !is_sqlite_url(&database.url),
                "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
            ),
            (database.max_connections == 0, "database.max_connections must be greater than zero"),
            (
                !(1..=300).contains(&database.timeout_secs),
                "database.timeout_secs must be in range 1..=300",
            ),
            (!(1..=300).contains(&llm.timeout_secs), "llm.timeout_secs must be in range 1..=300"),
            (
                !(1..=10).contains(&llm.max_tool_rounds),
                "llm.max_tool_rounds must be in range 1..=10",
            ),
            (llm.model.trim().is_empty(), "llm.model must not be empty"),
            (
                llm.provider == LlmProvider::OpenAi && llm.missing_api_key(),
                "llm.api_key is required for the openai provider (or set OPENAI_API_KEY)",
            ),
            (
                llm.base_url.as_deref().is_some_and(|url| {
                    !url.starts_with("http://") && !url.starts_with("https://")
                }),
                "llm.base_url must start with http:// or https://",
            ),
            (sessions.max_sessions == 0, "sessions.max_sessions must be greater than zero"),
            (sessions.max_history == 0, "sessions.max_history must be greater than zero"),
            (sessions.ttl_secs == 0, "sessions.ttl_secs must be greater than zero"),
            (
                breaker.failure_threshold == 0,
                "circuit_breaker.failure_threshold must be greater than zero",
            ),
            (breaker.timeout_secs == 0, "circuit_breaker.timeout_secs must be greater than zero"),
            (self.server.port == 0, "server.port must be greater than zero"),
            (
                self.server.graceful_shutdown_secs == 0,
                "server.graceful_shutdown_secs must be greater than zero",
            ),
            (
                !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error"),
                "logging.level must be one of trace|debug|info|warn|error",
            ),
        ];

        match rules.into_iter().find(|(violated, _)| *violated) {
            Some((_, message)) => Err(ConfigError::Validation(message.to_string())),
            None => Ok(()),
        }
    }
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn is_sqlite_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:"
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    match explicit_path {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => CONFIG_FILE_CANDIDATES.iter().map(PathBuf::from).find(|path| path.exists()),
    }
}

/// Expands `${VAR}` references. An unset variable is an error, not an empty string.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &after[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        env_vars_for, AppConfig, ConfigError, ConfigOverrides, DirectorySource,
        EnforcementStrictness, LlmProvider, LoadOptions, LogFormat, ENV_OVERRIDES,
    };

    /// Runs `test` with only `vars` set among the variables the loader reads.
    fn with_env<T>(vars: &[(&str, &str)], test: impl FnOnce() -> T) -> T {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let _guard = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut touched: Vec<&str> =
            ENV_OVERRIDES.iter().flat_map(|entry| entry.vars.iter().copied()).collect();
        touched.extend(vars.iter().map(|(key, _)| *key));
        let saved: Vec<(&str, Option<String>)> =
            touched.iter().map(|key| (*key, env::var(key).ok())).collect();

        for key in &touched {
            env::remove_var(key);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }

        let outcome = test();

        for (key, value) in saved {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
        outcome
    }

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("leave-assistant.toml");
        fs::write(&path, contents).expect("write config");
        (dir, path)
    }

    fn load_from(path: PathBuf) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
    }

    #[test]
    fn defaults_match_demo_deployment() {
        let config = with_env(&[], || AppConfig::load(LoadOptions::default())).expect("defaults");

        assert_eq!(config.environment, "development");
        assert_eq!(config.sessions.max_sessions, 1000);
        assert_eq!(config.sessions.max_history, 20);
        assert_eq!(config.sessions.ttl_secs, 1800);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.timeout_secs, 60);
        assert_eq!(config.llm.provider, LlmProvider::Offline);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.directory.source, DirectorySource::Mock);
        assert_eq!(config.guardrails.enforcement, EnforcementStrictness::DecisionLanguage);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn file_values_support_env_interpolation() {
        let (_dir, path) = write_config(
            "[llm]\nprovider = \"openai\"\napi_key = \"${TEST_LEAVE_OPENAI_KEY}\"\n",
        );

        let config = with_env(&[("TEST_LEAVE_OPENAI_KEY", "sk-from-env")], || load_from(path))
            .expect("config with interpolated key");

        let key = config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string());
        assert_eq!(key.as_deref(), Some("sk-from-env"));
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.resolved_base_url(), "https://api.openai.com/v1");
        assert_eq!(config.llm.max_tool_rounds, 4, "keys absent from the file keep defaults");
    }

    #[test]
    fn interpolation_errors_name_the_problem() {
        let (_missing_dir, missing) = write_config("environment = \"${TEST_LEAVE_UNSET}\"\n");
        let (_open_dir, unterminated) = write_config("environment = \"${TEST_LEAVE_UNSET\"\n");

        let (missing, unterminated) =
            with_env(&[], || (load_from(missing), load_from(unterminated)));

        assert!(matches!(
            missing,
            Err(ConfigError::MissingEnvInterpolation { ref var }) if var == "TEST_LEAVE_UNSET"
        ));
        assert!(matches!(unterminated, Err(ConfigError::UnterminatedInterpolation)));
    }

    #[test]
    fn aliases_fill_api_key_and_log_format() {
        let config = with_env(
            &[
                ("LEAVE_LLM_PROVIDER", "OpenAI"),
                ("OPENAI_API_KEY", "sk-alias"),
                ("LEAVE_LOG_FORMAT", "json"),
            ],
            || AppConfig::load(LoadOptions::default()),
        )
        .expect("aliases load");

        let key = config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string());
        assert_eq!(key.as_deref(), Some("sk-alias"));
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn overrides_beat_env_which_beats_file() {
        let (_dir, path) = write_config(
            r#"
environment = "staging"

[database]
url = "sqlite://from-file.db"

[sessions]
max_sessions = 10
ttl_secs = 600

[guardrails]
enforcement = "verified_topic"

[logging]
level = "warn"
"#,
        );

        let config = with_env(
            &[
                ("LEAVE_DATABASE_URL", "sqlite://from-env.db"),
                ("LEAVE_SESSIONS_MAX_SESSIONS", "250"),
            ],
            || {
                AppConfig::load(LoadOptions {
                    config_path: Some(path),
                    overrides: ConfigOverrides {
                        database_url: Some("sqlite://from-override.db".to_string()),
                        log_level: Some("debug".to_string()),
                        ..ConfigOverrides::default()
                    },
                    ..LoadOptions::default()
                })
            },
        )
        .expect("layered config");

        assert_eq!(config.database.url, "sqlite://from-override.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.sessions.max_sessions, 250);
        assert_eq!(config.sessions.ttl_secs, 600);
        assert_eq!(config.environment, "staging");
        assert_eq!(config.guardrails.enforcement, EnforcementStrictness::VerifiedTopic);
    }

    #[test]
    fn openai_without_a_key_fails_validation() {
        let result = with_env(&[("LEAVE_LLM_PROVIDER", "openai")], || {
            AppConfig::load(LoadOptions::default())
        });

        assert!(matches!(
            result,
            Err(ConfigError::Validation(ref message)) if message.contains("llm.api_key")
        ));
    }

    #[test]
    fn malformed_env_values_name_the_variable() {
        for (var, value) in [
            ("LEAVE_CIRCUIT_BREAKER_FAILURE_THRESHOLD", "five"),
            ("LEAVE_DIRECTORY_SOURCE", "spreadsheet"),
        ] {
            let result = with_env(&[(var, value)], || AppConfig::load(LoadOptions::default()));

            let reported = matches!(
                result,
                Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == var
            );
            assert!(reported, "{var} should be reported");
        }
    }

    #[test]
    fn required_file_must_exist() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("absent.toml");

        let result = AppConfig::load(LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(ref p)) if *p == path));
    }

    #[test]
    fn zero_session_capacity_is_invalid() {
        let mut config = AppConfig::default();
        config.sessions.max_sessions = 0;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(ref message)) if message.contains("max_sessions")
        ));
    }

    #[test]
    fn env_override_table_is_unambiguous() {
        let paths: HashSet<&str> = ENV_OVERRIDES.iter().map(|entry| entry.path).collect();
        assert_eq!(paths.len(), ENV_OVERRIDES.len());
        assert_eq!(env_vars_for("llm.api_key"), ["LEAVE_LLM_API_KEY", "OPENAI_API_KEY"]);
        assert!(env_vars_for("llm.unknown").is_empty());
    }

    #[test]
    fn debug_output_does_not_leak_the_api_key() {
        let config = with_env(&[("LEAVE_LLM_API_KEY", "sk-secret-value")], || {
            AppConfig::load(LoadOptions::default())
        })
        .expect("config with key");

        assert!(!format!("{config:?}").contains("sk-secret-value"));
    }
}
