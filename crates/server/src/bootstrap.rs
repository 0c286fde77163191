use std::sync::Arc;
use std::time::Duration;

use leave_agent::{model_from_config, AgentRuntime, GuardrailPolicy, SessionStore};
use leave_core::config::{AppConfig, ConfigError, DirectorySource};
use leave_core::{
    CircuitBreaker, CircuitBreakerConfig, EmployeeDirectory, InMemoryEmployeeDirectory,
    LeavePolicyEngine, PolicyCatalog, ResilientDirectory,
};
use leave_db::{connect_with_config, migrations, DbPool, SqlEmployeeDirectory};
use thiserror::Error;
use tracing::info;

const DIRECTORY_BREAKER: &str = "employee-directory";

pub struct Application {
    pub config: AppConfig,
    pub db_pool: Option<DbPool>,
    pub breaker: Arc<CircuitBreaker>,
    pub runtime: Arc<AgentRuntime>,
}

/// Shared handler state for every HTTP route.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
    pub breaker: Arc<CircuitBreaker>,
    pub environment: String,
    pub db_pool: Option<DbPool>,
}

impl Application {
    pub fn state(&self) -> AppState {
        AppState {
            runtime: self.runtime.clone(),
            breaker: self.breaker.clone(),
            environment: self.config.environment.clone(),
            db_pool: self.db_pool.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("language model client could not be built: {0}")]
    Model(String),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        environment = %config.environment,
        "starting application bootstrap"
    );

    let breaker = Arc::new(CircuitBreaker::new(
        DIRECTORY_BREAKER,
        CircuitBreakerConfig::default()
            .with_failure_threshold(config.circuit_breaker.failure_threshold)
            .with_reset_timeout(Duration::from_secs(config.circuit_breaker.timeout_secs)),
    ));

    let (directory, db_pool) = match config.directory.source {
        DirectorySource::Mock => {
            info!(
                event_name = "system.bootstrap.directory_selected",
                correlation_id = "bootstrap",
                source = "mock",
                "serving the demo employee directory"
            );
            (ResilientDirectory::demo(breaker.clone()), None)
        }
        DirectorySource::Database => {
            let pool = connect_with_config(&config.database)
                .await
                .map_err(BootstrapError::DatabaseConnect)?;
            info!(
                event_name = "system.bootstrap.database_connected",
                correlation_id = "bootstrap",
                "database connection established"
            );

            migrations::run_pending(&pool).await.map_err(BootstrapError::Migration)?;
            info!(
                event_name = "system.bootstrap.migrations_applied",
                correlation_id = "bootstrap",
                "database migrations applied"
            );

            let primary: Arc<dyn EmployeeDirectory> =
                Arc::new(SqlEmployeeDirectory::new(pool.clone()));
            let directory = ResilientDirectory::new(
                primary,
                InMemoryEmployeeDirectory::with_demo_employees(),
                breaker.clone(),
            );
            (directory, Some(pool))
        }
    };

    let engine =
        Arc::new(LeavePolicyEngine::new(Arc::new(directory), Arc::new(PolicyCatalog::standard())));
    let model = model_from_config(&config.llm)
        .map_err(|error| BootstrapError::Model(format!("{error:#}")))?;

    let runtime = AgentRuntime::new(
        engine,
        Arc::from(model),
        SessionStore::from_config(&config.sessions),
        GuardrailPolicy::new(config.guardrails.enforcement),
    );
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        model = runtime.model_name(),
        enforcement = ?config.guardrails.enforcement,
        "agent runtime initialized"
    );

    Ok(Application { config, db_pool, breaker, runtime: Arc::new(runtime) })
}
