mod bootstrap;
mod chat;
mod health;

use std::time::Duration;

use anyhow::Result;
use axum::Router;
use leave_core::config::{AppConfig, LoadOptions, LogFormat};

use crate::bootstrap::AppState;

/// Installs the global subscriber. `RUST_LOG`, when set, replaces `logging.level`.
fn init_logging(config: &AppConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.trim()));
    let output: Box<dyn Layer<Registry> + Send + Sync> = match config.logging.format {
        LogFormat::Compact => fmt::layer().with_target(false).compact().boxed(),
        LogFormat::Pretty => fmt::layer().with_target(false).pretty().boxed(),
        LogFormat::Json => fmt::layer().with_target(false).json().boxed(),
    };

    tracing_subscriber::registry().with(output).with(filter).init();
}

pub fn app_router(state: AppState) -> Router {
    chat::router().merge(health::router()).with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        environment = %app.config.environment,
        "leave-server listening"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let router = app_router(app.state());
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        active_conversations = app.runtime.active_sessions(),
        "leave-server stopping"
    );
    let _ = shutdown_tx.send(());

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "in-flight requests did not finish before the shutdown deadline"
        ),
    }

    if let Some(pool) = &app.db_pool {
        pool.close().await;
    }
    Ok(())
}
