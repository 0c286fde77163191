use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use leave_core::{ApplicationError, CircuitBreakerSnapshot, CircuitState};
use leave_db::DbPool;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::bootstrap::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub environment: String,
    pub circuit_breaker: CircuitBreakerSnapshot,
    pub checked_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: HealthCheck,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsResponse {
    pub circuit_breaker: CircuitBreakerSnapshot,
    pub active_conversations: usize,
    pub environment: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
}

/// Liveness plus the directory breaker. An open breaker still answers from the fallback
/// directory, so the service reports degraded rather than failing.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let circuit_breaker = state.breaker.snapshot();
    let status = match circuit_breaker.state {
        CircuitState::Closed => "healthy",
        CircuitState::Open | CircuitState::HalfOpen => "degraded",
    };

    let payload = HealthResponse {
        status,
        environment: state.environment.clone(),
        circuit_breaker,
        checked_at: Utc::now().to_rfc3339(),
    };
    (StatusCode::OK, Json(payload))
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let database = match &state.db_pool {
        Some(pool) => database_check(pool).await,
        None => HealthCheck {
            status: "ready",
            detail: "demo directory in use".to_string(),
            correlation_id: None,
        },
    };
    let ready = database.status == "ready";

    let payload = ReadinessResponse { status: if ready { "ready" } else { "degraded" }, database };
    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        circuit_breaker: state.breaker.snapshot(),
        active_conversations: state.runtime.active_sessions(),
        environment: state.environment.clone(),
    })
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    let error = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => {
            return HealthCheck {
                status: "ready",
                detail: "database query succeeded".to_string(),
                correlation_id: None,
            }
        }
        Err(error) => ApplicationError::Integration(format!("database query failed: {error}"))
            .into_interface(Uuid::new_v4().to_string()),
    };
    warn!(
        event_name = "http.ready.degraded",
        correlation_id = %error.correlation_id(),
        error = %error,
        "readiness check failed"
    );
    HealthCheck {
        status: "degraded",
        detail: error.user_message().to_string(),
        correlation_id: Some(error.correlation_id().to_string()),
    }
}
