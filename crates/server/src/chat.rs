use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use leave_agent::ConversationTurn;
use leave_core::errors::ErrorKind;
use leave_core::{ApplicationError, InterfaceError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bootstrap::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub employee_id: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: String,
    pub session_id: String,
    pub existed: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<ConversationTurn>,
}

#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = json!({
            "error": self.0.user_message(),
            "correlation_id": self.0.correlation_id(),
        });
        (status, Json(body)).into_response()
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
        .route("/reset-conversation/{session_id}", post(reset_conversation))
        .route("/conversations/{session_id}/history", get(conversation_history))
}

pub async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "Leave Policy Assistant API",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.runtime.model_name(),
        "environment": state.environment,
    }))
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let session_id = request.session_id.trim();

    if request.message.trim().is_empty() || session_id.is_empty() {
        let error = ApplicationError::Validation(
            "message and session_id must not be empty".to_string(),
        )
        .into_interface(correlation_id.as_str());
        warn!(
            event_name = "http.chat.rejected",
            correlation_id = %correlation_id,
            error = %error,
            "chat request rejected"
        );
        return Err(ApiError(error));
    }

    info!(
        event_name = "http.chat.received",
        correlation_id = %correlation_id,
        session_id,
        "chat request received"
    );
    let response =
        state.runtime.chat(&request.message, session_id, request.employee_id.as_deref()).await;

    Ok(Json(ChatResponse { response, session_id: session_id.to_string() }))
}

pub async fn reset_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<ResetResponse> {
    let existed = state.runtime.reset_conversation(&session_id);
    Json(ResetResponse {
        message: format!("Conversation reset for session {session_id}"),
        session_id,
        existed,
    })
}

pub async fn conversation_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<HistoryResponse> {
    let turns = state.runtime.conversation_history(&session_id);
    Json(HistoryResponse { session_id, turns })
}
