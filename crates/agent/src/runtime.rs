use std::sync::{Arc, Mutex, MutexGuard};

use leave_core::audit::TracingAuditSink;
use leave_core::{AuditEvent, AuditSink, BoundaryEvent, LeavePolicyEngine, RequestContext};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::conversation::LeaveRequestExtractor;
use crate::fast_path::FastPath;
use crate::guardrails::{
    redact_sensitive, requires_verified_data, GuardrailDecision, GuardrailPolicy,
    CANNOT_PROCESS_MESSAGE,
};
use crate::llm::{AssistantModel, ModelTurn};
use crate::session::{ConversationTurn, SessionStore, TurnRole};
use crate::tools::ToolRegistry;

pub const EMPTY_REPLY_MESSAGE: &str = "I apologize, but I couldn't generate a response.";
pub const APOLOGY_MESSAGE: &str = "I apologize, but I encountered an error processing your \
request. Please try again or contact HR support if the issue persists.";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("session store lock poisoned")]
    SessionStorePoisoned,
}

/// Routes each chat message through identity checks, the deterministic fast path and the
/// model, and never lets an unverified eligibility answer through.
pub struct AgentRuntime {
    sessions: Mutex<SessionStore>,
    extractor: LeaveRequestExtractor,
    guardrails: GuardrailPolicy,
    fast_path: FastPath,
    tools: ToolRegistry,
    engine: Arc<LeavePolicyEngine>,
    model: Arc<dyn AssistantModel>,
    audit: Arc<dyn AuditSink>,
}

impl AgentRuntime {
    pub fn new(
        engine: Arc<LeavePolicyEngine>,
        model: Arc<dyn AssistantModel>,
        sessions: SessionStore,
        guardrails: GuardrailPolicy,
    ) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            extractor: LeaveRequestExtractor::new(),
            guardrails,
            fast_path: FastPath::new(engine.clone()),
            tools: ToolRegistry::with_leave_tools(engine.clone()),
            engine,
            model,
            audit: Arc::new(TracingAuditSink),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Answers one message. Every failure ends in user-facing text.
    #[instrument(skip(self, message, employee_id))]
    pub async fn chat(&self, message: &str, session_id: &str, employee_id: Option<&str>) -> String {
        let employee_id = employee_id.map(str::trim).filter(|id| !id.is_empty());
        let ctx = RequestContext::begin(session_id, employee_id);

        let answer = match self.route(&ctx, message, session_id, employee_id).await {
            Ok(answer) => answer,
            Err(error) => {
                error!(
                    event_name = "agent.chat.failed",
                    correlation_id = %ctx.correlation_id(),
                    session_id,
                    error = %error,
                    "chat request failed"
                );
                APOLOGY_MESSAGE.to_string()
            }
        };

        ctx.end();
        self.record_exchange(session_id, message, &answer);
        answer
    }

    pub fn reset_conversation(&self, session_id: &str) -> bool {
        let removed = self.lock_sessions_lenient().remove(session_id);
        if removed {
            info!(event_name = "agent.session.reset", session_id, "conversation reset");
        }
        removed
    }

    pub fn conversation_history(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.lock_sessions_lenient().history(session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.lock_sessions_lenient().size()
    }

    async fn route(
        &self,
        ctx: &RequestContext,
        message: &str,
        session_id: &str,
        employee_id: Option<&str>,
    ) -> Result<String, RuntimeError> {
        {
            let mut sessions = self.lock_sessions()?;
            sessions.prune();
            sessions.touch(session_id);
        }

        if let GuardrailDecision::Deny { reason_code, user_message } =
            self.guardrails.check_identity(employee_id, message)
        {
            warn!(
                event_name = "agent.identity.denied",
                correlation_id = %ctx.correlation_id(),
                session_id,
                employee_id = employee_id.unwrap_or_default(),
                "cross-employee access attempt blocked"
            );
            self.emit(ctx, BoundaryEvent::IdentityDenied { reason_code });
            return Ok(user_message.to_string());
        }

        if let Some(employee_id) = employee_id {
            if let Some(answer) = self.fast_path.try_answer(ctx, employee_id, message).await {
                self.emit(ctx, BoundaryEvent::FastPathAnswered { intent: answer.intent.label() });
                return Ok(answer.text);
            }
        }
        // Lookups made by the fast path are not evidence for the model's answer.
        ctx.reset_tool_log();

        if let GuardrailDecision::Deny { reason_code, user_message } =
            self.guardrails.screen_input(message)
        {
            warn!(
                event_name = "agent.input.rejected",
                correlation_id = %ctx.correlation_id(),
                session_id,
                "suspicious input rejected"
            );
            self.emit(ctx, BoundaryEvent::InputRejected { reason_code });
            return Ok(user_message.to_string());
        }

        let today = self.engine.clock().today();
        let (leave_request, history) = {
            let mut sessions = self.lock_sessions()?;
            if let Some(state) = sessions.leave_request_mut(session_id) {
                self.extractor.apply(message, today, state);
            }
            let leave_request = sessions.leave_request(session_id).cloned().unwrap_or_default();
            (leave_request, sessions.history(session_id))
        };

        if requires_verified_data(message) {
            if let Some(field) = leave_request.missing_fields().first() {
                info!(
                    event_name = "agent.clarification.requested",
                    correlation_id = %ctx.correlation_id(),
                    field = field.as_str(),
                    "asking for missing leave request detail"
                );
                return Ok(field.clarifying_question().to_string());
            }
        }

        let reply = match self
            .model
            .respond(ModelTurn {
                ctx,
                message,
                history: &history,
                leave_request: &leave_request,
                tools: &self.tools,
            })
            .await
        {
            Ok(reply) => reply,
            Err(error) => {
                error!(
                    event_name = "agent.model.failed",
                    correlation_id = %ctx.correlation_id(),
                    model = self.model.name(),
                    error = %error,
                    "language model call failed"
                );
                return Ok(CANNOT_PROCESS_MESSAGE.to_string());
            }
        };

        let Some(answer) = reply.answer() else {
            return Ok(EMPTY_REPLY_MESSAGE.to_string());
        };

        let tools_invoked = ctx.tools_invoked();
        info!(
            event_name = "agent.model.answered",
            correlation_id = %ctx.correlation_id(),
            tools_invoked = ?tools_invoked,
            eligible = ?reply.eligibility(),
            "model answer received"
        );

        if let GuardrailDecision::Deny { reason_code, user_message } =
            self.guardrails.review_answer(message, answer, !tools_invoked.is_empty())
        {
            warn!(
                event_name = "agent.answer.suppressed",
                correlation_id = %ctx.correlation_id(),
                session_id,
                reason_code,
                "model answer suppressed without tool evidence"
            );
            self.emit(ctx, BoundaryEvent::AnswerSuppressed { reason_code });
            return Ok(user_message.to_string());
        }

        Ok(redact_sensitive(answer))
    }

    fn record_exchange(&self, session_id: &str, message: &str, answer: &str) {
        let mut sessions = self.lock_sessions_lenient();
        sessions.touch(session_id);
        sessions.append_turn(session_id, TurnRole::User, message);
        sessions.append_turn(session_id, TurnRole::Assistant, answer);
    }

    fn emit(&self, ctx: &RequestContext, event: BoundaryEvent) {
        self.audit.emit(AuditEvent::record(ctx, event));
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, SessionStore>, RuntimeError> {
        self.sessions.lock().map_err(|_| RuntimeError::SessionStorePoisoned)
    }

    fn lock_sessions_lenient(&self) -> MutexGuard<'_, SessionStore> {
        match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
