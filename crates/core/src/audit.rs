//! Audit trail for decisions taken at the chat trust boundary.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::request_context::RequestContext;

/// What happened at the boundary. Rejections carry the guardrail reason code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundaryEvent {
    IdentityDenied { reason_code: &'static str },
    InputRejected { reason_code: &'static str },
    AnswerSuppressed { reason_code: &'static str },
    FastPathAnswered { intent: &'static str },
}

impl BoundaryEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::IdentityDenied { .. } => "identity.access_denied",
            Self::InputRejected { .. } => "guardrail.input_rejected",
            Self::AnswerSuppressed { .. } => "guardrail.answer_suppressed",
            Self::FastPathAnswered { .. } => "routing.fast_path",
        }
    }

    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::FastPathAnswered { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub correlation_id: String,
    pub session_id: Option<String>,
    /// Employee the session is bound to, never the one a message asked about.
    pub employee_id: Option<String>,
    pub event: BoundaryEvent,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn record(ctx: &RequestContext, event: BoundaryEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            correlation_id: ctx.correlation_id().to_string(),
            session_id: ctx.session_id(),
            employee_id: ctx.bound_employee(),
            event,
            occurred_at: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Keeps events in memory for assertions.
#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|event| event.event_type() == event_type).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(event);
    }
}

/// Writes audit events to the `audit` tracing target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let (detail_key, detail) = match &event.event {
            BoundaryEvent::IdentityDenied { reason_code }
            | BoundaryEvent::InputRejected { reason_code }
            | BoundaryEvent::AnswerSuppressed { reason_code } => ("reason_code", reason_code),
            BoundaryEvent::FastPathAnswered { intent } => ("intent", intent),
        };
        info!(
            target: "audit",
            event_name = event.event_type(),
            event_id = %event.event_id,
            correlation_id = %event.correlation_id,
            session_id = event.session_id.as_deref().unwrap_or_default(),
            employee_id = event.employee_id.as_deref().unwrap_or_default(),
            rejected = event.event.is_rejection(),
            detail_key,
            detail,
            "trust boundary event"
        );
    }
}
