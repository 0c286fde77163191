//! Request-scoped state shared between the routing core and the tools it calls.
//!
//! A context is created when a message arrives, handed by reference to every tool
//! invocation, and cleared when the request finishes. Because each context is owned by
//! the future handling one request, concurrent requests can never observe each
//! other's tool log, and dropping a cancelled request clears it as well.

use std::sync::{Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Scope {
    session_id: Option<String>,
    employee_id: Option<String>,
    tools_invoked: Vec<String>,
}

#[derive(Debug)]
pub struct RequestContext {
    correlation_id: String,
    scope: Mutex<Scope>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self { correlation_id: Uuid::new_v4().to_string(), scope: Mutex::new(Scope::default()) }
    }
}

impl RequestContext {
    pub fn begin(session_id: impl Into<String>, employee_id: Option<&str>) -> Self {
        let context = Self::default();
        {
            let mut scope = context.lock();
            scope.session_id = Some(session_id.into());
            scope.employee_id = employee_id.map(str::to_string);
        }
        context
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn record_tool_invocation(&self, name: &str) {
        self.lock().tools_invoked.push(name.to_string());
    }

    /// Drops recorded tool names but keeps the bound session and employee.
    pub fn reset_tool_log(&self) {
        self.lock().tools_invoked.clear();
    }

    pub fn tools_invoked(&self) -> Vec<String> {
        self.lock().tools_invoked.clone()
    }

    pub fn has_tool_evidence(&self) -> bool {
        !self.lock().tools_invoked.is_empty()
    }

    pub fn bound_employee(&self) -> Option<String> {
        self.lock().employee_id.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock().session_id.clone()
    }

    pub fn end(&self) {
        let mut scope = self.lock();
        if scope.session_id.is_some() || !scope.tools_invoked.is_empty() {
            debug!(
                event_name = "agent.request_context.cleared",
                correlation_id = %self.correlation_id,
                tools_invoked = scope.tools_invoked.len(),
                "request context cleared"
            );
        }
        *scope = Scope::default();
    }

    fn lock(&self) -> MutexGuard<'_, Scope> {
        match self.scope.lock() {
            Ok(scope) => scope,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::RequestContext;

    #[test]
    fn begin_binds_identity_with_empty_tool_log() {
        let context = RequestContext::begin("session-1", Some("E001"));

        assert_eq!(context.session_id().as_deref(), Some("session-1"));
        assert_eq!(context.bound_employee().as_deref(), Some("E001"));
        assert!(context.tools_invoked().is_empty());
        assert!(!context.has_tool_evidence());
    }

    #[test]
    fn recording_without_begin_starts_an_empty_log() {
        let context = RequestContext::default();
        context.record_tool_invocation("get_leave_policy");

        assert_eq!(context.tools_invoked(), vec!["get_leave_policy".to_string()]);
        assert_eq!(context.bound_employee(), None);
    }

    #[test]
    fn end_clears_every_request_scoped_field() {
        let context = RequestContext::begin("session-2", Some("E002"));
        context.record_tool_invocation("check_leave_eligibility");
        context.record_tool_invocation("get_employee_leave_summary");
        assert_eq!(context.tools_invoked().len(), 2);

        context.end();

        assert!(context.tools_invoked().is_empty());
        assert_eq!(context.bound_employee(), None);
        assert_eq!(context.session_id(), None);
    }

    #[test]
    fn reset_tool_log_keeps_the_binding() {
        let context = RequestContext::begin("session-3", Some("E003"));
        context.record_tool_invocation("get_employee_leave_summary");

        context.reset_tool_log();

        assert!(!context.has_tool_evidence());
        assert_eq!(context.bound_employee().as_deref(), Some("E003"));
        assert_eq!(context.session_id().as_deref(), Some("session-3"));
    }

    #[tokio::test]
    async fn concurrent_requests_keep_separate_logs() {
        let first = tokio::spawn(async {
            let context = RequestContext::begin("a", Some("E001"));
            context.record_tool_invocation("get_leave_policy");
            tokio::task::yield_now().await;
            context.tools_invoked()
        });
        let second = tokio::spawn(async {
            let context = RequestContext::begin("b", Some("E002"));
            tokio::task::yield_now().await;
            context.tools_invoked()
        });

        let first = first.await.unwrap_or_default();
        let second = second.await.unwrap_or_default();

        assert_eq!(first, vec!["get_leave_policy".to_string()]);
        assert!(second.is_empty());
    }
}
