//! Agent Runtime - the trust boundary between chat text and leave decisions
//!
//! This crate decides how a message is answered:
//! - Binds every request to the session's own employee identity
//! - Answers balance and policy lookups deterministically, without the model
//! - Tracks the leave request a user builds up across turns
//! - Hands everything else to a language model and checks what comes back
//!
//! # Architecture
//!
//! Each message follows a fixed route:
//! 1. **Session upkeep** (`session`) - prune idle and surplus sessions, touch this one
//! 2. **Identity guard** (`guardrails`) - refuse messages naming another employee
//! 3. **Fast path** (`fast_path`) - balance and country policy lookups
//! 4. **Agentic path** (`conversation`, `llm`, `tools`) - clarifying questions, then the model
//!    with validated tool calls
//! 5. **Output enforcement** (`guardrails`) - suppress decisions made without tool evidence
//!
//! # Key Types
//!
//! - `AgentRuntime` - Main orchestrator (see `runtime` module)
//! - `AssistantModel` - Pluggable trait for OpenAI-compatible and offline models
//! - `GuardrailPolicy` - Identity, input and answer checks
//! - `SessionStore` - Bounded, TTL-expiring sessions owning their partial leave request
//!
//! # Safety Principle
//!
//! The model is never trusted to announce an eligibility outcome. Only the leave engine
//! decides, and an answer that sounds like a decision survives only if a tool ran during
//! the same request.

pub mod conversation;
pub mod fast_path;
pub mod guardrails;
pub mod llm;
pub mod runtime;
pub mod session;
pub mod tools;

pub use conversation::{LeaveField, LeaveRequestExtractor, LeaveRequestState};
pub use guardrails::{GuardrailDecision, GuardrailPolicy};
pub use llm::{
    model_from_config, AssistantModel, ModelReply, ModelTurn, OfflineModel, OpenAiChatModel,
};
pub use runtime::{AgentRuntime, RuntimeError};
pub use session::{ConversationTurn, SessionStore, TurnRole};
pub use tools::{Tool, ToolRegistry};
