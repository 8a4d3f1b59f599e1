// ABOUTME: Agent and AgentService traits - the tool-calling loop the controller schedules.
// ABOUTME: A service builds one capability-scoped agent; an agent runs against one session.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::SubagentCapability;
use crate::context::CallStack;
use crate::error::AgentError;
use crate::llm::Usage;
use crate::tool::Registry;

/// One run of an agent against an isolated session.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub session_id: String,
    pub prompt: String,

    /// Tool calls that led to this run, outermost first.
    pub call_stack: CallStack,

    /// Observed by the agent at its own suspension points.
    pub cancel: CancellationToken,
}

impl RunRequest {
    pub fn new(session_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            prompt: prompt.into(),
            call_stack: CallStack::new(),
            cancel: CancellationToken::new(),
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    /// Text of the agent's final message.
    pub content: String,
    pub usage: Usage,
    pub tool_use_count: usize,
    pub iterations: usize,
}

/// A runnable tool-calling loop.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Run to completion. Resolving the future is the done signal.
    async fn run(&self, request: RunRequest) -> Result<AgentOutput, AgentError>;

    /// Ask the run on `session_id` to stop at its next suspension point.
    fn cancel(&self, session_id: &str);
}

/// Builds agents bound to a capability and its tool set.
#[async_trait]
pub trait AgentService: Send + Sync {
    async fn build(
        &self,
        capability: &SubagentCapability,
        tools: Registry,
    ) -> Result<Arc<dyn Agent>, AgentError>;
}
