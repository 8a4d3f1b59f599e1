// ABOUTME: LoopAgent - the built-in think-act loop over an LlmClient and a scoped Registry.
// ABOUTME: Records usage and cost into its session after every model response.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::service::{Agent, AgentOutput, AgentService, RunRequest};
use super::SubagentCapability;
use crate::context::ToolContext;
use crate::error::AgentError;
use crate::llm::{ContentBlock, LlmClient, Message, Pricing, Request, ToolDefinition, Usage};
use crate::session::SessionService;
use crate::tool::Registry;

/// Builds [`LoopAgent`]s that share one client, model, and session store.
pub struct LoopAgentService {
    client: Arc<dyn LlmClient>,
    sessions: Arc<dyn SessionService>,
    model: String,
    pricing: Pricing,
    max_tokens: u32,
}

impl LoopAgentService {
    pub fn new(
        client: Arc<dyn LlmClient>,
        sessions: Arc<dyn SessionService>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            sessions,
            model: model.into(),
            pricing: Pricing::default(),
            max_tokens: 4096,
        }
    }

    /// Price used to turn token usage into session cost.
    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl AgentService for LoopAgentService {
    async fn build(
        &self,
        capability: &SubagentCapability,
        tools: Registry,
    ) -> Result<Arc<dyn Agent>, AgentError> {
        if self.model.trim().is_empty() {
            return Err(AgentError::Build("no model configured".into()));
        }
        if capability.max_iterations == 0 {
            return Err(AgentError::Build(format!(
                "subagent type '{}' allows zero iterations",
                capability.name
            )));
        }

        let definitions = tools.to_definitions().await;
        Ok(Arc::new(LoopAgent {
            client: Arc::clone(&self.client),
            sessions: Arc::clone(&self.sessions),
            model: self.model.clone(),
            pricing: self.pricing,
            max_tokens: self.max_tokens,
            system_prompt: capability.system_prompt.clone(),
            max_iterations: capability.max_iterations,
            tools,
            definitions,
            active: Mutex::new(HashMap::new()),
        }))
    }
}

/// A think-act loop bound to one capability.
pub struct LoopAgent {
    client: Arc<dyn LlmClient>,
    sessions: Arc<dyn SessionService>,
    model: String,
    pricing: Pricing,
    max_tokens: u32,
    system_prompt: String,
    max_iterations: usize,
    tools: Registry,
    definitions: Vec<ToolDefinition>,

    /// Cancellation handles of in-flight runs, by session id.
    active: Mutex<HashMap<String, CancellationToken>>,
}

impl LoopAgent {
    async fn think_act(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<AgentOutput, AgentError> {
        let mut messages = vec![Message::user(request.prompt.as_str())];
        let mut output = AgentOutput::default();

        loop {
            output.iterations += 1;
            if output.iterations > self.max_iterations {
                return Err(AgentError::MaxIterations(self.max_iterations));
            }
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let mut llm_request = Request::new(&self.model)
                .messages(messages.clone())
                .tools(self.definitions.clone())
                .max_tokens(self.max_tokens);
            if !self.system_prompt.is_empty() {
                llm_request = llm_request.system(&self.system_prompt);
            }

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AgentError::Cancelled),
                response = self.client.create_message(&llm_request) => response?,
            };

            output.usage.input_tokens += response.usage.input_tokens;
            output.usage.output_tokens += response.usage.output_tokens;
            self.record_usage(&request.session_id, &response.usage).await;

            if !response.has_tool_use() {
                output.content = response.text();
                return Ok(output);
            }

            messages.push(Message::assistant(response.content.clone()));

            let mut tool_results = Vec::new();
            for block in &response.content {
                if let ContentBlock::ToolUse { id, name, input } = block {
                    output.tool_use_count += 1;
                    let ctx = ToolContext {
                        session_id: request.session_id.clone(),
                        call_stack: request.call_stack.push(id.as_str()),
                        cancel: cancel.child_token(),
                    };
                    tool_results.push(self.execute_tool(&ctx, id, name, input.clone()).await);
                }
            }
            messages.push(Message::tool_results(tool_results));
        }
    }

    async fn execute_tool(
        &self,
        ctx: &ToolContext,
        id: &str,
        name: &str,
        input: serde_json::Value,
    ) -> ContentBlock {
        let Some(tool) = self.tools.get(name).await else {
            warn!(session_id = %ctx.session_id, tool = %name, "Model requested a tool outside its set");
            return ContentBlock::tool_error(id, format!("Tool '{}' not found or not allowed", name));
        };

        debug!(session_id = %ctx.session_id, tool = %name, depth = ctx.call_stack.depth(), "Executing tool");
        match tool.execute(ctx, input).await {
            Ok(r) if r.is_error => ContentBlock::tool_error(id, r.content),
            Ok(r) => ContentBlock::tool_result(id, r.content),
            Err(e) => ContentBlock::tool_error(id, e.to_string()),
        }
    }

    async fn record_usage(&self, session_id: &str, usage: &Usage) {
        let cost = self.pricing.cost(usage);
        let saved = match self.sessions.get(session_id).await {
            Ok(mut session) => {
                session.record_usage(usage, cost);
                self.sessions.save(session).await.map(|_| ())
            }
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            warn!(session_id = %session_id, error = %e, "Failed to record usage on session");
        }
    }
}

#[async_trait]
impl Agent for LoopAgent {
    async fn run(&self, request: RunRequest) -> Result<AgentOutput, AgentError> {
        let cancel = request.cancel.child_token();
        self.active
            .lock()
            .insert(request.session_id.clone(), cancel.clone());

        let result = self.think_act(&request, &cancel).await;

        self.active.lock().remove(&request.session_id);
        result
    }

    fn cancel(&self, session_id: &str) {
        if let Some(token) = self.active.lock().get(session_id) {
            token.cancel();
        }
    }
}
