// ABOUTME: Defines the Tool trait - name, description, schema, and an async
// ABOUTME: execute that receives the caller's ToolContext explicitly.

use async_trait::async_trait;

use super::ToolResult;
use crate::context::ToolContext;
use crate::llm::ToolDefinition;

/// A tool that can be executed by an agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of this tool.
    fn name(&self) -> &str;

    /// Returns a human-readable description for the LLM.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for the tool's input parameters.
    fn schema(&self) -> serde_json::Value;

    /// Execute the tool.
    ///
    /// `ctx` identifies the calling session and its ancestor tool calls, and
    /// carries the cancellation token of the enclosing run.
    async fn execute(
        &self,
        ctx: &ToolContext,
        params: serde_json::Value,
    ) -> Result<ToolResult, anyhow::Error>;

    /// The definition advertised to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.schema(),
        }
    }
}
