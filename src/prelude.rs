// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use delegate::prelude::*;` to get started quickly.

pub use crate::agent::{
    Agent, AgentOutput, AgentService, CapabilityRegistry, LoopAgentService, RegistryToolset,
    RunRequest, SubagentCapability, Toolset,
};
pub use crate::config::{DelegateConfig, RetryConfig};
pub use crate::context::{CallStack, ToolContext};
pub use crate::coordinator::{
    Aggregator, BatchMetrics, ExecutionContext, ExecutionController, MemoryMetricsSink,
    MetricsSink, RetryPolicy, TaskMetrics, TaskOutcome, TaskTool, TracingMetricsSink, WorkerPool,
};
pub use crate::error::{
    AgentError, DelegateError, ErrorKind, LlmError, SessionError, TaskError, ValidationError,
};
pub use crate::llm::{
    ContentBlock, LlmClient, Message, Pricing, Request, Response, Role, ToolDefinition, Usage,
};
pub use crate::session::{InMemorySessionService, Session, SessionService};
pub use crate::task::{AggregateMode, BatchRequest, TaskRequest, ValidatedRequest};
pub use crate::tool::{Registry, Tool, ToolResult};
