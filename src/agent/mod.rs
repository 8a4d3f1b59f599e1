// ABOUTME: Subagent module - capability registry, presets, scoped toolsets, and the agent loop.
// ABOUTME: Provides CapabilityRegistry, Toolset, AgentService/Agent, and LoopAgentService.

mod capability;
mod presets;
mod runner;
mod service;
mod toolset;

pub use capability::{CapabilityRegistry, CapabilityRegistryBuilder, SubagentCapability};
pub use presets::{READONLY_TOOLS, WRITE_TOOLS};
pub use runner::{LoopAgent, LoopAgentService};
pub use service::{Agent, AgentOutput, AgentService, RunRequest};
pub use toolset::{RegistryToolset, TASK_TOOL_NAME, Toolset};

/// Built-in capability constructors.
pub mod builtin {
    pub use super::presets::{coding, general, research};
}
