// ABOUTME: Toolset - maps a subagent capability to the concrete tools it receives.
// ABOUTME: RegistryToolset filters a base Registry by the capability's allowlist.

use async_trait::async_trait;

use super::SubagentCapability;
use crate::tool::Registry;

/// Name of the delegating tool. Never handed to subagents.
pub const TASK_TOOL_NAME: &str = "task";

/// Produces the tool set for a subagent type.
#[async_trait]
pub trait Toolset: Send + Sync {
    async fn tools_for(&self, capability: &SubagentCapability) -> Registry;
}

/// Filters a shared base registry per capability.
///
/// The delegating `task` tool and any explicitly denied tools are always
/// withheld, so subagents cannot recursively delegate.
#[derive(Clone)]
pub struct RegistryToolset {
    source: Registry,
    denied_tools: Vec<String>,
}

impl RegistryToolset {
    pub fn new(source: Registry) -> Self {
        Self {
            source,
            denied_tools: vec![TASK_TOOL_NAME.to_string()],
        }
    }

    /// Withhold `tools` from every subagent type, in addition to `task`.
    pub fn denied<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denied_tools.extend(tools.into_iter().map(Into::into));
        self
    }

    fn is_allowed(&self, capability: &SubagentCapability, name: &str) -> bool {
        // Denylist always wins
        if self.denied_tools.iter().any(|d| d == name) {
            return false;
        }
        capability.permits(name)
    }
}

#[async_trait]
impl Toolset for RegistryToolset {
    async fn tools_for(&self, capability: &SubagentCapability) -> Registry {
        self.source
            .snapshot_filtered(|name| self.is_allowed(capability, name))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ToolContext;
    use crate::tool::{Tool, ToolResult};

    struct MockTool {
        name: String,
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "A mock tool"
        }
        fn schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _ctx: &ToolContext,
            _params: serde_json::Value,
        ) -> Result<ToolResult, anyhow::Error> {
            Ok(ToolResult::text("ok"))
        }
    }

    async fn base() -> Registry {
        let registry = Registry::new();
        for name in ["read_file", "grep", "bash", "task"] {
            registry
                .register(MockTool {
                    name: name.to_string(),
                })
                .await;
        }
        registry
    }

    #[tokio::test]
    async fn test_allowlist_applies() {
        let toolset = RegistryToolset::new(base().await);
        let cap = SubagentCapability::new("research", "r").tools(["read_file", "grep"]);

        let tools = toolset.tools_for(&cap).await;
        assert_eq!(tools.list().await, vec!["grep", "read_file"]);
    }

    #[tokio::test]
    async fn test_task_tool_always_withheld() {
        let toolset = RegistryToolset::new(base().await);
        let open = SubagentCapability::new("general", "g");
        let explicit = SubagentCapability::new("sneaky", "s").tools(["task", "grep"]);

        assert_eq!(
            toolset.tools_for(&open).await.list().await,
            vec!["bash", "grep", "read_file"]
        );
        assert_eq!(
            toolset.tools_for(&explicit).await.list().await,
            vec!["grep"]
        );
    }

    #[tokio::test]
    async fn test_extra_denials() {
        let toolset = RegistryToolset::new(base().await).denied(["bash"]);
        let open = SubagentCapability::new("general", "g");
        assert_eq!(
            toolset.tools_for(&open).await.list().await,
            vec!["grep", "read_file"]
        );
    }
}
