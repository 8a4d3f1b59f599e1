// ABOUTME: SubagentCapability and CapabilityRegistry - what each subagent type is
// ABOUTME: allowed to do. The registry is built once and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::error::DelegateError;

/// Definition of a subagent type that can be delegated to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubagentCapability {
    /// Unique type name, as written in `subagent_type`.
    pub name: String,

    pub description: String,

    /// Human-readable list of the tools this type may use.
    pub tools_summary: String,

    /// Short tag such as "fast" or "thorough".
    pub performance_profile: String,

    /// Kinds of work this type is suited for.
    pub optimized_for: Vec<String>,

    /// System prompt for the agent loop.
    #[serde(skip)]
    pub system_prompt: String,

    /// Tool names this type may use (allowlist).
    /// If None, every tool except the delegating one is available.
    #[serde(skip)]
    pub allowed_tools: Option<Vec<String>>,

    /// Maximum iterations for the think-act loop.
    #[serde(skip)]
    pub max_iterations: usize,
}

impl SubagentCapability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tools_summary: "all tools".to_string(),
            performance_profile: "balanced".to_string(),
            optimized_for: Vec::new(),
            system_prompt: String::new(),
            allowed_tools: None,
            max_iterations: 20,
        }
    }

    /// Restrict this type to `tools`. Also rewrites the tools summary.
    pub fn tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tools: Vec<String> = tools.into_iter().map(Into::into).collect();
        self.tools_summary = tools.join(", ");
        self.allowed_tools = Some(tools);
        self
    }

    pub fn tools_summary(mut self, summary: impl Into<String>) -> Self {
        self.tools_summary = summary.into();
        self
    }

    pub fn performance_profile(mut self, profile: impl Into<String>) -> Self {
        self.performance_profile = profile.into();
        self
    }

    pub fn optimized_for<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optimized_for = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Whether a tool name is within this type's allowlist.
    pub fn permits(&self, tool: &str) -> bool {
        match &self.allowed_tools {
            None => true,
            Some(allowed) => allowed.iter().any(|a| a == tool),
        }
    }
}

/// Immutable lookup from subagent type name to capability.
///
/// Cheap to clone and safe to share across concurrent workers.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    entries: Arc<BTreeMap<String, SubagentCapability>>,
}

impl CapabilityRegistry {
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::default()
    }

    pub(super) fn from_entries(entries: BTreeMap<String, SubagentCapability>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&SubagentCapability> {
        self.entries.get(name)
    }

    /// All registered type names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubagentCapability> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Markdown table of every type, embedded in the task tool's description.
    pub fn describe(&self) -> String {
        let mut out = String::from(
            "| Type | Description | Tools | Profile | Optimized for |\n|---|---|---|---|---|\n",
        );
        for cap in self.entries.values() {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                cap.name,
                cap.description,
                cap.tools_summary,
                cap.performance_profile,
                cap.optimized_for.join(", ")
            );
        }
        out
    }
}

/// Collects capabilities before freezing them into a registry.
#[derive(Debug, Default)]
pub struct CapabilityRegistryBuilder {
    entries: Vec<SubagentCapability>,
}

impl CapabilityRegistryBuilder {
    pub fn register(mut self, capability: SubagentCapability) -> Self {
        self.entries.push(capability);
        self
    }

    /// Freeze the registry. Empty or duplicate names are rejected.
    pub fn build(self) -> Result<CapabilityRegistry, DelegateError> {
        let mut entries = BTreeMap::new();
        for cap in self.entries {
            if cap.name.trim().is_empty() {
                return Err(DelegateError::Config(
                    "subagent type name must not be empty".into(),
                ));
            }
            if entries.contains_key(&cap.name) {
                return Err(DelegateError::Config(format!(
                    "duplicate subagent type '{}'",
                    cap.name
                )));
            }
            entries.insert(cap.name.clone(), cap);
        }
        Ok(CapabilityRegistry::from_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_builder() {
        let cap = SubagentCapability::new("research", "Finds things")
            .tools(["grep", "read_file"])
            .performance_profile("fast")
            .optimized_for(["search"])
            .max_iterations(5);

        assert_eq!(cap.tools_summary, "grep, read_file");
        assert!(cap.permits("grep"));
        assert!(!cap.permits("bash"));
        assert_eq!(cap.max_iterations, 5);

        let open = SubagentCapability::new("general", "Anything");
        assert!(open.permits("bash"));
    }

    #[test]
    fn test_registry_resolve_and_names() {
        let registry = CapabilityRegistry::builder()
            .register(SubagentCapability::new("coding", "Writes code"))
            .register(SubagentCapability::new("analysis", "Reads code"))
            .build()
            .unwrap();

        assert_eq!(registry.names(), vec!["analysis", "coding"]);
        assert_eq!(registry.resolve("coding").unwrap().description, "Writes code");
        assert!(registry.resolve("missing").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let err = CapabilityRegistry::builder()
            .register(SubagentCapability::new("coding", "a"))
            .register(SubagentCapability::new("coding", "b"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate subagent type 'coding'"));
    }

    #[test]
    fn test_describe_has_row_per_type() {
        let registry = CapabilityRegistry::builder()
            .register(SubagentCapability::new("research", "Finds things").tools(["grep"]))
            .build()
            .unwrap();

        let table = registry.describe();
        assert!(table.contains("| research | Finds things | grep | balanced |"));
        assert_eq!(table.lines().count(), 3);
    }
}
