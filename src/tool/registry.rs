// ABOUTME: Implements the Registry - a shared, thread-safe set of tools keyed
// ABOUTME: by name, and snapshots of it restricted to a subset of names.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::Tool;
use crate::llm::ToolDefinition;

/// A thread-safe registry of tools. Clones share the same tool set.
#[derive(Default, Clone)]
pub struct Registry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub async fn register<T: Tool + 'static>(&self, tool: T) {
        self.register_arc(Arc::new(tool)).await;
    }

    pub async fn register_arc(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn unregister(&self, name: &str) {
        let mut tools = self.tools.write().await;
        tools.remove(name);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// List all tool names, sorted alphabetically.
    pub async fn list(&self) -> Vec<String> {
        let tools = self.tools.read().await;
        let mut names: Vec<_> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn count(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Tool definitions for the model, sorted by name.
    pub async fn to_definitions(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        let mut defs: Vec<_> = tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Independent registry holding only the tools whose names pass `keep`.
    ///
    /// Later registrations on `self` are not visible in the snapshot.
    pub async fn snapshot_filtered<F>(&self, keep: F) -> Registry
    where
        F: Fn(&str) -> bool,
    {
        let tools = self.tools.read().await;
        let selected: HashMap<_, _> = tools
            .iter()
            .filter(|(name, _)| keep(name))
            .map(|(name, tool)| (name.clone(), Arc::clone(tool)))
            .collect();
        Registry {
            tools: Arc::new(RwLock::new(selected)),
        }
    }
}
