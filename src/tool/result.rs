// ABOUTME: Defines the ToolResult type - tool output text, an error flag,
// ABOUTME: and structured metadata (the task tool attaches metrics here).

use std::collections::HashMap;

use serde::Serialize;

/// Result of a tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    /// The output content.
    pub content: String,

    /// Whether this result represents an error.
    pub is_error: bool,

    /// Structured data about the execution, not shown to the model.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
            ..Default::default()
        }
    }

    /// Attach metadata. Values that fail to serialize are skipped.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), v);
        }
        self
    }
}
