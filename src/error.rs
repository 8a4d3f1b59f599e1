// ABOUTME: Defines all error types for the delegate library using thiserror.
// ABOUTME: Per-task failures carry an ErrorKind; everything else unifies under DelegateError.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level error type for the delegate library.
#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Classified failure kinds, serialized with their snake_case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    SessionCreationFailed,
    AgentCreationFailed,
    Timeout,
    Cancelled,
    ExecutionFailed,
    AggregationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::SessionCreationFailed => "session_creation_failed",
            ErrorKind::AgentCreationFailed => "agent_creation_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::ExecutionFailed => "execution_failed",
            ErrorKind::AggregationError => "aggregation_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a single task.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

fn at(task: &Option<usize>) -> String {
    match task {
        Some(index) => format!("task {}: ", index),
        None => String::new(),
    }
}

/// Request-shape errors. Any of these blocks the whole request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid parameters: {0}")]
    Malformed(String),

    #[error("{}missing required field '{field}'", at(.task))]
    MissingField {
        task: Option<usize>,
        field: &'static str,
    },

    #[error("{}field '{field}' must not be empty", at(.task))]
    EmptyField {
        task: Option<usize>,
        field: &'static str,
    },

    #[error("{}unknown subagent type '{name}'. Valid types: {}", at(.task), .valid.join(", "))]
    UnknownSubagentType {
        task: Option<usize>,
        name: String,
        valid: Vec<String>,
    },

    #[error("'tasks' must contain at least one task")]
    EmptyBatch,

    #[error("unsupported aggregate_mode '{0}'. Valid modes: concat, json_array, summary")]
    UnknownAggregateMode(String),

    #[error("invalid timeout '{value}': {reason}")]
    InvalidTimeout { value: String, reason: String },
}

impl ValidationError {
    /// The taxonomy kind reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::UnknownAggregateMode(_) => ErrorKind::AggregationError,
            _ => ErrorKind::ValidationError,
        }
    }
}

/// Errors from reducing outcomes into one response.
#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("failed to encode results: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("expected {expected} outcomes, got {actual}")]
    Incomplete { expected: usize, actual: usize },
}

/// Errors from the session collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session storage failed: {0}")]
    Storage(String),
}

/// Errors from building or running an agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to build agent: {0}")]
    Build(String),

    #[error("agent run cancelled")]
    Cancelled,

    #[error("agent exceeded max iterations ({0})")]
    MaxIterations(usize),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{0}")]
    Failed(String),
}

/// Errors from LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}
