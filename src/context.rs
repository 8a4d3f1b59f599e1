// ABOUTME: Explicit execution context passed down every tool and agent call.
// ABOUTME: Carries the owning session, ancestor tool-call ids, and a cancellation token.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Ordered list of ancestor tool-call ids, outermost first.
///
/// Immutable: `push` returns an extended copy, so sibling calls never
/// observe each other's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStack {
    frames: Arc<Vec<String>>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new stack with `call_id` as the innermost frame.
    pub fn push(&self, call_id: impl Into<String>) -> Self {
        let mut frames = Vec::with_capacity(self.frames.len() + 1);
        frames.extend(self.frames.iter().cloned());
        frames.push(call_id.into());
        Self {
            frames: Arc::new(frames),
        }
    }

    /// The innermost tool-call id, if any.
    pub fn current(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.frames.iter().any(|f| f == call_id)
    }
}

impl fmt::Display for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.frames.join(" > "))
    }
}

/// Context handed to `Tool::execute`.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Session on whose behalf the tool runs.
    pub session_id: String,

    /// Ancestor tool calls, including the call being executed.
    pub call_stack: CallStack,

    /// Cancelled when the enclosing run is stopped.
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            call_stack: CallStack::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_call_stack(mut self, call_stack: CallStack) -> Self {
        self.call_stack = call_stack;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Context for a nested tool call made from this one.
    pub fn child(&self, session_id: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            call_stack: self.call_stack.push(call_id),
            cancel: self.cancel.child_token(),
        }
    }
}
