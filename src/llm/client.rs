// ABOUTME: Defines the LlmClient trait - the seam between the agent loop
// ABOUTME: and whichever provider the embedding application wires in.

use async_trait::async_trait;

use super::{Request, Response};
use crate::error::LlmError;

/// A language model that can answer one request at a time.
///
/// Implementations are shared across concurrently running subagents, so they
/// must be `Send + Sync` and hold no per-conversation state.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Create a message (non-streaming).
    async fn create_message(&self, req: &Request) -> Result<Response, LlmError>;
}
