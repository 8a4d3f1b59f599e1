// ABOUTME: LLM module - the provider-neutral surface the built-in agent loop talks to.
// ABOUTME: Concrete provider clients live outside this crate and implement LlmClient.

mod client;
mod types;

pub use client::*;
pub use types::*;
