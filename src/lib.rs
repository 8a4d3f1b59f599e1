// ABOUTME: Root module for delegate - subagent task orchestration for tool-calling agents.
// ABOUTME: Re-exports the entry points; see `prelude` for the common set.

pub mod agent;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod llm;
pub mod prelude;
pub mod session;
pub mod task;
pub mod tool;

pub use coordinator::TaskTool;
pub use error::DelegateError;
