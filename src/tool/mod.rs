// ABOUTME: Tool module - the capabilities a subagent can be handed.
// ABOUTME: Tools are self-describing and receive an explicit ToolContext.

mod registry;
mod result;
mod traits;

pub use registry::*;
pub use result::*;
pub use traits::*;
