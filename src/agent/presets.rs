// ABOUTME: Built-in subagent types: general, research (read/search only), and coding.
// ABOUTME: CapabilityRegistry::builtin() assembles them into a ready registry.

use super::{CapabilityRegistry, SubagentCapability};

/// Read and search tools shared by every restricted type.
pub const READONLY_TOOLS: &[&str] = &[
    "read_file",
    "glob",
    "grep",
    "search",
    "list_files",
    "web_search",
    "web_fetch",
];

/// Mutating tools added on top of the read-only set for coding work.
pub const WRITE_TOOLS: &[&str] = &["write_file", "edit", "bash"];

const RESEARCH_PROMPT: &str = r#"You are a research subagent. Your job is to find information efficiently.

Guidelines:
- Use search tools (grep, glob) to locate relevant files
- Read files to understand structure and patterns
- Do not modify any files
- Answer the specific question asked, citing file paths
- Your final message is returned verbatim to the agent that delegated to you"#;

const CODING_PROMPT: &str = r#"You are a coding subagent. Your job is to implement a focused change.

Guidelines:
- Read the surrounding code before editing and follow its style
- Make minimal, focused changes
- Run the relevant build or tests when a shell is available
- Finish with a short summary of what changed and where"#;

const GENERAL_PROMPT: &str = r#"You are a general-purpose subagent working on one delegated task.

Guidelines:
- Work autonomously; do not ask for clarification
- Use whichever tools fit the task
- Finish with a clear, self-contained answer"#;

pub fn research() -> SubagentCapability {
    SubagentCapability::new(
        "research",
        "Explores code and documentation to answer questions; never modifies files",
    )
    .tools(READONLY_TOOLS.iter().copied())
    .performance_profile("fast")
    .optimized_for(["search", "code-reading", "summarization"])
    .system_prompt(RESEARCH_PROMPT)
    .max_iterations(20)
}

pub fn coding() -> SubagentCapability {
    SubagentCapability::new(
        "coding",
        "Implements, edits, and verifies code changes",
    )
    .tools(READONLY_TOOLS.iter().chain(WRITE_TOOLS).copied())
    .performance_profile("thorough")
    .optimized_for(["implementation", "refactoring", "bug-fixing"])
    .system_prompt(CODING_PROMPT)
    .max_iterations(50)
}

pub fn general() -> SubagentCapability {
    SubagentCapability::new(
        "general",
        "Handles multi-step tasks that need any available tool",
    )
    .tools_summary("all tools except task delegation")
    .performance_profile("balanced")
    .optimized_for(["multi-step", "mixed"])
    .system_prompt(GENERAL_PROMPT)
    .max_iterations(30)
}

impl CapabilityRegistry {
    /// Registry holding the built-in `general`, `research`, and `coding` types.
    pub fn builtin() -> Self {
        let mut entries = std::collections::BTreeMap::new();
        for cap in [general(), research(), coding()] {
            entries.insert(cap.name.clone(), cap);
        }
        CapabilityRegistry::from_entries(entries)
    }
}
