use std::time::Duration;

/// Knobs for one turn of execution.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,

    /// Model invocations allowed per turn. When the budget runs out the
    /// executor forces a final tool-free invocation instead of truncating.
    pub max_turns: usize,

    /// Tool calls of one invocation allowed to run concurrently.
    pub max_parallel_tool_calls: usize,

    /// Per-call deadline; a timeout becomes a tool failure result.
    pub tool_timeout: Duration,

    /// Upper bound on how many tools are offered to the model.
    pub tool_selection_cap: usize,

    /// Full-match regex restricting which tools may be offered.
    pub tool_allowlist: Option<String>,

    /// Tool results larger than this are stored out-of-band and replaced
    /// with a presigned-URL marker, when an object storage is wired in.
    pub max_inline_result_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            max_turns: 10,
            max_parallel_tool_calls: 5,
            tool_timeout: Duration::from_secs(60),
            tool_selection_cap: 80,
            tool_allowlist: None,
            max_inline_result_bytes: 64 * 1024,
        }
    }
}
