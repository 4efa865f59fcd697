use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A named, independently invocable unit of side-effecting work.
///
/// Implementations are agnostic to their backing: direct REST call,
/// subprocess-backed, or an in-test mock.
#[async_trait]
pub trait ToolCapability: Send + Sync {
    /// Stable identifier, also the name the model invokes it by.
    fn name(&self) -> &str;

    /// Human-facing name for client display.
    fn display_name(&self) -> &str {
        self.name()
    }

    fn description(&self) -> &str;

    /// JSON Schema describing the accepted arguments.
    fn input_schema(&self) -> Value;

    /// Whether a human must approve each invocation before it runs.
    fn requires_approval(&self) -> bool {
        false
    }

    async fn execute(&self, arguments: Value) -> Result<Value>;

    /// Advisory health check; a failing check never blocks selection.
    async fn is_online(&self) -> bool {
        true
    }
}

impl dyn ToolCapability {
    /// LLM-facing definition for this capability.
    pub fn to_llm_tool(&self) -> cortex_llm::Tool {
        cortex_llm::Tool::new(self.name(), self.description(), self.input_schema())
    }
}
