use cortex_llm::TokenUsage;
use serde::{Deserialize, Serialize};

/// Whether a requested tool call runs immediately or waits for a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Executes without approval
    Auto,
    /// Suspended until a validation verdict arrives
    Pending,
}

/// Events emitted while one turn executes. The stream is always well formed:
/// even a provider that cannot be reached produces a single terminal
/// `TurnError` rather than a synchronous failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    TextDelta {
        content: String,
    },

    ToolCallRequested {
        tool_call_id: String,
        name: String,
        arguments: String,
        status: RequestStatus,
    },

    ToolResult {
        tool_call_id: String,
        name: String,
        content: String,
        is_error: bool,
    },

    /// Terminal; one usage entry per model invocation of the turn.
    TurnComplete {
        usage: Vec<TokenUsage>,
    },

    /// Terminal error surfaced in-stream.
    TurnError {
        message: String,
    },
}
