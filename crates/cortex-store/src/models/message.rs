use chrono::{DateTime, Utc};
use cortex_llm::TokenUsage;
use serde::{Deserialize, Serialize};

/// Role of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    /// End-user input
    User,
    /// Final assistant reply with no outstanding tool calls
    AiMessage,
    /// Assistant turn that issued one or more tool calls
    AiTool,
    /// A tool's result, stored as its own message
    Tool,
}

impl EntityKind {
    /// Entities that client-format pagination is allowed to cut pages on.
    pub fn is_page_boundary(self) -> bool {
        matches!(self, Self::User | Self::AiMessage)
    }
}

/// Message payload as a tagged union. The stored JSON shape is stable; the
/// tag spares every read site from re-sniffing an opaque blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl MessageContent {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text { text: s.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::ToolResult { .. } => None,
        }
    }
}

/// A tool call issued by an `AiTool` message. The result never lives here:
/// it arrives asynchronously as a separate `Tool` message correlated by
/// `id`, so the two are completeness-tracked independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Model-issued id; the correlated result message carries the same id.
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments as the model produced (or a human edited) them
    pub arguments: String,
    /// Whether this call was gated on human approval when it was issued.
    /// Recorded on the row so readers need no registry lookup, and so the
    /// answer survives later registry changes.
    #[serde(default)]
    pub requires_approval: bool,
    /// None = no verdict recorded, Some(true) = approved,
    /// Some(false) = rejected. Only meaningful when `requires_approval`.
    pub validated: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub entity: EntityKind,
    pub content: MessageContent,
    /// False while a stream is in flight or was interrupted before its
    /// terminal event; true once the turn finished or was closed.
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    /// Store-assigned per-thread sequence, tie-breaker for equal timestamps.
    pub seq: u64,
    /// Populated on `AiTool` messages only.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// One entry per model invocation of the turn, on terminal messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Vec<TokenUsage>>,
}

impl Message {
    pub fn tool_call(&self, tool_call_id: &str) -> Option<&ToolCall> {
        self.tool_calls.iter().find(|tc| tc.id == tool_call_id)
    }
}

/// Insert payload; the store assigns id, timestamp and sequence number.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub thread_id: String,
    pub entity: EntityKind,
    pub content: MessageContent,
    pub is_complete: bool,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Vec<TokenUsage>>,
}

impl NewMessage {
    pub fn new(thread_id: impl Into<String>, entity: EntityKind, content: MessageContent) -> Self {
        Self {
            thread_id: thread_id.into(),
            entity,
            content,
            is_complete: true,
            tool_calls: Vec::new(),
            usage: None,
        }
    }

    pub fn incomplete(mut self) -> Self {
        self.is_complete = false;
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

/// Partial update applied to an existing message. `entity` and `tool_calls`
/// exist so a resumed turn can rewrite the incomplete assistant row it left
/// behind instead of inserting a duplicate.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub entity: Option<EntityKind>,
    pub content: Option<MessageContent>,
    pub is_complete: Option<bool>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub usage: Option<Vec<TokenUsage>>,
}
