use crate::error::Result;
use crate::models::{EntityKind, Message, MessagePatch, NewMessage, Thread, ToolCall};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Cursor-driven page over one thread's messages.
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    /// Restrict to these entity kinds; None = all kinds.
    pub entities: Option<Vec<EntityKind>>,
    /// Continue strictly past this timestamp in the sort direction.
    pub cursor: Option<DateTime<Utc>>,
    /// Rows to return; callers fetch `page_size + 1` for the lookahead.
    pub limit: usize,
    pub sort: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Unbounded,
    Inclusive(DateTime<Utc>),
    Exclusive(DateTime<Utc>),
}

impl Bound {
    pub fn admits_lower(self, ts: DateTime<Utc>) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Inclusive(b) => ts >= b,
            Self::Exclusive(b) => ts > b,
        }
    }

    pub fn admits_upper(self, ts: DateTime<Utc>) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Inclusive(b) => ts <= b,
            Self::Exclusive(b) => ts < b,
        }
    }
}

/// Timestamp window used by the projector's wide (all-entities) fetch.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub lower: Bound,
    pub upper: Bound,
}

impl TimeWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.lower.admits_lower(ts) && self.upper.admits_upper(ts)
    }
}

/// Append-only per-thread message log plus thread bookkeeping.
///
/// The store is the single source of truth for conversation state. Reads
/// observe whole rows; no cross-row transaction is assumed, the turn
/// protocol tolerates user message and assistant shell being separately
/// durable.
#[async_trait]
pub trait MessageStore: Send + Sync {
    // Threads

    async fn create_thread(&self, thread: Thread) -> Result<Thread>;

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>>;

    async fn list_threads(&self, user_id: &str, limit: usize) -> Result<Vec<Thread>>;

    async fn rename_thread(&self, thread_id: &str, title: &str) -> Result<()>;

    /// Cascades to the thread's messages and their tool calls.
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    // Messages

    /// Append a message; the store assigns id, creation time and a
    /// per-thread sequence number that breaks timestamp ties.
    async fn append_message(&self, message: NewMessage) -> Result<Message>;

    async fn update_message(&self, message_id: &str, patch: MessagePatch) -> Result<()>;

    /// All messages of a thread, oldest first.
    async fn get_messages(&self, thread_id: &str) -> Result<Vec<Message>>;

    async fn page_messages(&self, thread_id: &str, query: PageQuery) -> Result<Vec<Message>>;

    /// Every entity kind within the window, oldest first.
    async fn messages_in_window(&self, thread_id: &str, window: TimeWindow)
        -> Result<Vec<Message>>;

    // Tool calls

    /// Locate a tool call and its owning `AiTool` message.
    async fn find_tool_call(
        &self,
        thread_id: &str,
        tool_call_id: &str,
    ) -> Result<Option<(Message, ToolCall)>>;

    /// Record the human verdict; edited arguments replace the originals.
    async fn set_tool_call_validation(
        &self,
        thread_id: &str,
        tool_call_id: &str,
        validated: bool,
        arguments: Option<String>,
    ) -> Result<()>;

    /// The `Tool` result message correlated to a call, if it arrived.
    async fn find_tool_result(
        &self,
        thread_id: &str,
        tool_call_id: &str,
    ) -> Result<Option<Message>>;
}
