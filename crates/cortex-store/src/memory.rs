use crate::error::{Result, StoreError};
use crate::models::{EntityKind, Message, MessagePatch, NewMessage, Thread, ToolCall};
use crate::store::{MessageStore, PageQuery, SortDirection, TimeWindow};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory store used by tests and local development. Same observable
/// semantics as the durable backends, including the per-thread sequence
/// numbers used to break timestamp ties.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    threads: HashMap<String, Thread>,
    /// thread_id -> messages in append order
    messages: HashMap<String, Vec<Message>>,
    seq: HashMap<String, u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut messages: Vec<Message>, sort: SortDirection) -> Vec<Message> {
    messages.sort_by_key(|m| (m.created_at, m.seq));
    if sort == SortDirection::Desc {
        messages.reverse();
    }
    messages
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_thread(&self, thread: Thread) -> Result<Thread> {
        let mut inner = self.inner.write().await;
        inner.threads.insert(thread.id.clone(), thread.clone());
        inner.messages.entry(thread.id.clone()).or_default();
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        Ok(self.inner.read().await.threads.get(thread_id).cloned())
    }

    async fn list_threads(&self, user_id: &str, limit: usize) -> Result<Vec<Thread>> {
        let inner = self.inner.read().await;
        let mut threads: Vec<Thread> = inner
            .threads
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        threads.sort_by_key(|t| std::cmp::Reverse(t.updated_at));
        threads.truncate(limit);
        Ok(threads)
    }

    async fn rename_thread(&self, thread_id: &str, title: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let thread = inner
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))?;
        thread.title = title.to_string();
        thread.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .threads
            .remove(thread_id)
            .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))?;
        inner.messages.remove(thread_id);
        inner.seq.remove(thread_id);
        Ok(())
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message> {
        let mut inner = self.inner.write().await;
        if !inner.threads.contains_key(&message.thread_id) {
            return Err(StoreError::ThreadNotFound(message.thread_id));
        }

        let seq = inner.seq.entry(message.thread_id.clone()).or_insert(0);
        *seq += 1;
        let seq = *seq;

        let stored = Message {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: message.thread_id.clone(),
            entity: message.entity,
            content: message.content,
            is_complete: message.is_complete,
            created_at: Utc::now(),
            seq,
            tool_calls: message.tool_calls,
            usage: message.usage,
        };

        if let Some(thread) = inner.threads.get_mut(&message.thread_id) {
            thread.updated_at = stored.created_at;
        }
        inner
            .messages
            .entry(message.thread_id.clone())
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    async fn update_message(&self, message_id: &str, patch: MessagePatch) -> Result<()> {
        let mut inner = self.inner.write().await;
        for messages in inner.messages.values_mut() {
            if let Some(message) = messages.iter_mut().find(|m| m.id == message_id) {
                if let Some(entity) = patch.entity {
                    message.entity = entity;
                }
                if let Some(content) = patch.content {
                    message.content = content;
                }
                if let Some(is_complete) = patch.is_complete {
                    message.is_complete = is_complete;
                }
                if let Some(tool_calls) = patch.tool_calls {
                    message.tool_calls = tool_calls;
                }
                if let Some(usage) = patch.usage {
                    message.usage = Some(usage);
                }
                return Ok(());
            }
        }
        Err(StoreError::MessageNotFound(message_id.to_string()))
    }

    async fn get_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        let inner = self.inner.read().await;
        let messages = inner.messages.get(thread_id).cloned().unwrap_or_default();
        Ok(sorted(messages, SortDirection::Asc))
    }

    async fn page_messages(&self, thread_id: &str, query: PageQuery) -> Result<Vec<Message>> {
        let inner = self.inner.read().await;
        let messages = inner.messages.get(thread_id).cloned().unwrap_or_default();

        let filtered: Vec<Message> = messages
            .into_iter()
            .filter(|m| match &query.entities {
                Some(kinds) => kinds.contains(&m.entity),
                None => true,
            })
            .filter(|m| match query.cursor {
                Some(cursor) => match query.sort {
                    SortDirection::Desc => m.created_at < cursor,
                    SortDirection::Asc => m.created_at > cursor,
                },
                None => true,
            })
            .collect();

        let mut page = sorted(filtered, query.sort);
        page.truncate(query.limit);
        Ok(page)
    }

    async fn messages_in_window(
        &self,
        thread_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<Message>> {
        let inner = self.inner.read().await;
        let messages = inner.messages.get(thread_id).cloned().unwrap_or_default();
        let filtered: Vec<Message> = messages
            .into_iter()
            .filter(|m| window.contains(m.created_at))
            .collect();
        Ok(sorted(filtered, SortDirection::Asc))
    }

    async fn find_tool_call(
        &self,
        thread_id: &str,
        tool_call_id: &str,
    ) -> Result<Option<(Message, ToolCall)>> {
        let inner = self.inner.read().await;
        let Some(messages) = inner.messages.get(thread_id) else {
            return Ok(None);
        };
        for message in messages {
            if let Some(call) = message.tool_call(tool_call_id) {
                return Ok(Some((message.clone(), call.clone())));
            }
        }
        Ok(None)
    }

    async fn set_tool_call_validation(
        &self,
        thread_id: &str,
        tool_call_id: &str,
        validated: bool,
        arguments: Option<String>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let messages = inner
            .messages
            .get_mut(thread_id)
            .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))?;
        for message in messages.iter_mut() {
            if let Some(call) = message.tool_calls.iter_mut().find(|tc| tc.id == tool_call_id) {
                call.validated = Some(validated);
                if let Some(arguments) = arguments {
                    call.arguments = arguments;
                }
                return Ok(());
            }
        }
        Err(StoreError::ToolCallNotFound(tool_call_id.to_string()))
    }

    async fn find_tool_result(
        &self,
        thread_id: &str,
        tool_call_id: &str,
    ) -> Result<Option<Message>> {
        let inner = self.inner.read().await;
        let Some(messages) = inner.messages.get(thread_id) else {
            return Ok(None);
        };
        Ok(messages
            .iter()
            .find(|m| {
                m.entity == EntityKind::Tool
                    && matches!(
                        &m.content,
                        crate::models::MessageContent::ToolResult { tool_call_id: id, .. }
                            if id == tool_call_id
                    )
            })
            .cloned())
    }
}
