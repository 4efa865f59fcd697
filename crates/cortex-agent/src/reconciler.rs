use crate::error::Result;
use cortex_llm::TokenUsage;
use cortex_store::{
    EntityKind, Message, MessageContent, MessagePatch, MessageStore, NewMessage, ToolCall,
};
use std::sync::Arc;

/// Writes one turn's events into the message store.
///
/// Owns the ids of every row it creates, so two turns racing on the same
/// thread cannot touch each other's rows. If the previous run of this turn
/// was interrupted, the leftover incomplete assistant row is adopted and
/// rewritten in place; a resumed turn therefore never duplicates content.
pub struct TurnReconciler {
    store: Arc<dyn MessageStore>,
    thread_id: String,
    adopted: Option<String>,
}

impl TurnReconciler {
    pub fn new(store: Arc<dyn MessageStore>, thread_id: impl Into<String>) -> Self {
        Self {
            store,
            thread_id: thread_id.into(),
            adopted: None,
        }
    }

    /// Reuse an incomplete assistant row left by an interrupted run.
    pub fn adopt(&mut self, message_id: impl Into<String>) {
        self.adopted = Some(message_id.into());
    }

    /// User turns are durable before the model is ever invoked.
    pub async fn save_user(&self, text: &str) -> Result<Message> {
        let message = self
            .store
            .append_message(NewMessage::new(
                &self.thread_id,
                EntityKind::User,
                MessageContent::text(text),
            ))
            .await?;
        Ok(message)
    }

    /// Assistant turn that issued tool calls. The shell itself is complete
    /// the moment it exists; its calls are tracked separately.
    pub async fn save_tool_shell(&mut self, text: &str, calls: Vec<ToolCall>) -> Result<()> {
        if let Some(adopted) = self.adopted.take() {
            self.store
                .update_message(
                    &adopted,
                    MessagePatch {
                        entity: Some(EntityKind::AiTool),
                        content: Some(MessageContent::text(text)),
                        is_complete: Some(true),
                        tool_calls: Some(calls),
                        usage: None,
                    },
                )
                .await?;
        } else {
            self.store
                .append_message(
                    NewMessage::new(&self.thread_id, EntityKind::AiTool, MessageContent::text(text))
                        .with_tool_calls(calls),
                )
                .await?;
        }
        Ok(())
    }

    /// Tool result as its own message, correlated by `tool_call_id`.
    pub async fn save_tool_result(
        &self,
        tool_call_id: &str,
        tool_name: &str,
        content: String,
        is_error: bool,
    ) -> Result<Message> {
        let message = self
            .store
            .append_message(NewMessage::new(
                &self.thread_id,
                EntityKind::Tool,
                MessageContent::ToolResult {
                    tool_call_id: tool_call_id.to_string(),
                    tool_name: tool_name.to_string(),
                    content,
                    is_error,
                },
            ))
            .await?;
        Ok(message)
    }

    /// Terminal assistant reply; records the per-invocation token tallies.
    pub async fn save_final(&mut self, text: &str, usage: Vec<TokenUsage>) -> Result<()> {
        if let Some(adopted) = self.adopted.take() {
            self.store
                .update_message(
                    &adopted,
                    MessagePatch {
                        entity: Some(EntityKind::AiMessage),
                        content: Some(MessageContent::text(text)),
                        is_complete: Some(true),
                        tool_calls: None,
                        usage: Some(usage),
                    },
                )
                .await?;
        } else {
            let mut message = NewMessage::new(
                &self.thread_id,
                EntityKind::AiMessage,
                MessageContent::text(text),
            );
            message.usage = Some(usage);
            self.store.append_message(message).await?;
        }
        Ok(())
    }

    /// Interrupted mid-stream: persist whatever text was buffered, flagged
    /// incomplete so a reader can tell "in progress" from "finished".
    pub async fn save_partial(&mut self, text: &str, usage: Vec<TokenUsage>) -> Result<()> {
        if text.is_empty() && self.adopted.is_none() {
            return Ok(());
        }
        if let Some(adopted) = self.adopted.take() {
            self.store
                .update_message(
                    &adopted,
                    MessagePatch {
                        entity: Some(EntityKind::AiMessage),
                        content: Some(MessageContent::text(text)),
                        is_complete: Some(false),
                        tool_calls: None,
                        usage: if usage.is_empty() { None } else { Some(usage) },
                    },
                )
                .await?;
        } else {
            let mut message = NewMessage::new(
                &self.thread_id,
                EntityKind::AiMessage,
                MessageContent::text(text),
            )
            .incomplete();
            if !usage.is_empty() {
                message.usage = Some(usage);
            }
            self.store.append_message(message).await?;
        }
        Ok(())
    }
}
