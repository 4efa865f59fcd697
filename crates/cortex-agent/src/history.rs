use cortex_llm::{Content, Message as ChatMessage, ToolCall as ChatToolCall};
use cortex_store::{EntityKind, Message, MessageContent};

/// Convert stored messages into the provider-neutral chat history.
///
/// `USER` becomes a user turn, `AI_MESSAGE`/`AI_TOOL` an assistant turn with
/// any tool-call records attached, `TOOL` a tool-result turn keyed by
/// `tool_call_id`. Messages whose ids appear in `skip` are left out (a
/// resumed turn regenerates its interrupted assistant row).
pub fn to_chat_history(messages: &[Message], skip: &[String]) -> Vec<ChatMessage> {
    let mut history = Vec::with_capacity(messages.len());

    for message in messages {
        if skip.contains(&message.id) {
            continue;
        }
        match message.entity {
            EntityKind::User => {
                if let Some(text) = message.content.as_text() {
                    history.push(ChatMessage::user(text));
                }
            }
            EntityKind::AiMessage => {
                if let Some(text) = message.content.as_text() {
                    history.push(ChatMessage::assistant(text));
                }
            }
            EntityKind::AiTool => {
                let content = message
                    .content
                    .as_text()
                    .filter(|t| !t.is_empty())
                    .map(Content::text);
                let calls: Vec<ChatToolCall> = message
                    .tool_calls
                    .iter()
                    .map(|tc| ChatToolCall::new(&tc.id, &tc.name, &tc.arguments))
                    .collect();
                if calls.is_empty() {
                    // shell with no calls degrades to plain assistant text
                    if let Some(content) = content {
                        history.push(ChatMessage::Assistant {
                            content: Some(content),
                            tool_calls: None,
                        });
                    }
                } else {
                    history.push(ChatMessage::assistant_with_tools(content, calls));
                }
            }
            EntityKind::Tool => {
                if let MessageContent::ToolResult {
                    tool_call_id,
                    content,
                    ..
                } = &message.content
                {
                    history.push(ChatMessage::tool_result(tool_call_id, content.as_str()));
                }
            }
        }
    }

    history
}

/// Prepend the system prompt, when configured.
pub fn with_system_prompt(
    system_prompt: Option<&str>,
    history: Vec<ChatMessage>,
) -> Vec<ChatMessage> {
    match system_prompt {
        Some(prompt) => {
            let mut full = Vec::with_capacity(history.len() + 1);
            full.push(ChatMessage::system(prompt));
            full.extend(history);
            full
        }
        None => history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_store::ToolCall;

    fn stored(entity: EntityKind, content: MessageContent) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: "t".to_string(),
            entity,
            content,
            is_complete: true,
            created_at: chrono::Utc::now(),
            seq: 0,
            tool_calls: Vec::new(),
            usage: None,
        }
    }

    #[test]
    fn converts_each_entity_kind() {
        let mut ai_tool = stored(EntityKind::AiTool, MessageContent::text(""));
        ai_tool.tool_calls = vec![ToolCall {
            id: "call_1".to_string(),
            name: "lookup".to_string(),
            arguments: "{}".to_string(),
            requires_approval: false,
            validated: None,
        }];

        let messages = vec![
            stored(EntityKind::User, MessageContent::text("hi")),
            ai_tool,
            stored(
                EntityKind::Tool,
                MessageContent::ToolResult {
                    tool_call_id: "call_1".to_string(),
                    tool_name: "lookup".to_string(),
                    content: "found".to_string(),
                    is_error: false,
                },
            ),
            stored(EntityKind::AiMessage, MessageContent::text("done")),
        ];

        let history = to_chat_history(&messages, &[]);
        let roles: Vec<&str> = history.iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec!["user", "assistant", "tool", "assistant"]);
    }

    #[test]
    fn skips_requested_ids() {
        let interrupted = stored(EntityKind::AiMessage, MessageContent::text("partial"));
        let skip = vec![interrupted.id.clone()];
        let history = to_chat_history(&[interrupted], &skip);
        assert!(history.is_empty());
    }
}
