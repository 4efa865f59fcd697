use crate::traits::TokenUsage;
use anyhow::Result;
use futures::{Stream, StreamExt};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Incremental events produced while a chat completion streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A fragment of assistant text
    TextDelta { content: String },

    /// A fragment of a tool call; `id`/`name` arrive on the first fragment,
    /// `arguments` accumulates across fragments of the same `index`.
    ToolCallDelta {
        index: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },

    /// Token accounting for the invocation (sent once, near the end)
    Usage { usage: TokenUsage },

    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

// Wire shapes for OpenAI-style `chat.completion.chunk` payloads.

#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    #[serde(default)]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: u32,
}

impl From<WireUsage> for TokenUsage {
    fn from(u: WireUsage) -> Self {
        TokenUsage {
            input_tokens: u.prompt_tokens,
            cached_input_tokens: u.prompt_tokens_details.map(|d| d.cached_tokens).unwrap_or(0),
            completion_tokens: u.completion_tokens,
        }
    }
}

impl ChatStreamChunk {
    fn into_events(self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(usage) = self.usage {
            events.push(StreamEvent::Usage {
                usage: usage.into(),
            });
        }

        if let Some(choice) = self.choices.into_iter().next() {
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    events.push(StreamEvent::TextDelta { content });
                }
            }

            if let Some(tool_calls) = choice.delta.tool_calls {
                for tc in tool_calls {
                    let (name, arguments) = match tc.function {
                        Some(f) => (f.name, f.arguments),
                        None => (None, None),
                    };
                    events.push(StreamEvent::ToolCallDelta {
                        index: tc.index,
                        id: tc.id,
                        name,
                        arguments,
                    });
                }
            }

            if let Some(finish_reason) = choice.finish_reason {
                events.push(StreamEvent::Done {
                    finish_reason: Some(finish_reason),
                });
            }
        }

        events
    }
}

/// Parse an SSE body into a stream of [`StreamEvent`]s.
pub fn parse_sse_stream(response: Response) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>> {
    let mut bytes = Box::pin(response.bytes_stream());

    Box::pin(async_stream::stream! {
        let mut buffer = String::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield Err(anyhow::anyhow!("stream read error: {}", e));
                    return;
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=pos).collect();
                let line = line.trim();

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };

                if data == "[DONE]" {
                    yield Ok(StreamEvent::Done { finish_reason: None });
                    return;
                }

                match serde_json::from_str::<ChatStreamChunk>(data) {
                    Ok(parsed) => {
                        for event in parsed.into_events() {
                            yield Ok(event);
                        }
                    }
                    Err(e) => yield Err(anyhow::anyhow!("malformed stream chunk: {}", e)),
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_with_text_delta() {
        let data = r#"{"choices":[{"delta":{"content":"hello"},"finish_reason":null}]}"#;
        let chunk: ChatStreamChunk = serde_json::from_str(data).unwrap();
        let events = chunk.into_events();
        assert!(matches!(&events[0], StreamEvent::TextDelta { content } if content == "hello"));
    }

    #[test]
    fn chunk_with_tool_call_fragments() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"lookup","arguments":"{\"q"}}]},"finish_reason":null}]}"#;
        let chunk: ChatStreamChunk = serde_json::from_str(data).unwrap();
        let events = chunk.into_events();
        match &events[0] {
            StreamEvent::ToolCallDelta { index, id, name, arguments } => {
                assert_eq!(*index, 0);
                assert_eq!(id.as_deref(), Some("call_1"));
                assert_eq!(name.as_deref(), Some("lookup"));
                assert_eq!(arguments.as_deref(), Some("{\"q"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn usage_chunk_maps_cached_tokens() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":120,"completion_tokens":30,"prompt_tokens_details":{"cached_tokens":100}}}"#;
        let chunk: ChatStreamChunk = serde_json::from_str(data).unwrap();
        let events = chunk.into_events();
        match &events[0] {
            StreamEvent::Usage { usage } => {
                assert_eq!(usage.input_tokens, 120);
                assert_eq!(usage.cached_input_tokens, 100);
                assert_eq!(usage.completion_tokens, 30);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
