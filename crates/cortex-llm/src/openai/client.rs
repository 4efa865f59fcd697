// OpenAI-compatible chat-completions client (HTTP direct, no SDK)

use crate::streaming::{parse_sse_stream, WireUsage};
use crate::traits::{ChatClient, ChatRequest, ChatResponse, EventStream};
use crate::types::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, OPENAI_API_BASE)
    }

    /// Point the client at any OpenAI-compatible endpoint.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    fn build_payload(&self, request: &ChatRequest, stream: bool) -> Result<Value> {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(convert_message)
            .collect::<Result<Vec<_>>>()?;

        let mut payload = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": stream,
        });
        let obj = payload.as_object_mut().unwrap();

        if stream {
            // Ask for the trailing usage chunk so per-invocation token
            // accounting survives streaming.
            obj.insert(
                "stream_options".to_string(),
                serde_json::json!({ "include_usage": true }),
            );
        }
        if let Some(temp) = request.options.temperature {
            obj.insert("temperature".to_string(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = request.options.max_tokens {
            obj.insert("max_tokens".to_string(), serde_json::json!(max_tokens));
        }
        if let Some(tools) = &request.options.tools {
            if !tools.is_empty() {
                obj.insert("tools".to_string(), serde_json::to_value(tools)?);
            }
        }
        if let Some(choice) = &request.options.tool_choice {
            obj.insert("tool_choice".to_string(), serde_json::to_value(choice)?);
        }

        Ok(payload)
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(payload)
            .send()
            .await
            .context("chat completion request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("provider returned {}: {}", status, body);
        }

        Ok(response)
    }
}

fn convert_message(message: &Message) -> Result<Value> {
    let value = match message {
        Message::System { content } => serde_json::json!({
            "role": "system",
            "content": content.as_text(),
        }),
        Message::User { content } => serde_json::json!({
            "role": "user",
            "content": content.as_text(),
        }),
        Message::Assistant { content, tool_calls } => {
            let mut obj = serde_json::json!({ "role": "assistant" });
            let map = obj.as_object_mut().unwrap();
            if let Some(content) = content {
                map.insert("content".to_string(), serde_json::json!(content.as_text()));
            }
            if let Some(tool_calls) = tool_calls {
                map.insert("tool_calls".to_string(), serde_json::to_value(tool_calls)?);
            }
            obj
        }
        Message::Tool {
            tool_call_id,
            content,
        } => serde_json::json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content.as_text(),
        }),
    };
    Ok(value)
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    choices: Vec<CompletionChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    tool_calls: Option<Vec<crate::types::ToolCall>>,
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = self.build_payload(&request, false)?;
        let response = self.post(&payload).await?;

        let body: CompletionBody = response
            .json()
            .await
            .context("failed to parse chat completion body")?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .context("provider returned no choices")?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
            usage: body.usage.map(Into::into),
            finish_reason: choice.finish_reason,
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let payload = self.build_payload(&request, true)?;
        let response = self.post(&payload).await?;
        Ok(parse_sse_stream(response))
    }
}
