use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::events::{RequestStatus, TurnEvent};
use crate::history::{to_chat_history, with_system_prompt};
use crate::reconciler::TurnReconciler;
use crate::storage::{offload_if_oversized, ObjectStorage};
use anyhow::Context as _;
use cortex_llm::{
    ChatClient, ChatOptions, ChatRequest, Content, Message as ChatMessage, StreamEvent,
    TokenUsage, ToolChoice,
};
use cortex_store::{EntityKind, MessageStore, ToolCall as StoredToolCall};
use cortex_tools::{execute_with_timeout, ToolRegistry};
use futures::StreamExt;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Drives one conversation turn: history in, model stream out, tool calls
/// executed in between, everything reconciled into the message store.
///
/// A turn runs detached from its client: the event channel is best-effort,
/// so a consumer that goes away stops receiving deltas but never aborts
/// tool execution or persistence.
#[derive(Clone)]
pub struct TurnExecutor {
    chat: Arc<dyn ChatClient>,
    store: Arc<dyn MessageStore>,
    tools: Arc<ToolRegistry>,
    storage: Option<Arc<dyn ObjectStorage>>,
    http: reqwest::Client,
    config: AgentConfig,
}

impl TurnExecutor {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        store: Arc<dyn MessageStore>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            chat,
            store,
            tools,
            storage: None,
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Start a turn for new user input. Returns immediately; all outcomes,
    /// including a provider that cannot even be reached, arrive as events.
    pub fn run_turn(&self, thread_id: &str, user_input: &str) -> mpsc::Receiver<TurnEvent> {
        self.spawn(thread_id.to_string(), Some(user_input.to_string()))
    }

    /// Resume a turn from stored state, with no new user input. Used after
    /// a human validates a suspended tool call.
    pub fn run_continuation(&self, thread_id: &str) -> mpsc::Receiver<TurnEvent> {
        self.spawn(thread_id.to_string(), None)
    }

    fn spawn(&self, thread_id: String, user_input: Option<String>) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel(1000);
        let this = self.clone();

        tokio::spawn(async move {
            if let Err(e) = this.execute_loop(&thread_id, user_input, &tx).await {
                tracing::error!(thread = %thread_id, "turn failed: {}", e);
                let _ = tx
                    .send(TurnEvent::TurnError {
                        message: e.to_string(),
                    })
                    .await;
            }
        });

        rx
    }

    async fn execute_loop(
        &self,
        thread_id: &str,
        user_input: Option<String>,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Result<()> {
        let thread = self
            .store
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| AgentError::ThreadNotFound(thread_id.to_string()))?;

        let mut reconciler = TurnReconciler::new(self.store.clone(), thread_id);

        // User turns are durable before the model is invoked, so they
        // survive any later failure of the assistant turn.
        if let Some(input) = &user_input {
            reconciler.save_user(input).await?;
        }

        let stored = self.store.get_messages(thread_id).await?;

        // A trailing incomplete assistant row means the previous run of
        // this turn was interrupted. Only a continuation (no new user
        // input) resumes that turn and may rewrite the row; a fresh user
        // turn leaves the stale partial alone so it keeps its place in the
        // timeline and the new answer gets its own, newer row.
        let mut skip = Vec::new();
        if user_input.is_none() {
            if let Some(last_ai) = stored.iter().rev().find(|m| m.entity != EntityKind::User) {
                if last_ai.entity == EntityKind::AiMessage && !last_ai.is_complete {
                    reconciler.adopt(&last_ai.id);
                    skip.push(last_ai.id.clone());
                }
            }
        }

        let mut history = with_system_prompt(
            self.config.system_prompt.as_deref(),
            to_chat_history(&stored, &skip),
        );

        let allowlist = match &self.config.tool_allowlist {
            Some(pattern) => {
                Some(Regex::new(pattern).context("invalid tool allow-list regex")?)
            }
            None => None,
        };
        let selected = self
            .tools
            .select(allowlist.as_ref(), self.config.tool_selection_cap)
            .await;
        let llm_tools: Vec<cortex_llm::Tool> =
            selected.iter().map(|t| t.to_llm_tool()).collect();

        let mut usages: Vec<TokenUsage> = Vec::new();

        for invocation in 1..=self.config.max_turns {
            // Budget exhausted: force a final, tool-free response instead
            // of silently truncating the conversation.
            let force_final = invocation == self.config.max_turns;

            let mut options = ChatOptions::new();
            if let Some(temperature) = self.config.temperature {
                options = options.temperature(temperature);
            }
            if let Some(max_tokens) = self.config.max_tokens {
                options = options.max_tokens(max_tokens);
            }
            if !force_final && !llm_tools.is_empty() {
                options = options.tools(llm_tools.clone()).tool_choice(ToolChoice::Auto);
            }

            let request = ChatRequest::new(self.config.model.clone(), history.clone())
                .with_options(options);

            let mut stream = self
                .chat
                .chat_stream(request)
                .await
                .context("provider call failed")?;

            let mut text = String::new();
            let mut call_buffers: BTreeMap<u32, (Option<String>, Option<String>, String)> =
                BTreeMap::new();
            let mut usage: Option<TokenUsage> = None;
            let mut interrupted: Option<String> = None;

            while let Some(event) = stream.next().await {
                match event {
                    Ok(StreamEvent::TextDelta { content }) => {
                        text.push_str(&content);
                        let _ = tx.send(TurnEvent::TextDelta { content }).await;
                    }
                    Ok(StreamEvent::ToolCallDelta {
                        index,
                        id,
                        name,
                        arguments,
                    }) => {
                        let entry = call_buffers.entry(index).or_default();
                        if let Some(id) = id {
                            entry.0 = Some(id);
                        }
                        if let Some(name) = name {
                            entry.1 = Some(name);
                        }
                        if let Some(args) = arguments {
                            entry.2.push_str(&args);
                        }
                    }
                    Ok(StreamEvent::Usage { usage: tally }) => usage = Some(tally),
                    Ok(StreamEvent::Done { .. }) => {}
                    Err(e) => {
                        interrupted = Some(e.to_string());
                        break;
                    }
                }
            }

            usages.push(usage.unwrap_or_default());

            if let Some(message) = interrupted {
                // Partial-save contract: buffered text survives, flagged
                // incomplete so a reconnecting client can tell the state.
                reconciler.save_partial(&text, usages.clone()).await?;
                let _ = tx.send(TurnEvent::TurnError { message }).await;
                return Ok(());
            }

            let mut calls: Vec<StoredToolCall> = Vec::new();
            for (id, name, arguments) in
                call_buffers
                    .into_values()
                    .filter_map(|(id, name, arguments)| match (id, name) {
                        (Some(id), Some(name)) => Some((id, name, arguments)),
                        _ => None,
                    })
            {
                // The approval requirement is stamped on the stored call so
                // read paths never have to consult the registry.
                let requires_approval = match self.tools.get(&name).await {
                    Some(tool) => tool.requires_approval(),
                    None => false,
                };
                calls.push(StoredToolCall {
                    id,
                    name,
                    arguments,
                    requires_approval,
                    validated: None,
                });
            }

            if calls.is_empty() || force_final {
                reconciler.save_final(&text, usages.clone()).await?;
                let _ = tx.send(TurnEvent::TurnComplete { usage: usages }).await;
                return Ok(());
            }

            let (gated, runnable): (Vec<StoredToolCall>, Vec<StoredToolCall>) =
                calls.iter().cloned().partition(|c| c.requires_approval);

            reconciler.save_tool_shell(&text, calls.clone()).await?;

            for call in &calls {
                let status = if call.requires_approval {
                    RequestStatus::Pending
                } else {
                    RequestStatus::Auto
                };
                let _ = tx
                    .send(TurnEvent::ToolCallRequested {
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                        status,
                    })
                    .await;
            }

            let content = if text.is_empty() {
                None
            } else {
                Some(Content::text(text.clone()))
            };
            history.push(ChatMessage::assistant_with_tools(
                content,
                calls
                    .iter()
                    .map(|c| cortex_llm::ToolCall::new(&c.id, &c.name, &c.arguments))
                    .collect(),
            ));

            // No ordering among parallel calls; every result is persisted
            // before the turn may report completion.
            let results = futures::stream::iter(runnable.into_iter().map(|call| {
                let this = self.clone();
                let user_id = thread.user_id.clone();
                async move {
                    let (content, is_error) =
                        this.invoke_tool(&call.name, &call.arguments, &user_id).await;
                    (call, content, is_error)
                }
            }))
            .buffer_unordered(self.config.max_parallel_tool_calls.max(1))
            .collect::<Vec<_>>()
            .await;

            for (call, content, is_error) in results {
                reconciler
                    .save_tool_result(&call.id, &call.name, content.clone(), is_error)
                    .await?;
                let _ = tx
                    .send(TurnEvent::ToolResult {
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                        content: content.clone(),
                        is_error,
                    })
                    .await;
                history.push(ChatMessage::tool_result(&call.id, content));
            }

            if !gated.is_empty() {
                // Suspended on human approval; a continuation turn picks up
                // once the validate endpoint records a verdict.
                let _ = tx.send(TurnEvent::TurnComplete { usage: usages }).await;
                return Ok(());
            }
        }

        Ok(())
    }

    /// Execute a tool, folding every failure mode (missing tool, bad
    /// arguments, execution error, timeout) into an error-result payload.
    pub(crate) async fn invoke_tool(
        &self,
        name: &str,
        arguments: &str,
        user_id: &str,
    ) -> (String, bool) {
        let tool = match self.tools.get(name).await {
            Some(tool) => tool,
            None => return (format!("Tool '{}' is not available", name), true),
        };

        let args: serde_json::Value = match serde_json::from_str(arguments) {
            Ok(value) => value,
            Err(e) => return (format!("Invalid tool arguments: {}", e), true),
        };

        match execute_with_timeout(&tool, args, self.config.tool_timeout).await {
            Ok(value) => {
                let content = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                let content = offload_if_oversized(
                    self.storage.as_ref(),
                    &self.http,
                    user_id,
                    content,
                    self.config.max_inline_result_bytes,
                )
                .await;
                (content, false)
            }
            Err(e) => (format!("Tool execution failed: {}", e), true),
        }
    }
}
