use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use cortex_llm::TokenUsage;
use cortex_store::{
    Bound, EntityKind, Message, MessageContent, MessageStore, PageQuery, SortDirection,
    TimeWindow,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// One page of projected results, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub has_more: bool,
    /// RFC 3339 timestamp to pass back as `cursor` for the next page.
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PageParams {
    pub page_size: usize,
    pub cursor: Option<DateTime<Utc>>,
    pub sort: SortDirection,
    /// Restrict raw listing to these entity kinds; None = all.
    pub entities: Option<Vec<EntityKind>>,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page_size: 20,
            cursor: None,
            sort: SortDirection::Desc,
            entities: None,
        }
    }
}

/// Raw message row as served to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: String,
    pub thread_id: String,
    pub entity: EntityKind,
    pub content: MessageContent,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Vec<TokenUsage>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallView {
    pub id: String,
    pub name: String,
    pub arguments: String,
    pub validated: Option<bool>,
    /// Correlated `TOOL` result content, attached for display convenience.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            thread_id: m.thread_id,
            entity: m.entity,
            content: m.content,
            is_complete: m.is_complete,
            created_at: m.created_at,
            tool_calls: m
                .tool_calls
                .into_iter()
                .map(|tc| ToolCallView {
                    id: tc.id,
                    name: tc.name,
                    arguments: tc.arguments,
                    validated: tc.validated,
                    result: None,
                })
                .collect(),
            usage: m.usage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// Lifecycle of one tool invocation as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    /// Requested; no result yet.
    Call,
    /// Result available.
    Result,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    NotRequired,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnPart {
    Text {
        text: String,
    },
    ToolInvocation {
        tool_call_id: String,
        tool_name: String,
        state: InvocationState,
        approval: ApprovalStatus,
        arguments: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        is_error: bool,
    },
}

/// One conversational turn in the client rendering: a user turn carries a
/// single text part, an assistant turn carries every part the model produced
/// until the next user message, tool invocations folded in with their
/// results.
#[derive(Debug, Clone, Serialize)]
pub struct ClientTurn {
    pub id: String,
    pub role: TurnRole,
    pub created_at: DateTime<Utc>,
    pub parts: Vec<TurnPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Vec<TokenUsage>>,
}

/// Read-side projection over the message store.
pub struct Projector {
    store: Arc<dyn MessageStore>,
}

impl Projector {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Plain paginated listing of stored rows.
    pub async fn list(&self, thread_id: &str, params: PageParams) -> Result<Page<MessageView>> {
        let (rows, take) = self
            .page_rows(
                thread_id,
                params.entities.clone(),
                params.page_size,
                params.cursor,
                params.sort,
            )
            .await?;

        let has_more = rows.len() > take;
        let next_cursor = if has_more {
            rows[..take].last().map(|m| rfc3339(m.created_at))
        } else {
            None
        };

        let mut results: Vec<MessageView> =
            rows.into_iter().take(take).map(MessageView::from).collect();
        for view in &mut results {
            for call in &mut view.tool_calls {
                if let Some(result) = self.store.find_tool_result(thread_id, &call.id).await? {
                    if let MessageContent::ToolResult { content, .. } = result.content {
                        call.result = Some(content);
                    }
                }
            }
        }

        Ok(Page {
            results,
            has_more,
            next_cursor,
        })
    }

    /// Client-facing view: messages regrouped into turns, newest first.
    ///
    /// Pagination is driven by the page-boundary kinds (`USER` and
    /// `AI_MESSAGE`) only; everything that happened between two boundary
    /// rows travels with the page that carries them, so a turn is never
    /// split across pages.
    pub async fn client_turns(
        &self,
        thread_id: &str,
        page_size: usize,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<Page<ClientTurn>> {
        let (boundary_rows, take) = self
            .page_rows(
                thread_id,
                Some(vec![EntityKind::User, EntityKind::AiMessage]),
                page_size,
                cursor,
                SortDirection::Desc,
            )
            .await?;

        let has_more = boundary_rows.len() > take;
        let included = &boundary_rows[..take];

        let lower = if !has_more {
            Bound::Unbounded
        } else {
            // The oldest included boundary anchors the window. A user row
            // starts its own turn so the bound is inclusive; an assistant
            // row needs the non-boundary rows before it (its turn's tool
            // activity), so the window opens just past the next older
            // boundary instead.
            match included.last() {
                Some(oldest) if oldest.entity == EntityKind::User => {
                    Bound::Inclusive(oldest.created_at)
                }
                _ => Bound::Exclusive(boundary_rows[take].created_at),
            }
        };
        let upper = match cursor {
            Some(cursor) => Bound::Exclusive(cursor),
            None => Bound::Unbounded,
        };

        let window_rows = self
            .store
            .messages_in_window(thread_id, TimeWindow { lower, upper })
            .await?;

        // Only the latest page may end mid-turn (a suspended or still
        // streaming assistant); there the trailing buffer is flushed so the
        // in-flight turn is visible. On older pages the window's upper edge
        // cuts just below an `AI_MESSAGE` boundary, so an unterminated
        // trailing buffer is the tool activity of a turn the newer page
        // already rendered whole; flushing it would emit that turn twice.
        let flush_trailing = upper == Bound::Unbounded;
        let mut turns = assemble_turns(&window_rows, flush_trailing);
        turns.reverse();

        let next_cursor = if has_more {
            included.last().map(|m| rfc3339(m.created_at))
        } else {
            None
        };

        Ok(Page {
            results: turns,
            has_more,
            next_cursor,
        })
    }

    /// Fetch one page worth of rows plus the count to include.
    ///
    /// A page never ends between two rows sharing the same instant (at the
    /// cursor's microsecond resolution, which also covers stores that round
    /// to milliseconds): the tie rides along on the current page even when
    /// that overshoots `page_size`. The timestamp-only cursor with a strict
    /// comparison is then exact; splitting a tie would either skip or
    /// repeat the tied row on the next page.
    async fn page_rows(
        &self,
        thread_id: &str,
        entities: Option<Vec<EntityKind>>,
        page_size: usize,
        cursor: Option<DateTime<Utc>>,
        sort: SortDirection,
    ) -> Result<(Vec<Message>, usize)> {
        let page_size = page_size.max(1);
        let mut fetch = page_size + 1;
        let rows = loop {
            let rows = self
                .store
                .page_messages(
                    thread_id,
                    PageQuery {
                        entities: entities.clone(),
                        cursor,
                        limit: fetch,
                        sort,
                    },
                )
                .await?;
            // A full fetch ending in a tie may cut a tie group short;
            // widen until the store runs dry or the last two rows differ.
            if rows.len() == fetch && same_instant(&rows[fetch - 1], &rows[fetch - 2]) {
                fetch += 8;
                continue;
            }
            break rows;
        };
        let take = split_at_tie(&rows, page_size);
        Ok((rows, take))
    }
}

/// How many of `rows` the current page includes: `limit`, extended past any
/// rows tied with the last included one.
fn split_at_tie(rows: &[Message], limit: usize) -> usize {
    let mut take = rows.len().min(limit);
    while take < rows.len() && same_instant(&rows[take], &rows[take - 1]) {
        take += 1;
    }
    take
}

fn same_instant(a: &Message, b: &Message) -> bool {
    a.created_at.timestamp_micros() == b.created_at.timestamp_micros()
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Fold an oldest-first run of rows into client turns. Assistant parts
/// buffer until a terminal `AI_MESSAGE` row flushes the turn; the trailing
/// buffer flushes only when `flush_trailing` is set.
fn assemble_turns(rows: &[Message], flush_trailing: bool) -> Vec<ClientTurn> {
    // Results are folded into the invocation part of their owning call.
    let mut results: HashMap<&str, (&str, bool)> = HashMap::new();
    for row in rows {
        if let MessageContent::ToolResult {
            tool_call_id,
            content,
            is_error,
            ..
        } = &row.content
        {
            results.insert(tool_call_id.as_str(), (content.as_str(), *is_error));
        }
    }

    let mut turns: Vec<ClientTurn> = Vec::new();
    let mut current: Option<ClientTurn> = None;

    for row in rows {
        match row.entity {
            EntityKind::User => {
                if let Some(turn) = current.take() {
                    turns.push(turn);
                }
                turns.push(ClientTurn {
                    id: row.id.clone(),
                    role: TurnRole::User,
                    created_at: row.created_at,
                    parts: vec![TurnPart::Text {
                        text: row.content.as_text().unwrap_or_default().to_string(),
                    }],
                    usage: None,
                });
            }
            EntityKind::AiMessage | EntityKind::AiTool => {
                let turn = current.get_or_insert_with(|| ClientTurn {
                    id: row.id.clone(),
                    role: TurnRole::Assistant,
                    created_at: row.created_at,
                    parts: Vec::new(),
                    usage: None,
                });

                if let Some(text) = row.content.as_text() {
                    if !text.is_empty() {
                        turn.parts.push(TurnPart::Text {
                            text: text.to_string(),
                        });
                    }
                }
                for call in &row.tool_calls {
                    let result = results.get(call.id.as_str());
                    // Derived from the stored call alone: an auto-run call
                    // with its result still in flight is not pending.
                    let approval = match (call.validated, call.requires_approval) {
                        (Some(true), _) => ApprovalStatus::Approved,
                        (Some(false), _) => ApprovalStatus::Rejected,
                        (None, true) => ApprovalStatus::Pending,
                        (None, false) => ApprovalStatus::NotRequired,
                    };
                    turn.parts.push(TurnPart::ToolInvocation {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        state: if result.is_some() {
                            InvocationState::Result
                        } else {
                            InvocationState::Call
                        },
                        approval,
                        arguments: call.arguments.clone(),
                        result: result.map(|(content, _)| content.to_string()),
                        is_error: result.map(|(_, is_error)| *is_error).unwrap_or(false),
                    });
                }
                if row.entity == EntityKind::AiMessage {
                    if turn.usage.is_none() {
                        turn.usage = row.usage.clone();
                    }
                    // A complete text row closes the assistant turn.
                    if let Some(turn) = current.take() {
                        turns.push(turn);
                    }
                }
            }
            EntityKind::Tool => {}
        }
    }

    if flush_trailing {
        if let Some(turn) = current.take() {
            turns.push(turn);
        }
    }

    turns
}
