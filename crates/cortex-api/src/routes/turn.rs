use crate::auth::authorize_project_scope;
use crate::error::{ApiError, ApiResult};
use crate::limits::RateDecision;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::sse::{Event, Sse},
    Json,
};
use cortex_agent::TurnEvent;
use futures::stream::Stream;
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub content: String,
}

fn event_name(event: &TurnEvent) -> &'static str {
    match event {
        TurnEvent::TextDelta { .. } => "text_delta",
        TurnEvent::ToolCallRequested { .. } => "tool_call_requested",
        TurnEvent::ToolResult { .. } => "tool_result",
        TurnEvent::TurnComplete { .. } => "turn_complete",
        TurnEvent::TurnError { .. } => "turn_error",
    }
}

/// Bridge a turn's event channel onto SSE. Always 200: provider failures
/// arrive as a terminal `turn_error` event inside the stream.
pub(crate) fn sse_stream(
    rx: mpsc::Receiver<TurnEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(rx).map(|event| {
        let sse_event = Event::default()
            .event(event_name(&event))
            .json_data(&event)
            .unwrap_or_else(|e| {
                tracing::error!("failed to serialize stream event: {}", e);
                Event::default().event("turn_error").data("{}")
            });
        Ok::<Event, Infallible>(sse_event)
    });
    Sse::new(stream)
}

pub async fn start_turn(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
    Json(req): Json<TurnRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let identity = state.require_identity(&headers).await?;
    let thread = state.owned_thread(&thread_id, &identity.user_id).await?;
    authorize_project_scope(
        &identity,
        thread.vlab_id.as_deref(),
        thread.project_id.as_deref(),
    )?;

    if let RateDecision::Limited {
        limit,
        remaining,
        reset_secs,
    } = state.limiter.check(&identity.user_id).await
    {
        return Err(ApiError::RateLimited {
            limit,
            remaining,
            reset_secs,
        });
    }

    let rx = state.executor.run_turn(&thread_id, &req.content);
    Ok(sse_stream(rx))
}
