use crate::auth::authorize_project_scope;
use crate::error::ApiResult;
use crate::routes::turn::sse_stream;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::sse::{Event, Sse},
    Json,
};
use cortex_agent::Verdict;
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationAction {
    Accepted,
    Rejected,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub validation: ValidationAction,
    /// Edited arguments; when present they replace the model's.
    #[serde(default)]
    pub args: Option<String>,
    /// Rejection feedback surfaced to the model as the tool's result.
    #[serde(default)]
    pub feedback: Option<String>,
}

pub async fn validate_tool_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((thread_id, tool_call_id)): Path<(String, String)>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let identity = state.require_identity(&headers).await?;
    let thread = state.owned_thread(&thread_id, &identity.user_id).await?;
    authorize_project_scope(
        &identity,
        thread.vlab_id.as_deref(),
        thread.project_id.as_deref(),
    )?;

    let verdict = match req.validation {
        ValidationAction::Accepted => Verdict::Approved {
            arguments: req.args,
        },
        ValidationAction::Rejected => Verdict::Rejected {
            feedback: req.feedback,
        },
    };

    let rx = state
        .executor
        .validate_tool_call(&thread_id, &tool_call_id, verdict)
        .await?;

    Ok(sse_stream(rx))
}
