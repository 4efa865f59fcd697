use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use cortex_agent::PageParams;
use cortex_store::{EntityKind, SortDirection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    pub cursor: Option<String>,
    pub sort: Option<String>,
    #[serde(default)]
    pub vercel_format: bool,
    /// Comma-separated entity kinds for the plain listing.
    pub entity: Option<String>,
}

fn default_page_size() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub results: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub page_size: usize,
}

fn parse_cursor(cursor: Option<&str>) -> ApiResult<Option<DateTime<Utc>>> {
    match cursor {
        None => Ok(None),
        Some(raw) => raw
            .parse::<DateTime<Utc>>()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("invalid cursor timestamp: {}", raw))),
    }
}

fn parse_sort(sort: Option<&str>) -> ApiResult<SortDirection> {
    match sort {
        None | Some("desc") => Ok(SortDirection::Desc),
        Some("asc") => Ok(SortDirection::Asc),
        Some(other) => Err(ApiError::BadRequest(format!(
            "invalid sort direction: {}",
            other
        ))),
    }
}

fn parse_entities(entity: Option<&str>) -> ApiResult<Option<Vec<EntityKind>>> {
    let Some(raw) = entity else {
        return Ok(None);
    };
    let mut kinds = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = match name {
            "USER" => EntityKind::User,
            "AI_MESSAGE" => EntityKind::AiMessage,
            "AI_TOOL" => EntityKind::AiTool,
            "TOOL" => EntityKind::Tool,
            other => {
                return Err(ApiError::BadRequest(format!(
                    "unknown entity kind: {}",
                    other
                )))
            }
        };
        kinds.push(kind);
    }
    Ok(if kinds.is_empty() { None } else { Some(kinds) })
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Response> {
    let identity = state.require_identity(&headers).await?;
    state.owned_thread(&thread_id, &identity.user_id).await?;

    let page_size = query.page_size.clamp(1, 100);
    let cursor = parse_cursor(query.cursor.as_deref())?;

    if query.vercel_format {
        let page = state
            .projector
            .client_turns(&thread_id, page_size, cursor)
            .await?;
        return Ok(Json(PageResponse {
            results: page.results,
            has_more: page.has_more,
            next_cursor: page.next_cursor,
            page_size,
        })
        .into_response());
    }

    let page = state
        .projector
        .list(
            &thread_id,
            PageParams {
                page_size,
                cursor,
                sort: parse_sort(query.sort.as_deref())?,
                entities: parse_entities(query.entity.as_deref())?,
            },
        )
        .await?;

    Ok(Json(PageResponse {
        results: page.results,
        has_more: page.has_more,
        next_cursor: page.next_cursor,
        page_size,
    })
    .into_response())
}
