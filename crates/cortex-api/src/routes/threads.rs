use crate::auth::authorize_project_scope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use cortex_store::Thread;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateThreadRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub vlab_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlab_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Thread> for ThreadResponse {
    fn from(t: Thread) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            vlab_id: t.vlab_id,
            project_id: t.project_id,
            title: t.title,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListThreadsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct ListThreadsResponse {
    pub threads: Vec<ThreadResponse>,
}

pub async fn create_thread(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateThreadRequest>,
) -> ApiResult<(StatusCode, Json<ThreadResponse>)> {
    let identity = state.require_identity(&headers).await?;
    authorize_project_scope(&identity, req.vlab_id.as_deref(), req.project_id.as_deref())?;

    let thread = state
        .store
        .create_thread(Thread::new(
            identity.user_id,
            req.vlab_id,
            req.project_id,
            req.title,
        ))
        .await?;

    Ok((StatusCode::CREATED, Json(thread.into())))
}

pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListThreadsQuery>,
) -> ApiResult<Json<ListThreadsResponse>> {
    let identity = state.require_identity(&headers).await?;
    let limit = query.limit.min(100);

    let threads = state.store.list_threads(&identity.user_id, limit).await?;

    Ok(Json(ListThreadsResponse {
        threads: threads.into_iter().map(ThreadResponse::from).collect(),
    }))
}

pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<ThreadResponse>> {
    let identity = state.require_identity(&headers).await?;
    let thread = state.owned_thread(&thread_id, &identity.user_id).await?;
    Ok(Json(thread.into()))
}

#[derive(Debug, Deserialize)]
pub struct RenameThreadRequest {
    pub title: String,
}

pub async fn rename_thread(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
    Json(req): Json<RenameThreadRequest>,
) -> ApiResult<Json<ThreadResponse>> {
    let identity = state.require_identity(&headers).await?;
    let thread = state.owned_thread(&thread_id, &identity.user_id).await?;
    authorize_project_scope(
        &identity,
        thread.vlab_id.as_deref(),
        thread.project_id.as_deref(),
    )?;

    state.store.rename_thread(&thread_id, &req.title).await?;
    let thread = state.owned_thread(&thread_id, &identity.user_id).await?;
    Ok(Json(thread.into()))
}

pub async fn delete_thread(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
) -> ApiResult<StatusCode> {
    let identity = state.require_identity(&headers).await?;
    let thread = state.owned_thread(&thread_id, &identity.user_id).await?;
    authorize_project_scope(
        &identity,
        thread.vlab_id.as_deref(),
        thread.project_id.as_deref(),
    )?;

    state.store.delete_thread(&thread_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
