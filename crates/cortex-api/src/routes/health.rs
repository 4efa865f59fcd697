use crate::error::ApiResult;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Advisory per-tool availability; informational only.
    pub tools: HashMap<String, String>,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let mut tools = HashMap::new();
    for (name, online) in state.executor.registry().health_report().await {
        let status = if online { "online" } else { "offline" };
        tools.insert(name, status.to_string());
    }

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tools,
    }))
}
