use axum::{
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use cortex_agent::AgentError;
use cortex_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing or invalid credentials")]
    Unauthorized,

    #[error("Insufficient scope: {0}")]
    Forbidden(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Tool call not found: {0}")]
    ToolCallNotFound(String),

    #[error("Tool call already resolved: {0}")]
    ToolCallAlreadyResolved(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded")]
    RateLimited {
        limit: u32,
        remaining: u32,
        reset_secs: u64,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::ThreadNotFound(id) => ApiError::ThreadNotFound(id),
            AgentError::ToolCallNotFound(id) => ApiError::ToolCallNotFound(id),
            AgentError::ToolCallAlreadyResolved(id) => ApiError::ToolCallAlreadyResolved(id),
            AgentError::Store(e) => ApiError::Store(e),
            AgentError::Other(e) => ApiError::Internal(e),
        }
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::ThreadNotFound(_) | ApiError::ToolCallNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ApiError::ToolCallAlreadyResolved(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            ApiError::Store(StoreError::ThreadNotFound(_))
            | ApiError::Store(StoreError::MessageNotFound(_))
            | ApiError::Store(StoreError::ToolCallNotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            ApiError::Store(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("storage error: {}", e);
                "Storage error".to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        let mut response = (status, body).into_response();

        if let ApiError::RateLimited {
            limit,
            remaining,
            reset_secs,
        } = self
        {
            let headers = response.headers_mut();
            for (name, value) in [
                ("x-ratelimit-limit", limit.to_string()),
                ("x-ratelimit-remaining", remaining.to_string()),
                ("x-ratelimit-reset", reset_secs.to_string()),
            ] {
                if let (Ok(name), Ok(value)) = (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(&value),
                ) {
                    headers.insert(name, value);
                }
            }
        }

        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
