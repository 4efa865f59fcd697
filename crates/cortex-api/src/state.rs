use crate::auth::Authenticator;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::limits::RateLimiter;
use axum::http::HeaderMap;
use cortex_agent::{Projector, TurnExecutor};
use cortex_store::{MessageStore, Thread};
use std::sync::Arc;

/// Shared application state; every resource is an `Arc` so handlers clone
/// cheaply across tasks.
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn MessageStore>,
    pub executor: TurnExecutor,
    pub projector: Projector,
    pub authenticator: Arc<dyn Authenticator>,
    pub limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub async fn require_identity(
        &self,
        headers: &HeaderMap,
    ) -> ApiResult<crate::auth::UserIdentity> {
        self.authenticator
            .authenticate(headers)
            .await
            .ok_or(ApiError::Unauthorized)
    }

    /// Fetch a thread the caller is allowed to see. Threads belonging to
    /// someone else read as not-found, never as forbidden.
    pub async fn owned_thread(&self, thread_id: &str, user_id: &str) -> ApiResult<Thread> {
        let thread = self
            .store
            .get_thread(thread_id)
            .await?
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| ApiError::ThreadNotFound(thread_id.to_string()))?;
        Ok(thread)
    }
}
