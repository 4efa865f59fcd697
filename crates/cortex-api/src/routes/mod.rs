pub mod health;
pub mod messages;
pub mod threads;
pub mod turn;
pub mod validate;

use crate::middleware::logging;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/threads",
            post(threads::create_thread).get(threads::list_threads),
        )
        .route(
            "/threads/:thread_id",
            get(threads::get_thread)
                .patch(threads::rename_thread)
                .delete(threads::delete_thread),
        )
        .route("/threads/:thread_id/messages", get(messages::list_messages))
        .route("/threads/:thread_id/turn", post(turn::start_turn))
        .route(
            "/threads/:thread_id/messages/:tool_call_id/validate",
            post(validate::validate_tool_call),
        )
        .layer(middleware::from_fn(logging::log_request))
        .with_state(state)
}
