use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Tool call not found: {0}")]
    ToolCallNotFound(String),

    #[error("Tool call already resolved: {0}")]
    ToolCallAlreadyResolved(String),

    #[error(transparent)]
    Store(#[from] cortex_store::StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
