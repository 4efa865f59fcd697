pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod history;
pub mod projector;
pub mod reconciler;
pub mod storage;
pub mod validation;

pub use config::AgentConfig;
pub use error::AgentError;
pub use events::{RequestStatus, TurnEvent};
pub use executor::TurnExecutor;
pub use projector::{
    ApprovalStatus, ClientTurn, InvocationState, MessageView, Page, PageParams, Projector,
    ToolCallView, TurnPart, TurnRole,
};
pub use storage::ObjectStorage;
pub use validation::Verdict;
