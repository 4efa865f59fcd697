pub mod error;
pub mod memory;
pub mod models;
pub mod store;

#[cfg(feature = "mongodb")]
pub mod mongo;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use models::{
    EntityKind, Message, MessageContent, MessagePatch, NewMessage, Thread, ToolCall,
};
pub use store::{Bound, MessageStore, PageQuery, SortDirection, TimeWindow};

#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;
