pub mod message;
pub mod thread;

pub use message::{EntityKind, Message, MessageContent, MessagePatch, NewMessage, ToolCall};
pub use thread::Thread;
