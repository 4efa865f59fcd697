pub mod capability;
pub mod descriptor;
pub mod registry;

pub use capability::ToolCapability;
pub use descriptor::{ToolDescriptor, ToolHandler};
pub use registry::{execute_with_timeout, ToolFactory, ToolRegistry};
