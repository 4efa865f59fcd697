use crate::capability::ToolCapability;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

pub type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;
pub type HealthProbe = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Data-driven tool record: name, schema, approval flag and an invocation
/// closure. Discovered tools (e.g. from a remote catalog) become descriptors
/// at connect time; no runtime type synthesis involved.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    display_name: String,
    description: String,
    input_schema: Value,
    requires_approval: bool,
    handler: ToolHandler,
    health: Option<HealthProbe>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: ToolHandler,
    ) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: description.into(),
            input_schema,
            requires_approval: false,
            handler,
            health: None,
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn requires_approval(mut self, required: bool) -> Self {
        self.requires_approval = required;
        self
    }

    pub fn health_probe(mut self, probe: HealthProbe) -> Self {
        self.health = Some(probe);
        self
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("requires_approval", &self.requires_approval)
            .finish()
    }
}

#[async_trait]
impl ToolCapability for ToolDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    fn requires_approval(&self) -> bool {
        self.requires_approval
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        (self.handler)(arguments).await
    }

    async fn is_online(&self) -> bool {
        match &self.health {
            Some(probe) => probe().await,
            None => true,
        }
    }
}
