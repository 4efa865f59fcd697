use crate::capability::ToolCapability;
use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Builds a batch of capabilities; re-run on [`ToolRegistry::refresh`].
pub type ToolFactory = Arc<dyn Fn() -> Vec<Arc<dyn ToolCapability>> + Send + Sync>;

/// Process-lifetime registry of tool capabilities, ordered by name.
///
/// Owned by the application's startup routine. Rebuilding the catalog is an
/// explicit `refresh()`, never an implicit side effect of reloads.
pub struct ToolRegistry {
    factories: RwLock<Vec<ToolFactory>>,
    tools: RwLock<BTreeMap<String, Arc<dyn ToolCapability>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(Vec::new()),
            tools: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a factory and immediately add its tools.
    pub async fn add_factory(&self, factory: ToolFactory) {
        let produced = factory();
        self.factories.write().await.push(factory);

        let mut tools = self.tools.write().await;
        for tool in produced {
            tools.insert(tool.name().to_string(), tool);
        }
    }

    /// Register a single capability directly.
    pub async fn add_tool(&self, tool: Arc<dyn ToolCapability>) {
        self.tools
            .write()
            .await
            .insert(tool.name().to_string(), tool);
    }

    /// Rebuild the whole catalog from the registered factories.
    pub async fn refresh(&self) {
        let factories = self.factories.read().await;
        let mut rebuilt: BTreeMap<String, Arc<dyn ToolCapability>> = BTreeMap::new();
        for factory in factories.iter() {
            for tool in factory() {
                rebuilt.insert(tool.name().to_string(), tool);
            }
        }
        let count = rebuilt.len();
        *self.tools.write().await = rebuilt;
        tracing::info!(tools = count, "tool registry refreshed");
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn ToolCapability>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn list(&self) -> Vec<Arc<dyn ToolCapability>> {
        self.tools.read().await.values().cloned().collect()
    }

    /// Select the tools offered to the model for one turn.
    ///
    /// Deterministic for the same catalog and inputs: filter by the
    /// allow-list regex (full name match), then cap the count in name order.
    pub async fn select(
        &self,
        allowlist: Option<&Regex>,
        cap: usize,
    ) -> Vec<Arc<dyn ToolCapability>> {
        self.tools
            .read()
            .await
            .values()
            .filter(|tool| match allowlist {
                Some(re) => re.is_match(tool.name()),
                None => true,
            })
            .take(cap)
            .cloned()
            .collect()
    }

    /// Advisory per-tool health snapshot for client display.
    pub async fn health_report(&self) -> Vec<(String, bool)> {
        let tools = self.list().await;
        let mut report = Vec::with_capacity(tools.len());
        for tool in tools {
            report.push((tool.name().to_string(), tool.is_online().await));
        }
        report
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a tool under a deadline. A timeout is a tool failure, not a turn
/// failure; callers fold the error into the tool's result payload.
pub async fn execute_with_timeout(
    tool: &Arc<dyn ToolCapability>,
    arguments: Value,
    timeout: Duration,
) -> Result<Value> {
    match tokio::time::timeout(timeout, tool.execute(arguments)).await {
        Ok(result) => result,
        Err(_) => anyhow::bail!(
            "tool '{}' timed out after {}s",
            tool.name(),
            timeout.as_secs()
        ),
    }
}
