//! Tool trait and registry
//!
//! Tools are invoked by name with a JSON argument object and return text.
//! Arguments are validated against the tool's declared schema before dispatch.

use crate::error::CoordinatorError;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub mod advisory;
pub mod schema;
pub mod specialist;

pub use advisory::{create_default_registry, FinancialApiClient};
pub use schema::{ParamSpec, ParamType, ToolSchema};
pub use specialist::{ConsultSpecialistTool, CONSULT_SPECIALIST};

/// Trait for a single named tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> ToolSchema;

    /// Run with arguments that already passed schema validation
    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String>;
}

/// What a model sees about a tool when deciding to call it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameter_schema: ToolSchema,
}

/// Tool registry for looking up and invoking tools.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn list_schemas(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameter_schema: tool.schema(),
            })
            .collect()
    }

    /// Invoke `name`. Fails with `UnknownTool` or `InvalidArguments` before the
    /// tool runs; runtime failures inside the tool come back as `ToolError`.
    pub async fn invoke(&self, name: &str, arguments: &Value) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| CoordinatorError::UnknownTool(name.to_string()))?;

        let validated = tool.schema().validate(name, arguments)?;

        debug!(tool_name = %name, "Invoking tool");

        tool.execute(&validated).await
    }
}
