//! Delegation tool that hands a task to a named specialist agent

use super::{ParamType, Tool, ToolSchema};
use crate::agents::AgentRoster;
use crate::error::CoordinatorError;
use crate::Result;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

pub const CONSULT_SPECIALIST: &str = "consult_specialist";

/// Registered only in the coordinator's registry. Specialists run against
/// the plain advisory registry, so they cannot delegate further.
pub struct ConsultSpecialistTool {
    roster: Arc<AgentRoster>,
}

impl ConsultSpecialistTool {
    pub fn new(roster: Arc<AgentRoster>) -> Self {
        Self { roster }
    }
}

#[async_trait::async_trait]
impl Tool for ConsultSpecialistTool {
    fn name(&self) -> &'static str {
        CONSULT_SPECIALIST
    }

    fn description(&self) -> &'static str {
        "Delegate a focused task to a specialist agent (portfolio_architect, investment_research, risk_analytics, tax_optimization, transition_planning, reporting_communication, account_operations) and return its answer"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("agent", ParamType::String, "Specialist key, e.g. risk_analytics")
            .required("task", ParamType::String, "What the specialist should do")
            .optional("context", ParamType::Object, "Structured context such as client or portfolio ids")
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String> {
        let agent = arguments
            .get("agent")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let task = arguments
            .get("task")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let context = arguments.get("context").filter(|v| !v.is_null());

        info!(agent, "Consulting specialist");

        match self.roster.route(agent, task, context).await {
            Ok(answer) => Ok(answer),
            Err(e @ CoordinatorError::UnknownAgent(_)) => Err(e),
            Err(e) => Err(CoordinatorError::ToolError(format!(
                "specialist '{}' failed: {}",
                agent, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::builtin_profiles;
    use crate::execution::ExecutionEngine;
    use crate::llm::{ModelReply, ScriptedModel};
    use crate::tools::{create_default_registry, ToolRegistry};
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::assert_err;

    fn registry_with(model: Arc<ScriptedModel>) -> ToolRegistry {
        let base = Arc::new(create_default_registry(None));
        let engine = Arc::new(ExecutionEngine::new(base.clone(), Duration::from_secs(5)));
        let roster = Arc::new(AgentRoster::from_profiles(
            builtin_profiles(),
            model,
            engine,
            Duration::from_secs(5),
        ));

        let mut registry = (*base).clone();
        registry.register(Arc::new(ConsultSpecialistTool::new(roster)));
        registry
    }

    #[tokio::test]
    async fn test_delegates_to_named_specialist() {
        let model = Arc::new(ScriptedModel::new(vec![ModelReply::text(
            "Portfolio beta is 1.08; VaR(95%) is 4.2%.",
        )]));
        let registry = registry_with(model.clone());

        let answer = registry
            .invoke(
                CONSULT_SPECIALIST,
                &json!({"agent": "risk_analytics", "task": "Assess PORT-001", "context": "{\"portfolio_id\": \"PORT-001\"}"}),
            )
            .await
            .unwrap();

        assert!(answer.contains("VaR"));
        let requests = model.requests();
        let system = requests[0].system.as_deref().unwrap();
        assert!(system.starts_with("You are the Risk Analytics Agent"));
        assert!(requests[0].tools.iter().all(|t| t.name != CONSULT_SPECIALIST));
    }

    #[tokio::test]
    async fn test_unknown_agent_is_tool_level() {
        let registry = registry_with(Arc::new(ScriptedModel::default()));
        let err = registry
            .invoke(CONSULT_SPECIALIST, &json!({"agent": "fortune_teller", "task": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::UnknownAgent(_)));
        assert!(err.is_tool_level());
    }

    #[tokio::test]
    async fn test_specialist_failure_becomes_tool_error() {
        let registry = registry_with(Arc::new(ScriptedModel::default()));
        let result = registry
            .invoke(CONSULT_SPECIALIST, &json!({"agent": "tax_optimization", "task": "harvest"}))
            .await;
        let err = assert_err!(result);
        assert!(matches!(err, CoordinatorError::ToolError(_)));
    }
}
