//! Tool batch execution
//!
//! Dispatches every pending tool call of one model message through the
//! registry. Sibling calls run concurrently; results come back in the order
//! the calls were requested.

use crate::error::CoordinatorError;
use crate::models::{ToolCallRequest, ToolResult};
use crate::tools::{ToolDescriptor, ToolRegistry};
use crate::Result;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum calls honoured from a single message; the rest get error results
pub const MAX_CALLS_PER_BATCH: usize = 16;

pub struct ExecutionEngine {
    tool_registry: Arc<ToolRegistry>,
    call_timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(tool_registry: Arc<ToolRegistry>, call_timeout: Duration) -> Self {
        Self {
            tool_registry,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tool_registry.list_schemas()
    }

    /// Execute a batch, producing exactly one result per call in request order.
    ///
    /// Tool-level failures become error results. A call exceeding the
    /// per-call deadline fails the whole batch with `TurnTimeout`.
    pub async fn execute_batch(&self, calls: &[ToolCallRequest]) -> Result<Vec<ToolResult>> {
        debug!(call_count = calls.len(), "Starting tool batch");

        let outcomes = join_all(
            calls
                .iter()
                .enumerate()
                .map(|(index, call)| self.execute_one(index, call)),
        )
        .await;

        outcomes.into_iter().collect()
    }

    async fn execute_one(&self, index: usize, call: &ToolCallRequest) -> Result<ToolResult> {
        if index >= MAX_CALLS_PER_BATCH {
            warn!(tool_name = %call.name, index, "Tool call beyond batch limit skipped");
            return Ok(error_result(
                call,
                &format!("skipped: a single message may request at most {} tool calls", MAX_CALLS_PER_BATCH),
            ));
        }

        let start = Instant::now();
        let invocation = self.tool_registry.invoke(&call.name, &call.arguments);

        let outcome = match tokio::time::timeout(self.call_timeout, invocation).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(tool_name = %call.name, "Tool call exceeded deadline");
                return Err(CoordinatorError::TurnTimeout(format!(
                    "tool '{}' exceeded {}s",
                    call.name,
                    self.call_timeout.as_secs_f32()
                )));
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(content) => {
                debug!(tool_name = %call.name, elapsed_ms, "Tool call succeeded");
                Ok(ToolResult {
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    content,
                    is_error: false,
                })
            }
            // Transport or serialization faults inside a tool stay local as well.
            Err(e) => {
                warn!(
                    tool_name = %call.name,
                    error = %e,
                    tool_level = e.is_tool_level(),
                    elapsed_ms,
                    "Tool call failed"
                );
                Ok(error_result(call, &e.to_string()))
            }
        }
    }
}

fn error_result(call: &ToolCallRequest, description: &str) -> ToolResult {
    ToolResult {
        call_id: call.id.clone(),
        tool_name: call.name.clone(),
        content: format!("Error: {}", description),
        is_error: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{create_default_registry, ParamType, Tool, ToolSchema};
    use serde_json::{json, Map, Value};

    /// Sleeps for `delay_ms` before echoing its label
    struct DelayTool;

    #[async_trait::async_trait]
    impl Tool for DelayTool {
        fn name(&self) -> &'static str {
            "delay"
        }

        fn description(&self) -> &'static str {
            "Sleep then echo"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema::new()
                .required("label", ParamType::String, "Echoed label")
                .required("delay_ms", ParamType::Integer, "Delay")
        }

        async fn execute(&self, arguments: &Map<String, Value>) -> Result<String> {
            let delay = arguments["delay_ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(arguments["label"].as_str().unwrap_or_default().to_string())
        }
    }

    fn engine(timeout: Duration) -> ExecutionEngine {
        let mut registry = create_default_registry(None);
        registry.register(Arc::new(DelayTool));
        ExecutionEngine::new(Arc::new(registry), timeout)
    }

    #[tokio::test]
    async fn test_results_follow_request_order() {
        let engine = engine(Duration::from_secs(5));
        let calls: Vec<_> = [("first", 120), ("second", 10), ("third", 60)]
            .iter()
            .map(|(label, delay)| ToolCallRequest::new("delay", json!({"label": label, "delay_ms": delay})))
            .collect();

        let results = engine.execute_batch(&calls).await.unwrap();

        let labels: Vec<_> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(labels, vec!["first", "second", "third"]);
        for (call, result) in calls.iter().zip(&results) {
            assert_eq!(call.id, result.call_id);
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_encoded_as_result() {
        let engine = engine(Duration::from_secs(5));
        let calls = vec![
            ToolCallRequest::new("nonexistent_tool", json!({})),
            ToolCallRequest::new("get_client_profile", json!({"client_id": "12345"})),
        ];

        let results = engine.execute_batch(&calls).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_error);
        assert!(results[0].content.contains("Unknown tool: nonexistent_tool"));
        assert!(!results[1].is_error);
    }

    #[tokio::test]
    async fn test_call_deadline_is_turn_timeout() {
        let engine = engine(Duration::from_millis(20));
        let calls = vec![ToolCallRequest::new("delay", json!({"label": "slow", "delay_ms": 400}))];

        let err = engine.execute_batch(&calls).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::TurnTimeout(_)));
    }

    #[tokio::test]
    async fn test_batch_limit_still_answers_every_call() {
        let engine = engine(Duration::from_secs(5));
        let calls: Vec<_> = (0..MAX_CALLS_PER_BATCH + 2)
            .map(|i| ToolCallRequest::new("get_portfolio_data", json!({"portfolio_id": format!("P{}", i)})))
            .collect();

        let results = engine.execute_batch(&calls).await.unwrap();

        assert_eq!(results.len(), calls.len());
        assert!(results[MAX_CALLS_PER_BATCH].is_error);
        assert!(!results[MAX_CALLS_PER_BATCH - 1].is_error);
    }
}
