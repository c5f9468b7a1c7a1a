//! Chat model abstraction
//!
//! Agents, the coordinator's worker step and the evaluator all talk to a
//! model through `ChatModel`. One client is built at startup and injected
//! everywhere it is needed.

use crate::error::CoordinatorError;
use crate::models::{Message, ToolCallRequest};
use crate::tools::{ToolDescriptor, ToolSchema};
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Output constraint for a model call
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    /// JSON object with exactly these fields
    Json(ToolSchema),
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
    pub response_format: ResponseFormat,
}

impl ModelRequest {
    pub fn new(system: Option<String>, messages: Vec<Message>) -> Self {
        Self {
            system,
            messages,
            tools: Vec::new(),
            response_format: ResponseFormat::Text,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.tool_calls.is_empty()
    }

    pub fn into_message(self) -> Message {
        Message::assistant_with_tools(self.content, self.tool_calls)
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, request: ModelRequest) -> Result<ModelReply>;
}

/// Run one model call under a deadline. Errors are reported as agent failures
/// tagged with `stage`; an expired deadline is a `TurnTimeout`.
pub async fn complete_with_deadline(
    model: &dyn ChatModel,
    request: ModelRequest,
    deadline: Duration,
    stage: &str,
) -> Result<ModelReply> {
    match tokio::time::timeout(deadline, model.complete(request)).await {
        Ok(result) => result.map_err(|e| e.into_agent_failure(stage)),
        Err(_) => Err(CoordinatorError::TurnTimeout(format!(
            "{} model call exceeded {}s",
            stage,
            deadline.as_secs_f32()
        ))),
    }
}

/// Model that replays queued replies and records every request.
///
/// Used by the offline demo binary and by tests.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: Result<ModelReply>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelReply> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        self.replies
            .lock()
            .map_err(|_| CoordinatorError::AgentFailure("scripted model poisoned".to_string()))?
            .pop_front()
            .unwrap_or_else(|| {
                Err(CoordinatorError::AgentFailure(
                    "scripted model has no replies left".to_string(),
                ))
            })
    }
}
