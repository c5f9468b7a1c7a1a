//! Core data models for the advisory coordinator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

//
// ================= Messages =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// A named tool invocation requested by a model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}

/// One turn of dialogue. Never mutated once appended to a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Text payload produced by one tool call, linked back to its request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn into_message(self) -> Message {
        Message {
            role: Role::Tool,
            content: self.content,
            tool_calls: Vec::new(),
            tool_call_id: Some(self.call_id),
            tool_name: Some(self.tool_name),
        }
    }
}

//
// ================= Evaluation =================
//

/// Structured judgment emitted by the evaluator model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EvaluatorVerdict {
    pub feedback: String,
    pub success_criteria_met: bool,
    pub user_input_needed: bool,
    #[serde(default)]
    pub next_agent: Option<String>,
}

//
// ================= Turn Output =================
//

/// Coordinator phases. `Worker` is initial, `Done` terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Worker,
    Tools,
    Evaluator,
    Done,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The evaluator accepted the reply
    Succeeded,
    /// The evaluator asked for clarification from the user
    NeedsUserInput,
    /// An iteration guard tripped; reported as needing user input
    Incomplete,
}

/// One entry of the reply list handed back to the chat surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyEvent {
    pub role: Role,
    pub content: String,
}

impl ReplyEvent {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub outcome: TurnOutcome,
    pub reply: Option<String>,
    pub feedback: Option<String>,
    pub success_criteria_met: bool,
    pub user_input_needed: bool,
    pub evaluations: u32,
    pub worker_steps: u32,
    pub phases: Vec<Phase>,
    pub events: Vec<ReplyEvent>,
    pub completed_at: DateTime<Utc>,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
            Role::Tool => "Tool",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Worker => "WORKER",
            Phase::Tools => "TOOLS",
            Phase::Evaluator => "EVALUATOR",
            Phase::Done => "DONE",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_rejects_extra_fields() {
        let raw = json!({
            "feedback": "ok",
            "success_criteria_met": true,
            "user_input_needed": false,
            "score": 9
        });
        assert!(serde_json::from_value::<EvaluatorVerdict>(raw).is_err());
    }

    #[test]
    fn test_verdict_next_agent_optional() {
        let raw = json!({
            "feedback": "needs a tax view",
            "success_criteria_met": false,
            "user_input_needed": false
        });
        let verdict: EvaluatorVerdict = serde_json::from_value(raw).unwrap();
        assert_eq!(verdict.next_agent, None);
    }

    #[test]
    fn test_tool_result_links_call() {
        let call = ToolCallRequest::new("get_client_profile", json!({"client_id": "12345"}));
        let message = ToolResult {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: "profile".to_string(),
            is_error: false,
        }
        .into_message();

        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some(call.id.as_str()));
        assert_eq!(message.tool_name.as_deref(), Some("get_client_profile"));
    }
}
