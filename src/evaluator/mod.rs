//! Evaluator step
//!
//! Judges the conversation so far against the turn's success criteria with a
//! second, independent model call. The verdict only updates `TurnState`; it
//! never appends a message to the conversation.

use crate::conversation::{Conversation, TurnState};
use crate::error::CoordinatorError;
use crate::llm::{complete_with_deadline, ChatModel, ModelRequest, ResponseFormat};
use crate::models::{EvaluatorVerdict, Message, Role};
use crate::tools::{ParamType, ToolSchema};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct Evaluator {
    model: Arc<dyn ChatModel>,
    call_timeout: Duration,
}

impl Evaluator {
    pub fn new(model: Arc<dyn ChatModel>, call_timeout: Duration) -> Self {
        Self {
            model,
            call_timeout,
        }
    }

    pub async fn evaluate(&self, state: &TurnState) -> Result<EvaluatorVerdict> {
        let prompt = judgment_prompt(&state.success_criteria, &render_transcript(&state.conversation));

        let request = ModelRequest::new(None, vec![Message::user(prompt)])
            .with_format(ResponseFormat::Json(verdict_schema()));

        let reply = complete_with_deadline(self.model.as_ref(), request, self.call_timeout, "evaluator").await?;
        let verdict = parse_verdict(&reply.content)?;

        info!(
            success_criteria_met = verdict.success_criteria_met,
            user_input_needed = verdict.user_input_needed,
            next_agent = ?verdict.next_agent,
            "Evaluator verdict"
        );

        Ok(verdict)
    }
}

/// Flatten the conversation to one line per message, tagged by role
pub fn render_transcript(conversation: &Conversation) -> String {
    conversation
        .messages()
        .iter()
        .map(render_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_line(message: &Message) -> String {
    match message.role {
        Role::Tool => format!(
            "Tool ({}): {}",
            message.tool_name.as_deref().unwrap_or("unknown"),
            message.content
        ),
        Role::Assistant if message.content.trim().is_empty() && message.has_tool_calls() => {
            let names: Vec<_> = message.tool_calls.iter().map(|c| c.name.as_str()).collect();
            format!("Assistant: [requested tools: {}]", names.join(", "))
        }
        role => format!("{}: {}", role, message.content),
    }
}

fn judgment_prompt(success_criteria: &str, transcript: &str) -> String {
    format!(
        r#"You are an evaluator for the Financial Consultant AI system.

Review the following conversation and determine if the success criteria have been met.

Success Criteria:
{success_criteria}

Conversation:
{transcript}

Evaluate whether:
1. The assistant's response fully addresses the user's request
2. All success criteria are met
3. The response is complete and actionable
4. Any specialized agents were appropriately used
5. The response provides value to the financial advisor

Provide structured feedback on the response quality and whether success criteria are met.
If the response is incomplete, suggest which agent or tool should be used next.

Respond with ONLY a JSON object with exactly these fields:
{{"feedback": string, "success_criteria_met": boolean, "user_input_needed": boolean, "next_agent": string or null}}"#
    )
}

/// Shape the evaluator model is constrained to emit
pub fn verdict_schema() -> ToolSchema {
    ToolSchema::new()
        .required("feedback", ParamType::String, "Feedback on the assistant's response")
        .required("success_criteria_met", ParamType::Boolean, "Whether the success criteria have been met")
        .required(
            "user_input_needed",
            ParamType::Boolean,
            "True if more input is needed from the user, clarifications, or if the assistant is stuck",
        )
        .optional("next_agent", ParamType::String, "Suggested next agent to involve if the workflow should continue")
}

/// Strict parse: exactly the verdict fields, optionally inside a ```json fence
pub fn parse_verdict(raw: &str) -> Result<EvaluatorVerdict> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    debug!(len = cleaned.len(), "Parsing evaluator verdict");

    serde_json::from_str::<EvaluatorVerdict>(cleaned)
        .map(|mut verdict| {
            verdict.next_agent = verdict.next_agent.filter(|a| !a.trim().is_empty());
            verdict
        })
        .map_err(|e| CoordinatorError::MalformedVerdict(format!("{} | raw={}", e, raw)))
}
