//! Conversation storage and per-turn coordinator state

use crate::models::{EvaluatorVerdict, Message, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Criteria applied when the caller supplies none
pub const DEFAULT_SUCCESS_CRITERIA: &str = "The assistant should provide a complete, accurate, and actionable response to the advisor's request, using appropriate specialized agents and tools as needed.";

/// Context key holding the evaluator's most recent routing suggestion
pub const SUGGESTED_NEXT_AGENT: &str = "suggested_next_agent";

/// Ordered, append-only message log owned by a single session
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Last assistant message with visible text at or after `from`
    pub fn last_assistant_reply(&self, from: usize) -> Option<&Message> {
        self.messages
            .iter()
            .skip(from)
            .rev()
            .find(|m| m.role == Role::Assistant && !m.content.trim().is_empty())
    }
}

impl FromIterator<Message> for Conversation {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

/// Mutable record threaded through one coordinator run
#[derive(Debug, Clone)]
pub struct TurnState {
    pub conversation: Conversation,
    pub success_criteria: String,
    pub feedback_on_work: Option<String>,
    pub success_criteria_met: bool,
    pub user_input_needed: bool,
    pub agent_context: BTreeMap<String, Value>,
    turn_start: usize,
}

impl TurnState {
    /// Start a turn on top of `history`: appends the user message and applies
    /// the default criteria when none (or only whitespace) is supplied.
    pub fn begin(history: Conversation, message: &str, success_criteria: Option<&str>) -> Self {
        let success_criteria = success_criteria
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_SUCCESS_CRITERIA)
            .to_string();

        let turn_start = history.len();
        let mut conversation = history;
        conversation.push(Message::user(message));

        Self {
            conversation,
            success_criteria,
            feedback_on_work: None,
            success_criteria_met: false,
            user_input_needed: false,
            agent_context: BTreeMap::new(),
            turn_start,
        }
    }

    /// Index of this turn's user message
    pub fn turn_start(&self) -> usize {
        self.turn_start
    }

    /// Messages appended during this turn, user message included
    pub fn turn_messages(&self) -> &[Message] {
        &self.conversation.messages()[self.turn_start..]
    }

    pub fn user_message(&self) -> Option<&Message> {
        self.conversation.messages().get(self.turn_start)
    }

    /// Fold an evaluator verdict into the state. Context entries accumulate.
    pub fn apply_verdict(&mut self, verdict: &EvaluatorVerdict) {
        self.feedback_on_work = Some(verdict.feedback.clone());
        self.success_criteria_met = verdict.success_criteria_met;
        self.user_input_needed = verdict.user_input_needed;
        self.agent_context.insert(
            SUGGESTED_NEXT_AGENT.to_string(),
            verdict
                .next_agent
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
    }

    pub fn is_terminal(&self) -> bool {
        self.success_criteria_met || self.user_input_needed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_applies_default_criteria() {
        let state = TurnState::begin(Conversation::new(), "hello", Some("   "));
        assert_eq!(state.success_criteria, DEFAULT_SUCCESS_CRITERIA);
        assert_eq!(state.conversation.len(), 1);
        assert_eq!(state.turn_start(), 0);
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_begin_keeps_history_prefix() {
        let history: Conversation = vec![Message::user("first"), Message::assistant("answer")]
            .into_iter()
            .collect();
        let state = TurnState::begin(history, "second", Some("cite a client id"));

        assert_eq!(state.turn_start(), 2);
        assert_eq!(state.turn_messages().len(), 1);
        assert_eq!(state.user_message().unwrap().content, "second");
        assert_eq!(state.success_criteria, "cite a client id");
    }

    #[test]
    fn test_apply_verdict_accumulates_context() {
        let mut state = TurnState::begin(Conversation::new(), "hi", None);
        state
            .agent_context
            .insert("client_id".to_string(), Value::String("12345".into()));

        state.apply_verdict(&EvaluatorVerdict {
            feedback: "add tax view".to_string(),
            success_criteria_met: false,
            user_input_needed: false,
            next_agent: Some("tax_optimization".to_string()),
        });

        assert_eq!(state.feedback_on_work.as_deref(), Some("add tax view"));
        assert_eq!(state.agent_context.len(), 2);
        assert_eq!(
            state.agent_context[SUGGESTED_NEXT_AGENT],
            Value::String("tax_optimization".into())
        );
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_last_assistant_reply_skips_tool_requests() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("q"));
        conversation.push(Message::assistant("final"));
        conversation.push(Message::assistant_with_tools("", vec![]));

        let reply = conversation.last_assistant_reply(0).unwrap();
        assert_eq!(reply.content, "final");
        assert!(conversation.last_assistant_reply(2).is_none());
    }
}
