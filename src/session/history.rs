//! Adapters between the conversation and chat-surface history formats
//!
//! Surfaces either send flat `{role, content}` entries or `[user, bot]`
//! pairs. A bot message with no preceding user message becomes `("", bot)`
//! and a trailing user message with no reply becomes `(user, "")`.

use crate::conversation::Conversation;
use crate::models::{Message, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One rendered row of a paired chat view. Serialized as a two-element array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct ChatPair {
    pub user: String,
    pub bot: String,
}

impl ChatPair {
    pub fn new(user: impl Into<String>, bot: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            bot: bot.into(),
        }
    }
}

impl From<(String, String)> for ChatPair {
    fn from((user, bot): (String, String)) -> Self {
        Self { user, bot }
    }
}

impl From<ChatPair> for (String, String) {
    fn from(pair: ChatPair) -> Self {
        (pair.user, pair.bot)
    }
}

/// Flatten pairs, dropping empty halves
pub fn pairs_to_entries(pairs: &[ChatPair]) -> Vec<HistoryEntry> {
    let mut entries = Vec::with_capacity(pairs.len() * 2);
    for pair in pairs {
        if !pair.user.is_empty() {
            entries.push(HistoryEntry::new(Role::User, pair.user.clone()));
        }
        if !pair.bot.is_empty() {
            entries.push(HistoryEntry::new(Role::Assistant, pair.bot.clone()));
        }
    }
    entries
}

/// Re-pair flat entries. System entries render on the bot side; tool
/// entries are not shown.
pub fn entries_to_pairs(entries: &[HistoryEntry]) -> Vec<ChatPair> {
    let mut pairs = Vec::new();
    let mut pending_user: Option<String> = None;

    for entry in entries {
        match entry.role {
            Role::User => {
                if let Some(previous) = pending_user.replace(entry.content.clone()) {
                    pairs.push(ChatPair::new(previous, ""));
                }
            }
            Role::Assistant | Role::System => {
                let user = pending_user.take().unwrap_or_default();
                pairs.push(ChatPair::new(user, entry.content.clone()));
            }
            Role::Tool => {}
        }
    }

    if let Some(user) = pending_user {
        pairs.push(ChatPair::new(user, ""));
    }

    pairs
}

pub fn entries_to_conversation(entries: &[HistoryEntry]) -> Conversation {
    entries
        .iter()
        .filter_map(|entry| match entry.role {
            Role::User => Some(Message::user(entry.content.clone())),
            Role::Assistant => Some(Message::assistant(entry.content.clone())),
            Role::System => Some(Message::system(entry.content.clone())),
            Role::Tool => None,
        })
        .collect()
}

/// Visible text messages only: tool traffic and tool-call-only assistant
/// messages are skipped
pub fn conversation_to_entries(conversation: &Conversation) -> Vec<HistoryEntry> {
    conversation
        .messages()
        .iter()
        .filter(|m| m.role != Role::Tool && !m.content.trim().is_empty())
        .map(|m| HistoryEntry::new(m.role, m.content.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolCallRequest;

    fn pairs(raw: &[(&str, &str)]) -> Vec<ChatPair> {
        raw.iter().map(|(u, b)| ChatPair::new(*u, *b)).collect()
    }

    #[test]
    fn test_round_trip_with_dangling_edges() {
        let original = pairs(&[("", "Welcome back"), ("q1", "a1"), ("q2", "a2"), ("q3", "")]);

        let conversation = entries_to_conversation(&pairs_to_entries(&original));
        assert_eq!(conversation.len(), 6);

        let restored = entries_to_pairs(&conversation_to_entries(&conversation));
        assert_eq!(restored, original);
    }

    #[test]
    fn test_consecutive_user_messages_each_rendered_once() {
        let entries = vec![
            HistoryEntry::new(Role::User, "first"),
            HistoryEntry::new(Role::User, "second"),
            HistoryEntry::new(Role::Assistant, "reply"),
        ];
        assert_eq!(entries_to_pairs(&entries), pairs(&[("first", ""), ("second", "reply")]));
    }

    #[test]
    fn test_system_feedback_rendered_as_bot() {
        let entries = vec![
            HistoryEntry::new(Role::User, "build a portfolio"),
            HistoryEntry::new(Role::Assistant, "60/40"),
            HistoryEntry::new(Role::System, "Evaluator Feedback: good"),
        ];
        assert_eq!(
            entries_to_pairs(&entries),
            pairs(&[("build a portfolio", "60/40"), ("", "Evaluator Feedback: good")])
        );
    }

    #[test]
    fn test_tool_traffic_hidden() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("q"));
        conversation.push(Message::assistant_with_tools(
            "",
            vec![ToolCallRequest::new("get_market_data", serde_json::json!({"symbols": ["VTI"]}))],
        ));
        conversation.push(Message {
            role: Role::Tool,
            content: "prices".into(),
            tool_calls: vec![],
            tool_call_id: Some("call_1".into()),
            tool_name: Some("get_market_data".into()),
        });
        conversation.push(Message::assistant("VTI is up"));

        let entries = conversation_to_entries(&conversation);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries_to_pairs(&entries), pairs(&[("q", "VTI is up")]));
    }

    #[test]
    fn test_pair_wire_format() {
        let pair: ChatPair = serde_json::from_str(r#"["hi", "hello"]"#).unwrap();
        assert_eq!(pair, ChatPair::new("hi", "hello"));
        assert_eq!(serde_json::to_string(&pair).unwrap(), r#"["hi","hello"]"#);
    }
}
