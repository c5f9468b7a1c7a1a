//! Worker system prompt

use crate::agents::AgentRoster;
use crate::conversation::{TurnState, SUGGESTED_NEXT_AGENT};
use chrono::{DateTime, Local};

/// Render the worker's system prompt from the current turn state.
///
/// Pure: the result is passed with each worker request and never stored in
/// the conversation.
pub fn render_system_prompt(state: &TurnState, roster: &AgentRoster, now: DateTime<Local>) -> String {
    let mut prompt = String::from(
        "You are the Financial Consultant AI Orchestrator, coordinating multiple specialized agents to help financial advisors.\n\nAvailable Specialized Agents:\n",
    );

    for (i, profile) in roster.profiles().enumerate() {
        prompt.push_str(&format!(
            "{}. {} ({}) - {}\n",
            i + 1,
            profile.name,
            profile.key,
            profile.role
        ));
    }

    prompt.push_str(
        r#"
Your capabilities:
- Route requests to appropriate specialist agents with the consult_specialist tool
- Coordinate multi-agent workflows
- Access client and portfolio data
- Perform calculations and analytics
- Generate reports and documentation
- Execute account operations

When processing requests:
1. Understand the advisor's request and identify which agent(s) are needed
2. Use tools to access necessary data
3. Route to appropriate agents or use tools directly
4. Coordinate multiple agents if needed for complex workflows
5. Synthesize results into comprehensive response
6. Ensure all recommendations are compliant and actionable
"#,
    );

    prompt.push_str(&format!(
        "\nCurrent date and time: {}\n\nSuccess criteria:\n{}\n",
        now.format("%Y-%m-%d %H:%M:%S"),
        state.success_criteria
    ));

    if let Some(feedback) = state.feedback_on_work.as_deref().filter(|f| !f.trim().is_empty()) {
        prompt.push_str(&format!(
            r#"
Previously you thought you completed the assignment, but your reply was rejected because the success criteria was not met.
Here is the feedback on why this was rejected:
{}
With this feedback, please continue the assignment, ensuring that you meet the success criteria or have a question for the user.
"#,
            feedback
        ));

        if let Some(agent) = state
            .agent_context
            .get(SUGGESTED_NEXT_AGENT)
            .and_then(|v| v.as_str())
        {
            prompt.push_str(&format!("Suggested next agent: {}\n", agent));
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::builtin_profiles;
    use crate::conversation::Conversation;
    use crate::execution::ExecutionEngine;
    use crate::llm::{ChatModel, ScriptedModel};
    use crate::models::EvaluatorVerdict;
    use crate::tools::ToolRegistry;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::time::Duration;

    fn roster() -> AgentRoster {
        let model: Arc<dyn ChatModel> = Arc::new(ScriptedModel::default());
        let engine = Arc::new(ExecutionEngine::new(Arc::new(ToolRegistry::new()), Duration::from_secs(1)));
        AgentRoster::from_profiles(builtin_profiles(), model, engine, Duration::from_secs(1))
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_prompt_lists_roster_and_criteria() {
        let state = TurnState::begin(Conversation::new(), "hi", Some("name a client id"));
        let prompt = render_system_prompt(&state, &roster(), now());

        assert!(prompt.contains("2. Portfolio Architect Agent (portfolio_architect)"));
        assert!(prompt.contains("8. Account Operations Agent (account_operations)"));
        assert!(prompt.contains("Success criteria:\nname a client id"));
        assert!(prompt.contains("2026-01-02 03:04:05"));
        assert!(!prompt.contains("rejected"));
    }

    #[test]
    fn test_feedback_appended_as_directive() {
        let mut state = TurnState::begin(Conversation::new(), "hi", None);
        state.apply_verdict(&EvaluatorVerdict {
            feedback: "Include a stress test".to_string(),
            success_criteria_met: false,
            user_input_needed: false,
            next_agent: Some("risk_analytics".to_string()),
        });

        let prompt = render_system_prompt(&state, &roster(), now());
        assert!(prompt.contains("Here is the feedback on why this was rejected:\nInclude a stress test"));
        assert!(prompt.ends_with("Suggested next agent: risk_analytics\n"));
    }

    #[test]
    fn test_rendering_is_pure() {
        let state = TurnState::begin(Conversation::new(), "hi", None);
        let roster = roster();
        assert_eq!(
            render_system_prompt(&state, &roster, now()),
            render_system_prompt(&state, &roster, now())
        );
        assert_eq!(state.conversation.len(), 1);
    }
}
