//! Specialist agents
//!
//! One generic agent type configured by an `AgentProfile`. Adding a
//! specialist means adding a profile, not a type.

use crate::error::CoordinatorError;
use crate::execution::ExecutionEngine;
use crate::llm::{complete_with_deadline, ChatModel, ModelRequest};
use crate::models::{Message, ToolResult};
use crate::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

mod profiles;
pub use profiles::builtin_profiles;

/// Tool rounds a specialist may resolve before it must answer
pub const MAX_AGENT_TOOL_ROUNDS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    pub key: String,
    pub name: String,
    pub role: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub guidance_heading: String,
    pub guidance: Vec<String>,
}

impl AgentProfile {
    /// Shared base template followed by the specialization block
    pub fn system_prompt(&self, now: DateTime<Local>) -> String {
        let mut prompt = format!(
            r#"You are the {}, specialized in {}.

Your role: {}

You have access to tools that allow you to:
- Access client and portfolio data
- Search investment solutions
- Perform calculations and analytics
- Generate reports and documentation

Always provide accurate, compliant, and actionable recommendations.
Current date and time: {}

Your specific capabilities:
"#,
            self.name,
            self.description,
            self.role,
            now.format("%Y-%m-%d %H:%M:%S"),
        );

        for (i, capability) in self.capabilities.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, capability));
        }

        prompt.push_str(&format!("\n{}:\n", self.guidance_heading));
        for line in &self.guidance {
            prompt.push_str(&format!("- {}\n", line));
        }

        prompt
    }
}

pub struct SpecialistAgent {
    profile: AgentProfile,
    model: Arc<dyn ChatModel>,
    engine: Arc<ExecutionEngine>,
    call_timeout: Duration,
}

impl SpecialistAgent {
    pub fn new(
        profile: AgentProfile,
        model: Arc<dyn ChatModel>,
        engine: Arc<ExecutionEngine>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            profile,
            model,
            engine,
            call_timeout,
        }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Answer `task`, resolving any tool calls the model makes along the way.
    pub async fn respond(&self, task: &str, context: Option<&Value>) -> Result<String> {
        let system = self.profile.system_prompt(Local::now());

        let mut messages = vec![Message::user(task)];
        if let Some(context) = context {
            messages.push(Message::user(format!(
                "Context: {}",
                serde_json::to_string_pretty(context)?
            )));
        }

        info!(agent = %self.profile.key, "Specialist processing task");

        for round in 0..=MAX_AGENT_TOOL_ROUNDS {
            let request = ModelRequest::new(Some(system.clone()), messages.clone())
                .with_tools(self.engine.descriptors());

            let reply =
                complete_with_deadline(self.model.as_ref(), request, self.call_timeout, &self.profile.key)
                    .await?;

            if reply.tool_calls.is_empty() {
                if reply.content.trim().is_empty() {
                    return Err(CoordinatorError::AgentFailure(format!(
                        "{} returned no content",
                        self.profile.name
                    )));
                }
                return Ok(reply.content);
            }

            if round == MAX_AGENT_TOOL_ROUNDS {
                break;
            }

            debug!(
                agent = %self.profile.key,
                round,
                tool_calls = reply.tool_calls.len(),
                "Specialist requested tools"
            );

            let results = self.engine.execute_batch(&reply.tool_calls).await?;
            messages.push(reply.into_message());
            messages.extend(results.into_iter().map(ToolResult::into_message));
        }

        Err(CoordinatorError::AgentFailure(format!(
            "{} exceeded {} tool rounds without answering",
            self.profile.name, MAX_AGENT_TOOL_ROUNDS
        )))
    }
}

/// Process-wide specialist roster, read-only after construction
pub struct AgentRoster {
    agents: Vec<SpecialistAgent>,
}

impl AgentRoster {
    pub fn new(agents: Vec<SpecialistAgent>) -> Self {
        Self { agents }
    }

    /// Build one agent per profile, all sharing the same model and tools
    pub fn from_profiles(
        profiles: Vec<AgentProfile>,
        model: Arc<dyn ChatModel>,
        engine: Arc<ExecutionEngine>,
        call_timeout: Duration,
    ) -> Self {
        let agents = profiles
            .into_iter()
            .map(|profile| SpecialistAgent::new(profile, model.clone(), engine.clone(), call_timeout))
            .collect();
        Self { agents }
    }

    pub fn get(&self, key: &str) -> Option<&SpecialistAgent> {
        self.agents.iter().find(|a| a.profile.key == key)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &AgentProfile> {
        self.agents.iter().map(|a| &a.profile)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.profile.key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub async fn route(&self, key: &str, task: &str, context: Option<&Value>) -> Result<String> {
        let agent = self
            .get(key)
            .ok_or_else(|| CoordinatorError::UnknownAgent(key.to_string()))?;
        agent.respond(task, context).await
    }
}
