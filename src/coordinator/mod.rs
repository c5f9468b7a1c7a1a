//! Coordinator - the worker/evaluator turn loop
//!
//! WORKER → TOOLS → WORKER ... → EVALUATOR → (DONE | WORKER)

use crate::agents::AgentRoster;
use crate::conversation::TurnState;
use crate::error::CoordinatorError;
use crate::evaluator::Evaluator;
use crate::execution::ExecutionEngine;
use crate::llm::{complete_with_deadline, ChatModel, ModelReply, ModelRequest};
use crate::models::{Message, Phase, ReplyEvent, Role, ToolResult, TurnOutcome, TurnReport};
use crate::Result;
use chrono::{Local, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

mod prompt;
pub use prompt::render_system_prompt;

pub const DEFAULT_MAX_EVALUATIONS: u32 = 5;
pub const DEFAULT_MAX_WORKER_STEPS: u32 = 25;

/// Loop guards and deadlines
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub max_evaluations: u32,
    pub max_worker_steps: u32,
    pub model_call_timeout: Duration,
    pub tool_call_timeout: Duration,
    pub turn_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
            max_worker_steps: DEFAULT_MAX_WORKER_STEPS,
            model_call_timeout: Duration::from_secs(60),
            tool_call_timeout: Duration::from_secs(120),
            turn_timeout: Duration::from_secs(300),
        }
    }
}

enum Step {
    Worker,
    /// Worker message whose tool calls are still pending
    Tools(Message),
    Evaluator,
    Done(TurnOutcome),
}

impl Step {
    fn phase(&self) -> Phase {
        match self {
            Step::Worker => Phase::Worker,
            Step::Tools(_) => Phase::Tools,
            Step::Evaluator => Phase::Evaluator,
            Step::Done(_) => Phase::Done,
        }
    }
}

#[derive(Default)]
struct Progress {
    phases: Vec<Phase>,
    evaluations: u32,
    worker_steps: u32,
}

pub struct Coordinator {
    worker_model: Arc<dyn ChatModel>,
    evaluator: Evaluator,
    engine: Arc<ExecutionEngine>,
    roster: Arc<AgentRoster>,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(
        worker_model: Arc<dyn ChatModel>,
        evaluator: Evaluator,
        engine: Arc<ExecutionEngine>,
        roster: Arc<AgentRoster>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            worker_model,
            evaluator,
            engine,
            roster,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn roster(&self) -> &AgentRoster {
        &self.roster
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Drive one turn to `DONE`.
    ///
    /// `state` must already hold this turn's user message. On error it keeps
    /// every message appended before the failure.
    pub async fn run_turn(&self, state: &mut TurnState) -> Result<TurnReport> {
        let start_time = Instant::now();
        let mut progress = Progress::default();

        info!(
            history = state.turn_start(),
            max_evaluations = self.config.max_evaluations,
            "Coordinator: starting turn"
        );

        let driven = tokio::time::timeout(self.config.turn_timeout, self.drive(state, &mut progress)).await;

        let outcome = match driven {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!(
                    worker_steps = progress.worker_steps,
                    evaluations = progress.evaluations,
                    "Turn exceeded deadline"
                );
                return Err(CoordinatorError::TurnTimeout(format!(
                    "turn exceeded {}s",
                    self.config.turn_timeout.as_secs_f32()
                )));
            }
        };

        info!(
            outcome = ?outcome,
            worker_steps = progress.worker_steps,
            evaluations = progress.evaluations,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Coordinator: turn complete"
        );

        Ok(build_report(state, outcome, progress))
    }

    async fn drive(&self, state: &mut TurnState, progress: &mut Progress) -> Result<TurnOutcome> {
        let mut step = Step::Worker;

        loop {
            let phase = step.phase();
            debug!(%phase, iteration = progress.phases.len(), "Coordinator transition");
            progress.phases.push(phase);

            step = match step {
                Step::Worker => {
                    progress.worker_steps += 1;
                    let reply = self.worker_step(state).await?;

                    if reply.tool_calls.is_empty() {
                        state.conversation.push(reply.into_message());
                        Step::Evaluator
                    } else {
                        debug!(tool_calls = reply.tool_calls.len(), "Worker requested tools");
                        Step::Tools(reply.into_message())
                    }
                }
                Step::Tools(message) => {
                    let results = self.engine.execute_batch(&message.tool_calls).await?;

                    // The request and its results land together or not at all.
                    state.conversation.push(message);
                    state
                        .conversation
                        .extend(results.into_iter().map(ToolResult::into_message));

                    self.back_to_worker(state, progress)
                }
                Step::Evaluator => {
                    progress.evaluations += 1;
                    let verdict = self.evaluator.evaluate(state).await?;
                    state.apply_verdict(&verdict);

                    if state.success_criteria_met {
                        Step::Done(TurnOutcome::Succeeded)
                    } else if state.user_input_needed {
                        Step::Done(TurnOutcome::NeedsUserInput)
                    } else if progress.evaluations >= self.config.max_evaluations {
                        warn!(evaluations = progress.evaluations, "Evaluation limit reached");
                        state.user_input_needed = true;
                        Step::Done(TurnOutcome::Incomplete)
                    } else {
                        debug!(evaluations = progress.evaluations, "Reply rejected, returning to worker");
                        self.back_to_worker(state, progress)
                    }
                }
                Step::Done(outcome) => return Ok(outcome),
            };
        }
    }

    fn back_to_worker(&self, state: &mut TurnState, progress: &Progress) -> Step {
        if progress.worker_steps >= self.config.max_worker_steps {
            warn!(worker_steps = progress.worker_steps, "Worker step limit reached");
            state.user_input_needed = true;
            Step::Done(TurnOutcome::Incomplete)
        } else {
            Step::Worker
        }
    }

    async fn worker_step(&self, state: &TurnState) -> Result<ModelReply> {
        let system = render_system_prompt(state, &self.roster, Local::now());
        let request = ModelRequest::new(Some(system), state.conversation.messages().to_vec())
            .with_tools(self.engine.descriptors());

        let reply =
            complete_with_deadline(self.worker_model.as_ref(), request, self.config.model_call_timeout, "worker")
                .await?;

        if reply.is_empty() {
            return Err(CoordinatorError::AgentFailure(
                "worker returned no content".to_string(),
            ));
        }

        Ok(reply)
    }
}

fn build_report(state: &TurnState, outcome: TurnOutcome, progress: Progress) -> TurnReport {
    let reply = state
        .conversation
        .last_assistant_reply(state.turn_start())
        .map(|m| m.content.clone());

    let feedback = state
        .feedback_on_work
        .clone()
        .filter(|f| !f.trim().is_empty());

    let mut events = Vec::with_capacity(3);
    if let Some(user) = state.user_message() {
        events.push(ReplyEvent::new(Role::User, user.content.clone()));
    }
    if let Some(reply) = &reply {
        events.push(ReplyEvent::new(Role::Assistant, reply.clone()));
    }
    if let Some(feedback) = &feedback {
        events.push(ReplyEvent::new(
            Role::System,
            format!("Evaluator Feedback: {}", feedback),
        ));
    }

    TurnReport {
        session_id: None,
        outcome,
        reply,
        feedback,
        success_criteria_met: state.success_criteria_met,
        user_input_needed: state.user_input_needed,
        evaluations: progress.evaluations,
        worker_steps: progress.worker_steps,
        phases: progress.phases,
        events,
        completed_at: Utc::now(),
    }
}
