//! Financial Advisory Coordinator
//!
//! A multi-agent assistant for financial advisors that:
//! - Runs each user turn through a worker/evaluator loop
//! - Resolves tool calls in batches against a shared tool registry
//! - Delegates focused tasks to eight data-configured specialist agents
//! - Judges every reply against explicit success criteria
//! - Checkpoints conversations per session and audits every turn
//!
//! TURN LOOP:
//! WORKER → TOOLS → WORKER ... → EVALUATOR → DONE | WORKER

pub mod agents;
pub mod api;
pub mod audit;
pub mod config;
pub mod conversation;
pub mod coordinator;
pub mod error;
pub mod evaluator;
pub mod execution;
pub mod gemini;
pub mod llm;
pub mod models;
pub mod session;
pub mod state;
pub mod tools;

pub use error::{CoordinatorError, Result};

// Re-export common types
pub use conversation::{Conversation, TurnState};
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use models::*;
pub use session::SessionHost;
