//! Error types for the advisory coordinator

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[derive(Error, Debug)]
pub enum CoordinatorError {

    // =============================
    // Tool Dispatch Errors (recoverable inside a turn)
    // =============================

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    // =============================
    // Turn Errors (fatal to the current turn)
    // =============================

    #[error("Agent failure: {0}")]
    AgentFailure(String),

    #[error("Malformed evaluator verdict: {0}")]
    MalformedVerdict(String),

    #[error("Turn timeout: {0}")]
    TurnTimeout(String),

    // =============================
    // Session / Infrastructure Errors
    // =============================

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Audit record not found: {0}")]
    AuditRecordNotFound(Uuid),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoordinatorError {
    /// Tool-level failures are encoded as tool messages and the turn continues.
    pub fn is_tool_level(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool(_) | Self::InvalidArguments(_) | Self::ToolError(_) | Self::UnknownAgent(_)
        )
    }

    /// A malformed verdict counts as a failed model call.
    pub fn is_agent_failure(&self) -> bool {
        matches!(self, Self::AgentFailure(_) | Self::MalformedVerdict(_))
    }

    /// Wrap a model-call error from `stage` as an agent failure, leaving
    /// errors that already carry turn-level meaning untouched.
    pub fn into_agent_failure(self, stage: &str) -> Self {
        match self {
            err @ (Self::AgentFailure(_) | Self::MalformedVerdict(_) | Self::TurnTimeout(_)) => err,
            other => Self::AgentFailure(format!("{}: {}", stage, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(CoordinatorError::UnknownTool("x".into()).is_tool_level());
        assert!(CoordinatorError::InvalidArguments("x".into()).is_tool_level());
        assert!(!CoordinatorError::AgentFailure("x".into()).is_tool_level());
        assert!(!CoordinatorError::InvalidRequest("x".into()).is_tool_level());
        assert!(CoordinatorError::MalformedVerdict("x".into()).is_agent_failure());
        assert!(!CoordinatorError::TurnTimeout("x".into()).is_agent_failure());
    }

    #[test]
    fn test_into_agent_failure_keeps_turn_errors() {
        let timeout = CoordinatorError::TurnTimeout("worker".into()).into_agent_failure("worker");
        assert!(matches!(timeout, CoordinatorError::TurnTimeout(_)));

        let wrapped = CoordinatorError::ConfigError("no key".into()).into_agent_failure("evaluator");
        match wrapped {
            CoordinatorError::AgentFailure(msg) => assert!(msg.starts_with("evaluator:")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
