//! Session host
//!
//! Binds session ids to checkpointed conversations and runs one turn at a
//! time per session. Different sessions proceed in parallel.

use crate::agents::{builtin_profiles, AgentRoster};
use crate::audit::{AuditLog, TurnRecord};
use crate::conversation::TurnState;
use crate::coordinator::{Coordinator, CoordinatorConfig};
use crate::error::CoordinatorError;
use crate::evaluator::Evaluator;
use crate::execution::ExecutionEngine;
use crate::llm::ChatModel;
use crate::state::{CheckpointStore, SessionCheckpoint};
use crate::tools::{create_default_registry, ConsultSpecialistTool, FinancialApiClient};
use crate::{Result, TurnReport};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

pub mod history;
pub use history::{ChatPair, HistoryEntry};

/// An audit record checked against the session's stored transcript
#[derive(Debug, Clone, Serialize)]
pub struct AuditCheck {
    pub record: TurnRecord,
    pub matches_current_transcript: bool,
}

/// Result of a paired-history chat turn
#[derive(Debug, Clone)]
pub struct ChatExchange {
    pub session_id: Uuid,
    pub history: Vec<ChatPair>,
    pub report: TurnReport,
}

pub struct SessionHost {
    coordinator: Arc<Coordinator>,
    store: Arc<dyn CheckpointStore>,
    audit_log: Arc<AuditLog>,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionHost {
    pub fn new(coordinator: Arc<Coordinator>, store: Arc<dyn CheckpointStore>, audit_log: Arc<AuditLog>) -> Self {
        Self {
            coordinator,
            store,
            audit_log,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wire the full stack around one shared model client.
    ///
    /// Specialists get the advisory tools only; the coordinator's registry
    /// adds `consult_specialist` on top.
    pub fn assemble(
        model: Arc<dyn ChatModel>,
        api: Option<FinancialApiClient>,
        config: CoordinatorConfig,
        store: Arc<dyn CheckpointStore>,
        audit_log: Arc<AuditLog>,
    ) -> Self {
        let advisory = Arc::new(create_default_registry(api));
        let agent_engine = Arc::new(ExecutionEngine::new(advisory.clone(), config.tool_call_timeout));
        let roster = Arc::new(AgentRoster::from_profiles(
            builtin_profiles(),
            model.clone(),
            agent_engine,
            config.model_call_timeout,
        ));

        let mut registry = (*advisory).clone();
        registry.register(Arc::new(ConsultSpecialistTool::new(roster.clone())));
        let engine = Arc::new(ExecutionEngine::new(Arc::new(registry), config.tool_call_timeout));

        let evaluator = Evaluator::new(model.clone(), config.model_call_timeout);
        let coordinator = Coordinator::new(model, evaluator, engine, roster, config);

        info!(
            tools = coordinator.engine().registry().len(),
            agents = coordinator.roster().len(),
            "Session host assembled"
        );

        Self::new(Arc::new(coordinator), store, audit_log)
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Per-session turn lock, created on first use so sessions restored from
    /// a durable store are covered too
    async fn session_lock(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(session_id).or_default().clone()
    }

    /// Lock for a session known to exist. Unknown ids never get an entry.
    async fn session_lock_checked(&self, session_id: Uuid) -> Result<Arc<Mutex<()>>> {
        self.load(session_id).await?;
        Ok(self.session_lock(session_id).await)
    }

    /// Load under the session lock, dropping the lock entry if the session
    /// was closed while waiting for it
    async fn load_locked(&self, session_id: Uuid) -> Result<SessionCheckpoint> {
        let loaded = self.load(session_id).await;
        if let Err(CoordinatorError::SessionNotFound(_)) = loaded {
            self.locks.lock().await.remove(&session_id);
        }
        loaded
    }

    async fn load(&self, session_id: Uuid) -> Result<SessionCheckpoint> {
        self.store
            .load(session_id)
            .await?
            .ok_or(CoordinatorError::SessionNotFound(session_id))
    }

    pub async fn start_session(&self) -> Result<Uuid> {
        let checkpoint = SessionCheckpoint::new(Uuid::new_v4());
        self.store.save(&checkpoint).await?;

        info!(session_id = %checkpoint.session_id, "Session started");
        Ok(checkpoint.session_id)
    }

    pub async fn submit_turn(
        &self,
        session_id: Uuid,
        message: &str,
        success_criteria: Option<&str>,
    ) -> Result<TurnReport> {
        self.submit_turn_with_history(session_id, message, success_criteria, &[])
            .await
    }

    /// Run one turn. `history` seeds the conversation only when the session
    /// has none of its own yet.
    ///
    /// The checkpoint is written whether or not the turn succeeds, so a
    /// retry sees everything that completed.
    pub async fn submit_turn_with_history(
        &self,
        session_id: Uuid,
        message: &str,
        success_criteria: Option<&str>,
        history: &[HistoryEntry],
    ) -> Result<TurnReport> {
        if message.trim().is_empty() {
            return Err(CoordinatorError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }

        let lock = self.session_lock_checked(session_id).await?;
        let _guard = lock.lock().await;

        let mut checkpoint = self.load_locked(session_id).await?;
        let start_time = Instant::now();

        let prior = if checkpoint.conversation.is_empty() && !history.is_empty() {
            history::entries_to_conversation(history)
        } else {
            checkpoint.conversation.clone()
        };

        let mut state = TurnState::begin(prior, message, success_criteria);
        let result = self.coordinator.run_turn(&mut state).await;

        checkpoint.conversation = state.conversation;
        checkpoint.turn_count += 1;
        checkpoint.updated_at = Utc::now();
        self.store.save(&checkpoint).await?;

        let mut record = TurnRecord::new(
            session_id,
            &checkpoint.conversation,
            start_time.elapsed().as_millis() as u64,
        );

        match result {
            Ok(mut report) => {
                record.outcome = Some(report.outcome);
                record.evaluations = report.evaluations;
                record.worker_steps = report.worker_steps;
                self.audit_log.record(record).await?;

                report.session_id = Some(session_id);
                Ok(report)
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Turn failed");
                record.error = Some(e.to_string());
                self.audit_log.record(record).await?;
                Err(e)
            }
        }
    }

    /// Paired-history variant used by chat surfaces. Returns the full
    /// rendered history including this turn's reply events.
    pub async fn chat(
        &self,
        session_id: Option<Uuid>,
        message: &str,
        success_criteria: Option<&str>,
        pairs: &[ChatPair],
    ) -> Result<ChatExchange> {
        let session_id = match session_id {
            Some(id) => id,
            None => self.start_session().await?,
        };

        let mut entries = history::pairs_to_entries(pairs);
        let report = self
            .submit_turn_with_history(session_id, message, success_criteria, &entries)
            .await?;

        entries.extend(
            report
                .events
                .iter()
                .map(|event| HistoryEntry::new(event.role, event.content.clone())),
        );

        Ok(ChatExchange {
            session_id,
            history: history::entries_to_pairs(&entries),
            report,
        })
    }

    /// Discard the conversation, keeping the session id
    pub async fn reset_session(&self, session_id: Uuid) -> Result<Uuid> {
        let lock = self.session_lock_checked(session_id).await?;
        let _guard = lock.lock().await;

        self.load_locked(session_id).await?;
        self.store.save(&SessionCheckpoint::new(session_id)).await?;

        info!(session_id = %session_id, "Session reset");
        Ok(session_id)
    }

    pub async fn close_session(&self, session_id: Uuid) -> Result<()> {
        let lock = self.session_lock(session_id).await;
        let guard = lock.lock().await;

        let existed = self.store.delete(session_id).await?;
        drop(guard);
        self.locks.lock().await.remove(&session_id);

        if !existed {
            return Err(CoordinatorError::SessionNotFound(session_id));
        }

        info!(session_id = %session_id, "Session closed");
        Ok(())
    }

    pub async fn history(&self, session_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let checkpoint = self.load(session_id).await?;
        Ok(history::conversation_to_entries(&checkpoint.conversation))
    }

    pub async fn audit(&self, session_id: Uuid) -> Result<Vec<TurnRecord>> {
        self.audit_log.list_for_session(session_id).await
    }

    /// Only the latest completed turn can match the stored transcript.
    pub async fn verify_audit(&self, session_id: Uuid, audit_id: Uuid) -> Result<AuditCheck> {
        let record = self
            .audit_log
            .get(audit_id)
            .await?
            .filter(|record| record.session_id == session_id)
            .ok_or(CoordinatorError::AuditRecordNotFound(audit_id))?;

        let checkpoint = self.load(session_id).await?;
        let matches_current_transcript = self
            .audit_log
            .verify_transcript(audit_id, &checkpoint.conversation)
            .await?;

        Ok(AuditCheck {
            record,
            matches_current_transcript,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ModelReply, ModelRequest};
    use crate::models::{Role, TurnOutcome};
    use crate::state::InMemoryCheckpointStore;
    use async_trait::async_trait;
    use std::time::Duration;

    const ACCEPT: &str = r#"{"feedback": "Looks good.", "success_criteria_met": true, "user_input_needed": false}"#;

    /// Echoes the latest user message, or accepts when asked to judge
    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: ModelRequest) -> Result<ModelReply> {
            let last = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();

            if request.system.is_none() {
                return Ok(ModelReply::text(ACCEPT));
            }

            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(ModelReply::text(format!("echo: {}", last)))
        }
    }

    /// Fails every call
    struct BrokenModel;

    #[async_trait]
    impl ChatModel for BrokenModel {
        fn model_name(&self) -> &str {
            "broken"
        }

        async fn complete(&self, _request: ModelRequest) -> Result<ModelReply> {
            Err(CoordinatorError::AgentFailure("upstream 503".into()))
        }
    }

    fn host_with(model: Arc<dyn ChatModel>) -> SessionHost {
        SessionHost::assemble(
            model,
            None,
            CoordinatorConfig::default(),
            Arc::new(InMemoryCheckpointStore::new()),
            Arc::new(AuditLog::new()),
        )
    }

    fn host() -> SessionHost {
        host_with(Arc::new(EchoModel))
    }

    #[tokio::test]
    async fn test_turns_accumulate_conversation() {
        let host = host();
        let id = host.start_session().await.unwrap();

        let first = host.submit_turn(id, "hello", None).await.unwrap();
        assert_eq!(first.session_id, Some(id));
        assert_eq!(first.outcome, TurnOutcome::Succeeded);
        assert_eq!(first.reply.as_deref(), Some("echo: hello"));

        host.submit_turn(id, "again", None).await.unwrap();
        let history = host.history(id).await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].content, "echo: again");
        assert_eq!(host.audit(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let host = host();
        let used = host.start_session().await.unwrap();
        host.submit_turn(used, "old context", None).await.unwrap();
        host.reset_session(used).await.unwrap();

        let fresh = host.start_session().await.unwrap();
        host.reset_session(fresh).await.unwrap();

        let after_reset = host.submit_turn(used, "new question", None).await.unwrap();
        let on_fresh = host.submit_turn(fresh, "new question", None).await.unwrap();

        assert_eq!(after_reset.events, on_fresh.events);
        assert_eq!(host.history(used).await.unwrap(), host.history(fresh).await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_session_is_gone() {
        let host = host();
        let id = host.start_session().await.unwrap();
        host.close_session(id).await.unwrap();

        let err = host.submit_turn(id, "hi", None).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::SessionNotFound(missing) if missing == id));
        assert!(host.close_session(id).await.is_err());
        assert!(host.reset_session(id).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_sessions_do_not_mix() {
        let host = Arc::new(host());
        let a = host.start_session().await.unwrap();
        let b = host.start_session().await.unwrap();

        let (ra, rb) = tokio::join!(
            host.submit_turn(a, "alpha portfolio", None),
            host.submit_turn(b, "beta portfolio", None),
        );
        ra.unwrap();
        rb.unwrap();

        let ha = host.history(a).await.unwrap();
        let hb = host.history(b).await.unwrap();
        assert!(ha.iter().all(|e| !e.content.contains("beta")));
        assert!(hb.iter().all(|e| !e.content.contains("alpha")));
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_user_message() {
        let host = host_with(Arc::new(BrokenModel));
        let id = host.start_session().await.unwrap();

        let err = host.submit_turn(id, "will fail", None).await.unwrap_err();
        assert!(err.is_agent_failure());

        let history = host.history(id).await.unwrap();
        assert_eq!(history, vec![HistoryEntry::new(Role::User, "will fail")]);

        let audit = host.audit(id).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert!(audit[0].error.is_some());
        assert!(audit[0].outcome.is_none());
    }

    #[tokio::test]
    async fn test_chat_with_paired_history() {
        let host = host();
        let pairs = vec![ChatPair::new("", "Welcome"), ChatPair::new("q1", "a1")];

        let exchange = host.chat(None, "q2", None, &pairs).await.unwrap();

        assert_eq!(
            exchange.history,
            vec![
                ChatPair::new("", "Welcome"),
                ChatPair::new("q1", "a1"),
                ChatPair::new("q2", "echo: q2"),
                ChatPair::new("", "Evaluator Feedback: Looks good."),
            ]
        );
        assert_eq!(host.history(exchange.session_id).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let host = host();
        let id = host.start_session().await.unwrap();
        let err = host.submit_turn(id, "   ", None).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidRequest(_)));
        assert!(!err.is_tool_level());
    }

    #[tokio::test]
    async fn test_verify_audit_against_stored_transcript() {
        let host = host();
        let id = host.start_session().await.unwrap();
        host.submit_turn(id, "first", None).await.unwrap();
        host.submit_turn(id, "second", None).await.unwrap();

        let records = host.audit(id).await.unwrap();
        let older = host.verify_audit(id, records[0].audit_id).await.unwrap();
        let latest = host.verify_audit(id, records[1].audit_id).await.unwrap();
        assert!(!older.matches_current_transcript);
        assert!(latest.matches_current_transcript);
        assert_eq!(latest.record.audit_id, records[1].audit_id);

        let other = host.start_session().await.unwrap();
        let err = host.verify_audit(other, records[1].audit_id).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::AuditRecordNotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_sessions_leave_no_locks() {
        let host = host();
        let live = host.start_session().await.unwrap();
        host.submit_turn(live, "hello", None).await.unwrap();

        for _ in 0..50 {
            let err = host.submit_turn(Uuid::new_v4(), "hi", None).await.unwrap_err();
            assert!(matches!(err, CoordinatorError::SessionNotFound(_)));
            assert!(host.reset_session(Uuid::new_v4()).await.is_err());
            assert!(host.close_session(Uuid::new_v4()).await.is_err());
        }

        let locks = host.locks.lock().await;
        assert_eq!(locks.len(), 1);
        assert!(locks.contains_key(&live));
    }
}
