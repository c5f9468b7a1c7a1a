//! Turn audit trail
//!
//! Every submitted turn, successful or not, leaves one record carrying a
//! SHA-256 digest of the conversation as it was checkpointed.

use crate::conversation::Conversation;
use crate::models::TurnOutcome;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnRecord {
    pub audit_id: Uuid,
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TurnOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub evaluations: u32,
    pub worker_steps: u32,
    pub message_count: usize,
    pub transcript_hash: String,
    pub elapsed_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl TurnRecord {
    pub fn new(session_id: Uuid, conversation: &Conversation, elapsed_ms: u64) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            session_id,
            outcome: None,
            error: None,
            evaluations: 0,
            worker_steps: 0,
            message_count: conversation.len(),
            transcript_hash: transcript_hash(conversation),
            elapsed_ms,
            created_at: Utc::now(),
        }
    }
}

/// Audit trail storage
#[derive(Default)]
pub struct AuditLog {
    records: Arc<RwLock<HashMap<Uuid, TurnRecord>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, record: TurnRecord) -> Result<Uuid> {
        let audit_id = record.audit_id;
        let mut records = self.records.write().await;
        records.insert(audit_id, record);
        Ok(audit_id)
    }

    pub async fn get(&self, audit_id: Uuid) -> Result<Option<TurnRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&audit_id).cloned())
    }

    /// Records for a session, oldest first
    pub async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<TurnRecord>> {
        let records = self.records.read().await;

        let mut items: Vec<_> = records
            .values()
            .filter(|record| record.session_id == session_id)
            .cloned()
            .collect();

        items.sort_by_key(|record| record.created_at);

        Ok(items)
    }

    /// Check a conversation against the digest stored for `audit_id`
    pub async fn verify_transcript(&self, audit_id: Uuid, conversation: &Conversation) -> Result<bool> {
        let records = self.records.read().await;

        Ok(records
            .get(&audit_id)
            .map(|record| record.transcript_hash == transcript_hash(conversation))
            .unwrap_or(false))
    }
}

/// Hex SHA-256 of the conversation's JSON form, streamed into the hasher
pub fn transcript_hash(conversation: &Conversation) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), conversation).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
