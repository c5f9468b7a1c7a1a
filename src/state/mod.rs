//! Session checkpoint persistence
//!
//! Only the conversation survives between turns. Everything else in
//! `TurnState` is rebuilt at the start of each turn.

use crate::conversation::Conversation;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

mod postgres;
pub use postgres::PostgresCheckpointStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionCheckpoint {
    pub session_id: Uuid,
    pub conversation: Conversation,
    pub turn_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionCheckpoint {
    pub fn new(session_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            conversation: Conversation::new(),
            turn_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Trait for checkpoint persistence, keyed by session id
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, session_id: Uuid) -> Result<Option<SessionCheckpoint>>;
    async fn save(&self, checkpoint: &SessionCheckpoint) -> Result<()>;
    /// Returns whether a checkpoint existed
    async fn delete(&self, session_id: Uuid) -> Result<bool>;
}

/// In-memory checkpoint store for development and tests
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<Uuid, SessionCheckpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, session_id: Uuid) -> Result<Option<SessionCheckpoint>> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(&session_id).cloned())
    }

    async fn save(&self, checkpoint: &SessionCheckpoint) -> Result<()> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(checkpoint.session_id, checkpoint.clone());
        Ok(())
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool> {
        let mut checkpoints = self.checkpoints.write().await;
        Ok(checkpoints.remove(&session_id).is_some())
    }
}

/// Postgres when a database URL is configured, in-memory otherwise
pub fn build_checkpoint_store(database_url: Option<&str>) -> Arc<dyn CheckpointStore> {
    if let Some(url) = database_url {
        match PostgresCheckpointStore::connect_lazy(url) {
            Ok(store) => {
                info!("Session checkpoint backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres checkpoint backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Session checkpoint backend: in-memory");
    Arc::new(InMemoryCheckpointStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = InMemoryCheckpointStore::new();
        let mut checkpoint = SessionCheckpoint::new(Uuid::new_v4());
        checkpoint.conversation.push(Message::user("hello"));
        checkpoint.turn_count = 1;

        store.save(&checkpoint).await.unwrap();
        let loaded = store.load(checkpoint.session_id).await.unwrap().unwrap();
        assert_eq!(loaded, checkpoint);

        assert!(store.delete(checkpoint.session_id).await.unwrap());
        assert!(!store.delete(checkpoint.session_id).await.unwrap());
        assert!(store.load(checkpoint.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_build_without_url_is_in_memory() {
        let store = build_checkpoint_store(None);
        assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
    }
}
