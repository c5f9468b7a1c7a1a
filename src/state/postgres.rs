//! Postgres-backed checkpoint store
//!
//! One row per session; the conversation is stored as JSON text.

use super::{CheckpointStore, SessionCheckpoint};
use crate::error::CoordinatorError;
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Checkpoints in a `session_checkpoints` table, conversation stored as JSON text
pub struct PostgresCheckpointStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

fn db_error(context: &str, e: impl std::fmt::Display) -> CoordinatorError {
    CoordinatorError::DatabaseError(format!("{}: {}", context, e))
}

impl PostgresCheckpointStore {
    /// Build a lazily-connecting pool; no I/O happens until first use
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
            .map_err(|e| db_error("Invalid database URL", e))?;

        Ok(Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        let pool = &self.pool;

        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS session_checkpoints (
                      session_id UUID PRIMARY KEY,
                      conversation TEXT NOT NULL,
                      turn_count INTEGER NOT NULL DEFAULT 0,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| db_error("Failed to initialize checkpoint schema", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl CheckpointStore for PostgresCheckpointStore {
    async fn load(&self, session_id: Uuid) -> Result<Option<SessionCheckpoint>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT conversation, turn_count, created_at, updated_at
            FROM session_checkpoints
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load session checkpoint", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let conversation: String = row
            .try_get("conversation")
            .map_err(|e| db_error("Corrupt checkpoint row", e))?;
        let turn_count: i32 = row.try_get("turn_count").unwrap_or(0);
        let created_at: DateTime<Utc> = row.try_get("created_at").unwrap_or_else(|_| Utc::now());
        let updated_at: DateTime<Utc> = row.try_get("updated_at").unwrap_or(created_at);

        Ok(Some(SessionCheckpoint {
            session_id,
            conversation: serde_json::from_str(&conversation)?,
            turn_count: turn_count.max(0) as u32,
            created_at,
            updated_at,
        }))
    }

    async fn save(&self, checkpoint: &SessionCheckpoint) -> Result<()> {
        self.ensure_schema().await?;

        let conversation = serde_json::to_string(&checkpoint.conversation)?;

        sqlx::query(
            r#"
            INSERT INTO session_checkpoints
              (session_id, conversation, turn_count, created_at, updated_at)
            VALUES
              ($1, $2, $3, $4, $5)
            ON CONFLICT (session_id) DO UPDATE
              SET conversation = EXCLUDED.conversation,
                  turn_count = EXCLUDED.turn_count,
                  updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(checkpoint.session_id)
        .bind(conversation)
        .bind(checkpoint.turn_count as i32)
        .bind(checkpoint.created_at)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save session checkpoint", e))?;

        Ok(())
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM session_checkpoints WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete session checkpoint", e))?;

        Ok(result.rows_affected() > 0)
    }
}
