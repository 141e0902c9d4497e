//! # PostgreSQL State Store
//!
//! Durable actor state in a single JSONB key/value table, so queue and worker state
//! survive process restarts.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use super::state_store::StateStore;
use crate::error::StateStoreError;

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS tasker_actor_state (
        state_key  TEXT PRIMARY KEY,
        state      JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

#[derive(Debug, Clone)]
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    /// Create a store on an existing pool (bring your own pool)
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool to `database_url`
    pub async fn connect(database_url: &str) -> Result<Self, StateStoreError> {
        let pool = PgPool::connect(database_url).await?;
        info!("Connected actor state store to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create the state table if it does not exist
    pub async fn ensure_schema(&self) -> Result<(), StateStoreError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        debug!("Actor state table ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    #[instrument(skip(self))]
    async fn load(&self, key: &str) -> Result<Option<Value>, StateStoreError> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT state FROM tasker_actor_state WHERE state_key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(state,)| state))
    }

    #[instrument(skip(self, value))]
    async fn save(&self, key: &str, value: Value) -> Result<(), StateStoreError> {
        sqlx::query(
            r#"
            INSERT INTO tasker_actor_state (state_key, state, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (state_key)
            DO UPDATE SET state = EXCLUDED.state, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        sqlx::query("DELETE FROM tasker_actor_state WHERE state_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
