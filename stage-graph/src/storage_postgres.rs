use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{PgPool, Row, postgres::PgPoolOptions, types::Json};
use std::marker::PhantomData;
use tracing::info;

use crate::{
    error::{GraphError, Result},
    storage::{Session, SessionStorage},
};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS graph_sessions (
    id TEXT PRIMARY KEY,
    graph_id TEXT NOT NULL,
    status TEXT NOT NULL,
    data JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)"#;

/// PostgreSQL implementation of SessionStorage; one JSONB row per session
pub struct PostgresSessionStorage<T> {
    pool: PgPool,
    _payload: PhantomData<fn() -> T>,
}

impl<T> PostgresSessionStorage<T> {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| GraphError::StorageError(format!("Failed to connect: {e}")))?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| GraphError::StorageError(format!("Failed to create table: {e}")))?;

        info!("PostgreSQL session storage ready");
        Ok(Self {
            pool,
            _payload: PhantomData,
        })
    }
}

#[async_trait]
impl<T> SessionStorage<T> for PostgresSessionStorage<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn save(&self, session: Session<T>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO graph_sessions (id, graph_id, status, data, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&session.id)
        .bind(&session.graph_id)
        .bind(session.status.as_str())
        .bind(Json(&session))
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| GraphError::StorageError(format!("Failed to save session: {e}")))?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session<T>>> {
        let row = sqlx::query("SELECT data FROM graph_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GraphError::StorageError(format!("Failed to load session: {e}")))?;

        row.map(|row| {
            row.try_get::<Json<Session<T>>, _>("data")
                .map(|Json(session)| session)
                .map_err(|e| GraphError::StorageError(format!("Corrupt session {id}: {e}")))
        })
        .transpose()
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM graph_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| GraphError::StorageError(format!("Failed to delete session: {e}")))?;
        Ok(())
    }
}
