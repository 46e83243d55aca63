use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Lifecycle of a stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

/// Session information, optionally carrying the result payload of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session<T> {
    pub id: String,
    pub graph_id: String,
    pub status: SessionStatus,
    pub result: Option<T>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<T> Session<T> {
    pub fn started(id: impl Into<String>, graph_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            graph_id: graph_id.into(),
            status: SessionStatus::Running,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn complete(mut self, result: T) -> Self {
        self.status = SessionStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.updated_at = Utc::now();
        self
    }

    /// Mark the session failed; any earlier payload is dropped
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = SessionStatus::Failed;
        self.result = None;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
        self
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage<T>: Send + Sync {
    async fn save(&self, session: Session<T>) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session<T>>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage<T> {
    sessions: Arc<DashMap<String, Session<T>>>,
}

impl<T> InMemorySessionStorage<T> {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl<T> Default for InMemorySessionStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> SessionStorage<T> for InMemorySessionStorage<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn save(&self, session: Session<T>) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session<T>>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
